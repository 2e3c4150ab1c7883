//! Field variants
//!
//! A record field is either a stored literal or one of the deferred variants:
//! a computed value, a reference to one other record, an owned child
//! collection, or a many-to-many relation. The variant is decided once, when
//! the value is assigned to its record, and never changes afterwards; the
//! Walker replaces whole fields with literals when it fills foreign keys, but
//! never mutates a variant in place.

use std::fmt;
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Result, SeedError};
use crate::record::Record;
use crate::value::Value;

/// A deferred, re-evaluated-on-every-read field value.
///
/// The closure receives the owning record and the field name each time the
/// field is read. Results are never memoized, so a computed field can react to
/// foreign keys the Walker fills in after construction, and impure closures
/// (counters, clocks) keep working.
#[derive(Clone)]
pub struct Computed {
    func: Rc<dyn Fn(&Record, &str) -> FieldInit>,
}

impl Computed {
    pub fn new<F, R>(func: F) -> Self
    where
        F: Fn(&Record, &str) -> R + 'static,
        R: Into<FieldInit>,
    {
        Computed {
            func: Rc::new(move |record, name| func(record, name).into()),
        }
    }

    /// Invoke the closure against the owning record.
    pub fn evaluate(&self, record: &Record, name: &str) -> FieldInit {
        (self.func)(record, name)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Computed(..)")
    }
}

/// A reference to zero or one other record (the foreign-key side).
#[derive(Debug, Clone, Default)]
pub struct BelongsTo {
    schema: Option<String>,
    target: Option<Record>,
    local_fields: Option<Vec<String>>,
    target_fields: Option<Vec<String>>,
    auto_rendered: bool,
}

impl BelongsTo {
    /// Reference a concrete record; the target schema is taken from it.
    pub fn to(record: &Record) -> Self {
        BelongsTo {
            schema: Some(record.schema()),
            target: Some(record.clone()),
            ..Default::default()
        }
    }

    /// Declare the target schema without naming a record yet.
    pub fn schema(name: impl Into<String>) -> Self {
        BelongsTo {
            schema: Some(name.into()),
            ..Default::default()
        }
    }

    /// An explicitly absent reference; local fields resolve to NULL.
    pub fn none() -> Self {
        BelongsTo::default()
    }

    /// Name the local foreign-key field(s) this reference fills.
    pub fn local<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Name the field(s) on the target record the foreign key copies from.
    /// Defaults to the target's identity fields.
    pub fn target_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn target(&self) -> Option<&Record> {
        self.target.as_ref()
    }

    pub fn local_field_names(&self) -> Option<&[String]> {
        self.local_fields.as_deref()
    }

    pub fn target_field_names(&self) -> Option<&[String]> {
        self.target_fields.as_deref()
    }

    /// True when the reference self-bound to the field it was assigned to.
    /// Such a field still holds the live reference after resolution; the
    /// emitter renders it into a scalar late, and the Walker must not copy a
    /// value over it.
    pub fn is_auto_rendered(&self) -> bool {
        self.auto_rendered
    }

    pub(crate) fn bind(&mut self, name: &str) {
        if self.local_fields.is_none() {
            self.local_fields = Some(vec![name.to_string()]);
            self.auto_rendered = true;
        }
    }

    /// Produce the scalar to store in the local foreign-key field.
    ///
    /// The target-field spec must resolve to exactly one field; an absent
    /// reference renders NULL.
    pub fn render(&self, schema: &str, field: &str) -> Result<Value> {
        let target = match &self.target {
            Some(target) => target,
            None => return Ok(Value::Null),
        };
        let fields = match &self.target_fields {
            Some(fields) => fields.clone(),
            None => target.identity_field_names(),
        };
        if fields.len() != 1 {
            return Err(SeedError::MultiFieldRender {
                schema: schema.to_string(),
                field: field.to_string(),
            });
        }
        target.value(&fields[0])
    }
}

/// An owned one-to-many collection of child records.
#[derive(Debug, Clone)]
pub struct HasMany {
    records: Vec<Record>,
    referring_fields: Option<Vec<String>>,
    referred_fields: Option<Vec<String>>,
}

impl HasMany {
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        HasMany {
            records: records.into_iter().collect(),
            referring_fields: None,
            referred_fields: None,
        }
    }

    /// Name the foreign-key field(s) on each child.
    pub fn referring<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.referring_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Name the parent field(s) the children's foreign keys must equal.
    /// Defaults to the parent's identity fields.
    pub fn referred<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.referred_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn referring_field_names(&self) -> Option<&[String]> {
        self.referring_fields.as_deref()
    }

    pub fn referred_field_names(&self) -> Option<&[String]> {
        self.referred_fields.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A non-owning many-to-many relation, optionally materialized through a join
/// schema.
#[derive(Debug, Clone)]
pub struct ManyToMany {
    records: Vec<Record>,
    this_side_fields: Vec<String>,
    other_side_fields: Vec<String>,
    via: Option<String>,
}

impl ManyToMany {
    pub fn new<I, S1, S2, T1, T2>(records: I, this_side: T1, other_side: T2) -> Self
    where
        I: IntoIterator<Item = Record>,
        T1: IntoIterator<Item = S1>,
        T2: IntoIterator<Item = S2>,
        S1: Into<String>,
        S2: Into<String>,
    {
        ManyToMany {
            records: records.into_iter().collect(),
            this_side_fields: this_side.into_iter().map(Into::into).collect(),
            other_side_fields: other_side.into_iter().map(Into::into).collect(),
            via: None,
        }
    }

    /// Name the join schema to materialize one synthetic record per pair.
    pub fn via(mut self, schema: impl Into<String>) -> Self {
        self.via = Some(schema.into());
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn this_side_field_names(&self) -> &[String] {
        &self.this_side_fields
    }

    pub fn other_side_field_names(&self) -> &[String] {
        &self.other_side_fields
    }

    pub fn via_schema(&self) -> Option<&str> {
        self.via.as_deref()
    }
}

/// The tagged union stored in a record's field map.
#[derive(Debug, Clone)]
pub enum Field {
    Literal(Value),
    Computed(Computed),
    BelongsTo(BelongsTo),
    HasMany(HasMany),
    ManyToMany(ManyToMany),
}

impl Field {
    /// Variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Field::Literal(_) => "literal",
            Field::Computed(_) => "computed",
            Field::BelongsTo(_) => "reference",
            Field::HasMany(_) => "collection",
            Field::ManyToMany(_) => "many-to-many collection",
        }
    }

    /// Whether the emitter can turn this field into a scalar.
    ///
    /// Collections never render; a reference renders only when it self-bound
    /// to its own field (otherwise the Walker already copied the scalar into
    /// separate foreign-key fields and this field is skipped).
    pub fn is_renderable(&self) -> bool {
        match self {
            Field::Literal(_) | Field::Computed(_) => true,
            Field::BelongsTo(r) => r.is_auto_rendered(),
            Field::HasMany(_) | Field::ManyToMany(_) => false,
        }
    }

    pub(crate) fn bind(&mut self, name: &str) {
        if let Field::BelongsTo(r) = self {
            r.bind(name);
        }
    }
}

/// Everything a field can be assigned from.
///
/// Coercion into a [`Field`] happens once, at assignment: bare scalars become
/// literals, a record becomes an implicit reference bound to the field, a
/// record collection becomes an implicit child collection bound to the field
/// name, and explicit declarations pass through (binding themselves where they
/// carry no local field spec).
#[derive(Debug, Clone)]
pub enum FieldInit {
    Value(Value),
    Record(Record),
    Records(Vec<Record>),
    Declared(Field),
}

impl FieldInit {
    /// Variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldInit::Value(v) => v.kind(),
            FieldInit::Record(_) => "record",
            FieldInit::Records(_) => "collection",
            FieldInit::Declared(f) => f.kind(),
        }
    }

    pub(crate) fn into_field(self, name: &str) -> Field {
        match self {
            FieldInit::Value(v) => Field::Literal(v),
            FieldInit::Record(record) => {
                // implicit reference: this field is the foreign key
                let target_fields = record.identity_field_names();
                Field::BelongsTo(
                    BelongsTo::to(&record)
                        .local([name])
                        .target_fields(target_fields),
                )
            }
            FieldInit::Records(records) => {
                // implicit child collection keyed by this field's name
                Field::HasMany(HasMany::new(records).referring([name]))
            }
            FieldInit::Declared(mut field) => {
                field.bind(name);
                field
            }
        }
    }
}

impl From<Value> for FieldInit {
    fn from(v: Value) -> Self {
        FieldInit::Value(v)
    }
}

macro_rules! init_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldInit {
                fn from(v: $ty) -> Self {
                    FieldInit::Value(v.into())
                }
            }
        )*
    };
}

init_from_scalar!(bool, i32, i64, u32, f64, &str, String, NaiveDate, NaiveTime, NaiveDateTime);

impl From<Record> for FieldInit {
    fn from(record: Record) -> Self {
        FieldInit::Record(record)
    }
}

impl From<&Record> for FieldInit {
    fn from(record: &Record) -> Self {
        FieldInit::Record(record.clone())
    }
}

impl From<Vec<Record>> for FieldInit {
    fn from(records: Vec<Record>) -> Self {
        FieldInit::Records(records)
    }
}

impl From<BelongsTo> for FieldInit {
    fn from(r: BelongsTo) -> Self {
        FieldInit::Declared(Field::BelongsTo(r))
    }
}

impl From<HasMany> for FieldInit {
    fn from(c: HasMany) -> Self {
        FieldInit::Declared(Field::HasMany(c))
    }
}

impl From<ManyToMany> for FieldInit {
    fn from(m: ManyToMany) -> Self {
        FieldInit::Declared(Field::ManyToMany(m))
    }
}

impl From<Computed> for FieldInit {
    fn from(c: Computed) -> Self {
        FieldInit::Declared(Field::Computed(c))
    }
}
