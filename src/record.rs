//! Records and identity specifications
//!
//! A [`Record`] is a cheap shared handle to one labeled instance: a schema
//! label, an identity-field spec, and a name → field map. Equality and hashing
//! go through an opaque creation-order id, never through field values, so two
//! structurally equal records are still two records and are never silently
//! merged during resolution.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Result, SeedError};
use crate::field::{Field, FieldInit};
use crate::value::Value;

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque per-process record handle, assigned at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

/// How records of a schema are identified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// Explicit ordered identity fields.
    Fields(Vec<String>),
    /// One field to be assigned from the collection's sequence on first
    /// registration.
    Auto(String),
}

impl Identity {
    pub fn field(name: impl Into<String>) -> Self {
        Identity::Fields(vec![name.into()])
    }

    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Identity::Fields(names.into_iter().map(Into::into).collect())
    }

    pub fn auto(name: impl Into<String>) -> Self {
        Identity::Auto(name.into())
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Identity::Auto(_))
    }

    /// The identity field names, in order. An auto marker names one field.
    pub fn field_names(&self) -> Vec<String> {
        match self {
            Identity::Fields(names) => names.clone(),
            Identity::Auto(name) => vec![name.clone()],
        }
    }
}

struct Inner {
    schema: String,
    identity: Identity,
    fields: BTreeMap<String, Field>,
    /// Injected "is this field declared in the backing schema" check,
    /// installed by the catalog adapter.
    guard: Option<Rc<dyn Fn(&str) -> bool>>,
}

/// A single labeled record. Clones share the same underlying instance.
#[derive(Clone)]
pub struct Record {
    id: RecordId,
    inner: Rc<RefCell<Inner>>,
}

impl Record {
    pub fn new(schema: impl Into<String>, identity: Identity) -> Self {
        Record {
            id: RecordId(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed)),
            inner: Rc::new(RefCell::new(Inner {
                schema: schema.into(),
                identity,
                fields: BTreeMap::new(),
                guard: None,
            })),
        }
    }

    pub(crate) fn with_guard(
        schema: impl Into<String>,
        identity: Identity,
        guard: Rc<dyn Fn(&str) -> bool>,
    ) -> Self {
        let record = Record::new(schema, identity);
        record.inner.borrow_mut().guard = Some(guard);
        record
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn schema(&self) -> String {
        self.inner.borrow().schema.clone()
    }

    pub fn identity(&self) -> Identity {
        self.inner.borrow().identity.clone()
    }

    pub fn is_auto_identity(&self) -> bool {
        self.inner.borrow().identity.is_auto()
    }

    /// Identity field names, in declaration order.
    pub fn identity_field_names(&self) -> Vec<String> {
        self.inner.borrow().identity.field_names()
    }

    /// The identity tuple, computed from current field values.
    pub fn identity_values(&self) -> Result<Vec<Value>> {
        self.identity_field_names()
            .iter()
            .map(|name| self.value(name))
            .collect()
    }

    /// Assign a field, applying coercion and one-time binding.
    ///
    /// This never consults the catalog guard; use [`Record::try_set`] when the
    /// record is bound to a backing schema and the check matters.
    pub fn set(&self, name: &str, value: impl Into<FieldInit>) {
        let field = value.into().into_field(name);
        trace!(schema = %self.inner.borrow().schema, field = name, kind = field.kind(), "assign");
        self.inner.borrow_mut().fields.insert(name.to_string(), field);
    }

    /// Builder-style [`Record::set`].
    pub fn with(self, name: &str, value: impl Into<FieldInit>) -> Self {
        self.set(name, value);
        self
    }

    /// Assign a field, checking any declared foreign-key field names against
    /// the injected backing-schema guard.
    pub fn try_set(&self, name: &str, value: impl Into<FieldInit>) -> Result<()> {
        let field = value.into().into_field(name);
        self.check_declared(name, &field)?;
        self.inner.borrow_mut().fields.insert(name.to_string(), field);
        Ok(())
    }

    fn check_declared(&self, name: &str, field: &Field) -> Result<()> {
        let inner = self.inner.borrow();
        let guard = match &inner.guard {
            Some(guard) => guard,
            None => return Ok(()),
        };
        let mut checked: Vec<&str> = Vec::new();
        match field {
            Field::BelongsTo(r) => {
                if let Some(locals) = r.local_field_names() {
                    checked.extend(locals.iter().map(String::as_str));
                }
            }
            Field::HasMany(c) => {
                checked.push(name);
                if let Some(referred) = c.referred_field_names() {
                    checked.extend(referred.iter().map(String::as_str));
                }
            }
            _ => {}
        }
        for column in checked {
            if !guard(column) {
                return Err(SeedError::UndeclaredColumn {
                    table: inner.schema.clone(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Overwrite a field with a plain literal. Used by the Walker when it
    /// fills foreign keys and by auto-identity assignment.
    pub(crate) fn set_value(&self, name: &str, value: Value) {
        self.inner
            .borrow_mut()
            .fields
            .insert(name.to_string(), Field::Literal(value));
    }

    /// Snapshot of one field's variant.
    pub fn field(&self, name: &str) -> Option<Field> {
        self.inner.borrow().fields.get(name).cloned()
    }

    /// Snapshot of the whole field map, lexically ordered by name.
    pub fn fields(&self) -> Vec<(String, Field)> {
        self.inner
            .borrow()
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.inner.borrow().fields.contains_key(name)
    }

    /// Read a field as a scalar.
    ///
    /// Literals are returned as-is, computed fields are re-evaluated on every
    /// call, and a reference renders its target's single identity value.
    /// Collections are not scalars.
    pub fn value(&self, name: &str) -> Result<Value> {
        let field = self.field(name).ok_or_else(|| SeedError::UnknownField {
            schema: self.schema(),
            field: name.to_string(),
        })?;
        match field {
            Field::Literal(v) => Ok(v),
            Field::Computed(c) => match c.evaluate(self, name) {
                FieldInit::Value(v) => Ok(v),
                other => Err(self.wrong_kind(name, "a scalar value", other.kind())),
            },
            Field::BelongsTo(r) => r.render(&self.schema(), name),
            other => Err(self.wrong_kind(name, "a scalar value", other.kind())),
        }
    }

    /// Read a field as a reference to another record, `None` when absent.
    pub fn related(&self, name: &str) -> Result<Option<Record>> {
        let field = self.field(name).ok_or_else(|| SeedError::UnknownField {
            schema: self.schema(),
            field: name.to_string(),
        })?;
        match field {
            Field::BelongsTo(r) => Ok(r.target().cloned()),
            Field::Computed(c) => match c.evaluate(self, name) {
                FieldInit::Record(r) => Ok(Some(r)),
                FieldInit::Declared(Field::BelongsTo(r)) => Ok(r.target().cloned()),
                other => Err(self.wrong_kind(name, "a record reference", other.kind())),
            },
            other => Err(self.wrong_kind(name, "a record reference", other.kind())),
        }
    }

    /// Read a field as its backing record collection.
    pub fn children(&self, name: &str) -> Result<Vec<Record>> {
        let field = self.field(name).ok_or_else(|| SeedError::UnknownField {
            schema: self.schema(),
            field: name.to_string(),
        })?;
        match field {
            Field::HasMany(c) => Ok(c.records().to_vec()),
            Field::ManyToMany(m) => Ok(m.records().to_vec()),
            Field::Computed(c) => match c.evaluate(self, name) {
                FieldInit::Records(records) => Ok(records),
                FieldInit::Declared(Field::HasMany(c)) => Ok(c.records().to_vec()),
                FieldInit::Declared(Field::ManyToMany(m)) => Ok(m.records().to_vec()),
                other => Err(self.wrong_kind(name, "a record collection", other.kind())),
            },
            other => Err(self.wrong_kind(name, "a record collection", other.kind())),
        }
    }

    fn wrong_kind(&self, name: &str, expected: &'static str, found: &'static str) -> SeedError {
        SeedError::WrongFieldKind {
            schema: self.schema(),
            field: name.to_string(),
            expected,
            found,
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Record")
            .field("schema", &inner.schema)
            .field("identity", &inner.identity)
            .field("fields", &inner.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.schema())?;
        for (i, name) in self.identity_field_names().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.value(name) {
                Ok(v) => write!(f, "{}={}", name, v)?,
                Err(_) => write!(f, "{}=?", name)?,
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Computed;

    #[test]
    fn test_identity_handle_equality() {
        let a = Record::new("S", Identity::field("id")).with("id", 1);
        let b = Record::new("S", Identity::field("id")).with("id", 1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_identity_values_on_demand() {
        let r = Record::new("S", Identity::fields(["a", "b"]))
            .with("a", 1)
            .with("b", "x");
        assert_eq!(
            r.identity_values().unwrap(),
            vec![Value::Int(1), Value::Text("x".into())]
        );
        r.set("a", 9);
        assert_eq!(r.identity_values().unwrap()[0], Value::Int(9));
    }

    #[test]
    fn test_undeclared_field_is_lookup_error() {
        let r = Record::new("S", Identity::field("id"));
        assert!(matches!(
            r.value("missing").unwrap_err(),
            SeedError::UnknownField { .. }
        ));
    }

    #[test]
    fn test_computed_reevaluates_every_read() {
        use std::cell::Cell;
        let counter = Rc::new(Cell::new(0));
        let seen = counter.clone();
        let r = Record::new("S", Identity::field("id")).with(
            "n",
            Computed::new(move |_, _| {
                seen.set(seen.get() + 1);
                seen.get() as i64
            }),
        );
        assert_eq!(r.value("n").unwrap(), Value::Int(1));
        assert_eq!(r.value("n").unwrap(), Value::Int(2));
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_computed_sees_later_foreign_keys() {
        let r = Record::new("S", Identity::field("id")).with(
            "label",
            Computed::new(|record: &Record, _| {
                format!("row-{}", record.value("id").map(|v| v.to_string()).unwrap_or_default())
            }),
        );
        r.set_value("id", Value::Int(5));
        assert_eq!(r.value("label").unwrap(), Value::Text("row-5".into()));
    }

    #[test]
    fn test_collection_read_is_not_scalar() {
        let child = Record::new("C", Identity::field("id")).with("id", 1);
        let r = Record::new("P", Identity::field("id")).with("items", vec![child]);
        assert!(matches!(
            r.value("items").unwrap_err(),
            SeedError::WrongFieldKind { .. }
        ));
        assert_eq!(r.children("items").unwrap().len(), 1);
    }
}
