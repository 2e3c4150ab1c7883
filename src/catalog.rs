//! Backing-schema catalog
//!
//! An optional bridge between free-form records and a concrete table layout.
//! A catalog knows the tables, their columns, defaults, and primary keys;
//! records built through it come pre-populated with every column, derive
//! their identity from the primary key, and reject foreign-key declarations
//! naming columns the table does not have.

use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeedError};
use crate::field::FieldInit;
use crate::record::{Identity, Record};
use crate::value::Value;

/// One column of a table definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub autoincrement: bool,
}

/// One table: columns plus the primary-key column names, in key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        TableDef {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            default: None,
            autoincrement: false,
        });
        self
    }

    pub fn column_with_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            default: Some(default.into()),
            autoincrement: false,
        });
        self
    }

    /// An autoincrement column that is also the sole primary key.
    pub fn auto_primary_key(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.columns.push(ColumnDef {
            name: name.clone(),
            default: None,
            autoincrement: true,
        });
        self.primary_key = vec![name];
        self
    }

    pub fn primary_key<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// The identity implied by the primary key: a single autoincrement key
    /// column assigns from the collection sequence, anything else is explicit.
    pub fn identity(&self) -> Identity {
        if let [key] = self.primary_key.as_slice() {
            let auto = self
                .columns
                .iter()
                .any(|c| &c.name == key && c.autoincrement);
            if auto {
                return Identity::Auto(key.clone());
            }
        }
        Identity::Fields(self.primary_key.clone())
    }
}

/// A source of table definitions.
pub trait Catalog {
    fn table(&self, name: &str) -> Option<&TableDef>;

    /// Build a record backed by one of the catalog's tables.
    ///
    /// Every non-autoincrement column is pre-populated with its default (or
    /// NULL), overrides are applied on top with the column check active, and
    /// the identity is derived from the primary key. A caller-supplied
    /// identity must agree with the derived one.
    fn record(
        &self,
        table: &str,
        identity: Option<Identity>,
        overrides: Vec<(String, FieldInit)>,
    ) -> Result<Record> {
        let def = self
            .table(table)
            .ok_or_else(|| SeedError::UnknownTable(table.to_string()))?;
        let derived = def.identity();
        if let Some(given) = identity {
            if given != derived {
                return Err(SeedError::IdentityMismatch {
                    given: given.field_names().join(", "),
                    expected: derived.field_names().join(", "),
                });
            }
        }
        let declared: Rc<HashSet<String>> =
            Rc::new(def.columns.iter().map(|c| c.name.clone()).collect());
        let guard = Rc::new(move |name: &str| declared.contains(name));
        let record = Record::with_guard(&def.name, derived, guard);
        for column in &def.columns {
            if column.autoincrement {
                continue;
            }
            let value = column.default.clone().unwrap_or(Value::Null);
            record.set(&column.name, value);
        }
        for (name, value) in overrides {
            record.try_set(&name, value)?;
        }
        Ok(record)
    }
}

/// An in-memory catalog assembled by hand (or deserialized).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCatalog {
    tables: Vec<TableDef>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, def: TableDef) -> Self {
        self.tables.push(def);
        self
    }
}

impl Catalog for StaticCatalog {
    fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }
}
