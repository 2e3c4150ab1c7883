//! Record factories
//!
//! A factory captures a schema, an identity spec, and a set of default field
//! initializers so a test can stamp out records varying only what matters.
//! Defaults are re-coerced per record, so a computed default produces a fresh
//! evaluation for every instance.

use crate::field::FieldInit;
use crate::record::{Identity, Record};

/// A reusable template for records of one schema.
#[derive(Clone)]
pub struct Factory {
    schema: String,
    identity: Identity,
    defaults: Vec<(String, FieldInit)>,
}

impl Factory {
    /// A factory for a schema, identified by an `id` field unless overridden.
    pub fn new(schema: impl Into<String>) -> Self {
        Factory {
            schema: schema.into(),
            identity: Identity::field("id"),
            defaults: Vec::new(),
        }
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Add a default initializer, applied to every built record in
    /// declaration order.
    pub fn default_field(mut self, name: impl Into<String>, value: impl Into<FieldInit>) -> Self {
        self.defaults.push((name.into(), value.into()));
        self
    }

    pub fn build(&self) -> Record {
        let record = Record::new(&self.schema, self.identity.clone());
        for (name, init) in &self.defaults {
            record.set(name, init.clone());
        }
        record
    }

    /// Build with per-record overrides layered over the defaults.
    pub fn build_with<I, S>(&self, overrides: I) -> Record
    where
        I: IntoIterator<Item = (S, FieldInit)>,
        S: Into<String>,
    {
        let record = self.build();
        for (name, init) in overrides {
            record.set(&name.into(), init);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Computed;
    use crate::value::Value;

    #[test]
    fn test_defaults_and_overrides() {
        let factory = Factory::new("player")
            .identity(Identity::auto("id"))
            .default_field("name", "anon")
            .default_field("level", 1);
        let a = factory.build();
        let b = factory.build_with([("name", FieldInit::from("alice"))]);
        assert_eq!(a.value("name").unwrap(), Value::Text("anon".into()));
        assert_eq!(b.value("name").unwrap(), Value::Text("alice".into()));
        assert_eq!(b.value("level").unwrap(), Value::Int(1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_computed_default_is_fresh_per_record() {
        use std::cell::Cell;
        use std::rc::Rc;
        let counter = Rc::new(Cell::new(0));
        let seen = counter.clone();
        let factory = Factory::new("event").default_field(
            "seq",
            Computed::new(move |_, _| {
                seen.set(seen.get() + 1);
                seen.get() as i64
            }),
        );
        let a = factory.build();
        let b = factory.build();
        assert_eq!(a.value("seq").unwrap(), Value::Int(1));
        assert_eq!(b.value("seq").unwrap(), Value::Int(2));
    }
}
