//! Per-schema record collections and the suite that owns them

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::graph::DependencyGraph;
use crate::record::{Identity, Record, RecordId};
use crate::value::Value;

/// The unique records registered for one schema, plus the sequence used to
/// assign auto identities.
#[derive(Debug)]
pub struct RecordSet {
    schema: String,
    records: Vec<Record>,
    seen: HashSet<RecordId>,
    seq: i64,
}

impl RecordSet {
    fn new(schema: &str) -> Self {
        RecordSet {
            schema: schema.to_string(),
            records: Vec::new(),
            seen: HashSet::new(),
            seq: 1,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Register a record. Returns false when this exact record (by handle,
    /// not by value) is already present. On first registration an auto
    /// identity gets the next sequence value, starting at 1.
    pub fn add(&mut self, record: &Record) -> bool {
        if !self.seen.insert(record.id()) {
            return false;
        }
        debug!(schema = %self.schema, record = %record, "adding record");
        if let Identity::Auto(field) = record.identity() {
            record.set_value(&field, Value::Int(self.seq));
            self.seq += 1;
        }
        self.records.push(record.clone());
        true
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.seen.contains(&record.id())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records ascending by the value of their first identity field; records
    /// whose identity cannot be read keep their insertion position.
    pub fn ordered(&self) -> Vec<Record> {
        let mut keyed: Vec<(Option<Value>, Record)> = self
            .records
            .iter()
            .map(|record| {
                let key = record
                    .identity_field_names()
                    .first()
                    .and_then(|name| record.value(name).ok());
                (key, record.clone())
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => a.compare(b),
            _ => std::cmp::Ordering::Equal,
        });
        keyed.into_iter().map(|(_, record)| record).collect()
    }
}

/// Owns the dependency graph and one [`RecordSet`] per schema.
///
/// Iteration yields the sets in descending weight order: a schema that other
/// schemas point to always comes before the schemas referencing it.
#[derive(Debug, Default)]
pub struct Suite {
    collections: BTreeMap<String, RecordSet>,
    graph: DependencyGraph,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// The collection for a schema, created (together with a no-dependency
    /// graph node) the first time the schema is referenced.
    pub fn collection_for(&mut self, schema: &str) -> &mut RecordSet {
        if !self.collections.contains_key(schema) {
            self.graph.add_edge(schema, None);
            self.collections
                .insert(schema.to_string(), RecordSet::new(schema));
        }
        self.collections.get_mut(schema).expect("just inserted")
    }

    pub fn add_dependency(&mut self, depending: &str, depended_on: &str) {
        self.graph.add_edge(depending, Some(depended_on));
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn get(&self, schema: &str) -> Option<&RecordSet> {
        self.collections.get(schema)
    }

    /// Schema labels in emission order (descending weight, then label).
    /// Schemas the graph knows but that never materialized a collection are
    /// skipped.
    pub fn schemas(&self) -> Vec<String> {
        self.graph
            .emission_order()
            .into_iter()
            .filter(|schema| self.collections.contains_key(schema))
            .collect()
    }

    /// The record sets, heaviest schema first.
    pub fn collections(&self) -> impl Iterator<Item = &RecordSet> {
        self.schemas()
            .into_iter()
            .map(|schema| &self.collections[&schema])
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl std::ops::Index<&str> for Suite {
    type Output = RecordSet;

    fn index(&self, schema: &str) -> &RecordSet {
        self.collections
            .get(schema)
            .unwrap_or_else(|| panic!("no collection for schema {}", schema))
    }
}

impl<'a> IntoIterator for &'a Suite {
    type Item = &'a RecordSet;
    type IntoIter = std::vec::IntoIter<&'a RecordSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.collections()
            .collect::<Vec<_>>()
            .into_iter()
    }
}
