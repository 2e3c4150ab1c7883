//! Schema dependency graph
//!
//! Directed graph at schema granularity: an edge X → Y records "records of X
//! carry a foreign key into Y". A schema's weight counts itself plus every
//! schema that transitively references it, so sorting by descending weight
//! puts the most-depended-upon schemas first, the order in which they must be
//! emitted for referential constraints to hold.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

/// Directed schema-dependency graph with cached weights.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
    // invalidated wholesale on every edge insertion
    weights: RefCell<HashMap<String, u64>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, label: &str) -> NodeIndex {
        if let Some(&idx) = self.indices.get(label) {
            return idx;
        }
        let idx = self.graph.add_node(label.to_string());
        self.indices.insert(label.to_string(), idx);
        idx
    }

    /// Record that `referencing` depends on `referenced`. A `None` target
    /// still registers `referencing` as a node with no dependency.
    pub fn add_edge(&mut self, referencing: &str, referenced: Option<&str>) {
        let from = self.intern(referencing);
        if let Some(referenced) = referenced {
            let to = self.intern(referenced);
            self.graph.update_edge(from, to, ());
        }
        self.weights.borrow_mut().clear();
    }

    pub fn contains(&self, schema: &str) -> bool {
        self.indices.contains_key(schema)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// 1 + the weight of every schema referencing this one, transitively.
    /// A schema revisited during one computation contributes nothing more, so
    /// cyclic reference graphs terminate. Unknown schemas weigh 0.
    pub fn weight(&self, schema: &str) -> u64 {
        if let Some(&weight) = self.weights.borrow().get(schema) {
            return weight;
        }
        let Some(&idx) = self.indices.get(schema) else {
            return 0;
        };
        let mut seen = HashSet::new();
        let weight = self.weight_of(idx, &mut seen);
        self.weights.borrow_mut().insert(schema.to_string(), weight);
        weight
    }

    fn weight_of(&self, idx: NodeIndex, seen: &mut HashSet<NodeIndex>) -> u64 {
        if !seen.insert(idx) {
            return 0;
        }
        let mut weight = 1;
        for referencing in self.graph.neighbors_directed(idx, Direction::Incoming) {
            weight += self.weight_of(referencing, seen);
        }
        weight
    }

    /// All known schema labels, ascending by weight; ties break on the label
    /// itself so the order is reproducible.
    pub fn ordered_schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = self.graph.node_weights().cloned().collect();
        schemas.sort_by(|a, b| self.weight(a).cmp(&self.weight(b)).then_with(|| a.cmp(b)));
        schemas
    }

    /// All known schema labels, descending by weight with the label ascending
    /// on ties: the order in which schemas must be emitted.
    pub fn emission_order(&self) -> Vec<String> {
        let mut schemas: Vec<String> = self.graph.node_weights().cloned().collect();
        schemas.sort_by(|a, b| self.weight(b).cmp(&self.weight(a)).then_with(|| a.cmp(b)));
        schemas
    }
}
