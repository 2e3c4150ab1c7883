//! Seedgraph
//!
//! A hierarchical seed-record builder: describe a graph of related records,
//! resolve it into per-schema collections with every foreign key filled in,
//! and emit the result as SQL INSERT statements in an order that satisfies
//! referential constraints.
//!
//! ## Features
//!
//! - **Record Graphs**: Plain records reference each other directly; foreign
//!   keys are inferred and filled during resolution
//! - **Implicit Declarations**: Assigning a record, a record list, or a
//!   closure to a field coerces it into the right relationship variant
//! - **Dependency Ordering**: Schemas are weighted by who references them and
//!   emitted most-depended-upon first
//! - **Auto Identities**: Per-collection sequences assign surrogate keys on
//!   first registration
//! - **Catalog Binding**: Records can be built against declared table
//!   definitions, with defaults and column checks
//!
//! ## Architecture
//!
//! ```text
//! Record graph            resolution               emission
//! ┌──────────┐      ┌─────────────────────┐    ┌──────────────┐
//! │ Record   │      │ Walker              │    │ InsertBatcher│
//! │  fields ─┼────► │  fills foreign keys │ ─► │  multi-row   │
//! │  refs    │      │  registers records  │    │  INSERTs per │
//! └──────────┘      │ Suite + DepGraph    │    │  schema      │
//!                   └─────────────────────┘    └──────────────┘
//! ```

pub mod catalog;
pub mod error;
pub mod factory;
pub mod field;
pub mod graph;
pub mod record;
pub mod sql;
pub mod suite;
pub mod value;
pub mod walker;

pub use catalog::{Catalog, ColumnDef, StaticCatalog, TableDef};
pub use error::{Result, SeedError};
pub use factory::Factory;
pub use field::{BelongsTo, Computed, Field, FieldInit, HasMany, ManyToMany};
pub use graph::DependencyGraph;
pub use record::{Identity, Record, RecordId};
pub use sql::{emit_suite, emit_suite_to_string, InsertBatcher, SqlOptions};
pub use suite::{RecordSet, Suite};
pub use value::Value;
pub use walker::{resolve, Walker};
