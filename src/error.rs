//! Error types for record resolution and emission

use thiserror::Error;

/// Result type for seedgraph operations
pub type Result<T> = std::result::Result<T, SeedError>;

/// Resolution, lookup, and emission errors
///
/// Everything here is raised synchronously while a record graph is being
/// resolved or emitted, and aborts the whole run. Fixture construction is
/// deterministic setup code, so there is no partial-failure recovery.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("{schema}.{field}: referring field count does not match referred field count ({referring} != {referred})")]
    ReferringCountMismatch {
        schema: String,
        field: String,
        referring: usize,
        referred: usize,
    },

    #[error("{schema}.{field}: referring field count does not match identity field count ({referring} != {identity})")]
    IdentityCountMismatch {
        schema: String,
        field: String,
        referring: usize,
        identity: usize,
    },

    #[error("{schema}.{field}: local field count does not match target field count ({local} != {target})")]
    TargetCountMismatch {
        schema: String,
        field: String,
        local: usize,
        target: usize,
    },

    #[error("{schema}.{field}: this-side field count does not match the identity field count ({fields} != {identity})")]
    ThisSideCountMismatch {
        schema: String,
        field: String,
        fields: usize,
        identity: usize,
    },

    #[error("{schema}.{field}: other-side field count does not match the related record's identity field count ({fields} != {identity})")]
    OtherSideCountMismatch {
        schema: String,
        field: String,
        fields: usize,
        identity: usize,
    },

    #[error("field {field} of record {record} is declared to reference {declared} while its container is {actual}")]
    ConflictingSchema {
        record: String,
        field: String,
        declared: String,
        actual: String,
    },

    #[error("field {field} of record {record} is declared to reference {actual} via {declared} while {expected} was expected")]
    ConflictingTarget {
        record: String,
        field: String,
        actual: String,
        declared: String,
        expected: String,
    },

    #[error("record {record} has more than one reference to {schema}")]
    AmbiguousReference { record: String, schema: String },

    #[error("cannot determine the foreign key fields; record {record} declares no reference to {schema}")]
    MissingReference { record: String, schema: String },

    #[error("{schema}.{field}: cannot determine the target fields of the reference")]
    UnresolvedTargetFields { schema: String, field: String },

    #[error("{schema}.{field}: multiple identity fields cannot be rendered into a single field")]
    MultiFieldRender { schema: String, field: String },

    #[error("{schema}.{field}: expected {expected}, found {found}")]
    WrongFieldKind {
        schema: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{schema}.{field}: undeclared field")]
    UnknownField { schema: String, field: String },

    #[error("table {0} is not defined in the catalog")]
    UnknownTable(String),

    #[error("column {column} is not declared in table {table}")]
    UndeclaredColumn { table: String, column: String },

    #[error("identity fields do not match the table definition ([{given}] != [{expected}])")]
    IdentityMismatch { given: String, expected: String },

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
