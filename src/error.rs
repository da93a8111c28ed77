//! Error types for feed parsing and planning.
//!
//! [`ParseError`] covers problems with individual rows or with the shape of a
//! feed. Row-level parse errors are recovered by dropping the row; feed-level
//! ones abort the load. [`PlanError`] is what callers of the pipeline see.

/// A problem reading a traffic or neighborhood feed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Geometry cell was not of the form `POINT (lon lat)`.
    #[error("malformed geometry {0:?}, expected `POINT (lon lat)`")]
    Geometry(String),

    /// A required column is absent from the feed header.
    #[error("missing column {0:?}")]
    MissingColumn(String),

    /// The same `{Day}_{Period}` column appears twice.
    #[error("duplicate count column {0:?}")]
    DuplicateColumn(String),

    /// The header contains no `{Day}_{Period}` count columns at all.
    #[error("feed has no count columns")]
    NoCountColumns,

    /// A row has fewer cells than the header.
    #[error("row is missing the {0:?} cell")]
    MissingCell(String),

    /// A site id cell is empty.
    #[error("row has an empty site id")]
    EmptySiteId,

    /// A count cell is neither empty nor a non-negative number.
    #[error("invalid count {value:?} in column {column:?}")]
    InvalidCount { column: String, value: String },

    /// A neighborhood entry is missing a field or has the wrong type.
    #[error("neighborhood {name:?}: {message}")]
    Neighborhood { name: String, message: String },
}

/// Errors that abort a planning run.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("feed parse error: {0}")]
    Parse(#[from] ParseError),

    /// Nonsensical configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The optimizer was handed an empty candidate set.
    #[error("no candidate sites supplied to the optimizer")]
    NoCandidates,

    /// The requested candidate day does not occur in the feed.
    #[error("candidate day {0:?} is not present in the traffic feed")]
    UnknownDay(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
