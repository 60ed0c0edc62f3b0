use crate::data::model::Column;

/// Every failure the core can report.
///
/// Load and column-level failures are contained inside the pipeline and
/// only logged; query failures are handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source file is missing, unreadable or malformed.
    #[error("failed to load telemetry: {0}")]
    Load(String),

    /// A check references a column that is absent or has the wrong kind.
    #[error("column '{column}': {reason}")]
    Column { column: Column, reason: String },

    /// Degenerate statistics for a single column.
    #[error("computation on column '{column}' failed: {reason}")]
    Computation { column: Column, reason: String },

    /// Caller-supplied identifier, date or enum value could not be parsed.
    #[error("{0}")]
    InvalidArgument(String),

    /// A well-formed query matched nothing.
    #[error("{0}")]
    NotFound(String),

    /// The datetime column was not loaded as a temporal column.
    #[error("{0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn vessel_not_found(vessel_code: i64) -> Self {
        Error::NotFound(format!("Vessel code {vessel_code} does not exist."))
    }
}
