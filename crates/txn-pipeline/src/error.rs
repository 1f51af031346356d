//! Pipeline error taxonomy
//!
//! Every variant is fatal to the run that raised it. The only lenient rule in
//! the pipeline (non-numeric amounts become missing) never produces an error.

use thiserror::Error;

use crate::stages::StageName;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Top-level error for stages and the driver
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    SecretAccess(#[from] SecretAccessError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    DataFormat(#[from] DataFormatError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stage chain: {0}")]
    InvalidChain(String),
}

// ============================================================================
// Secrets
// ============================================================================

/// Why a secret lookup failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretAccessKind {
    NotFound,
    AccessDenied,
    Throttled,
    /// The secret exists but its payload is not a usable credential bundle
    Malformed,
    Other,
}

impl std::fmt::Display for SecretAccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SecretAccessKind::NotFound => "not found",
            SecretAccessKind::AccessDenied => "access denied",
            SecretAccessKind::Throttled => "throttled",
            SecretAccessKind::Malformed => "malformed",
            SecretAccessKind::Other => "unavailable",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
#[error("Secret '{secret_id}' {kind}: {message}")]
pub struct SecretAccessError {
    pub kind: SecretAccessKind,
    pub secret_id: String,
    pub message: String,
}

impl SecretAccessError {
    pub fn new(
        kind: SecretAccessKind,
        secret_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            secret_id: secret_id.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Hand-off
// ============================================================================

/// A hand-off value could not be authenticated or decoded
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Hand-off value is not valid base64: {0}")]
    Encoding(String),

    #[error("Hand-off value is truncated: {0} bytes")]
    Truncated(usize),

    #[error("Hand-off value failed authentication: tampered, wrong key, or wrong run/slot")]
    Authentication,

    #[error("Hand-off plaintext is not valid UTF-8")]
    Utf8,
}

/// Misuse of the run-scoped hand-off slots
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HandoffError {
    #[error("Slot '{0}' was already written in this run")]
    AlreadyWritten(&'static str),

    #[error("Slot '{0}' has not been written in this run")]
    Missing(&'static str),
}

// ============================================================================
// Source data
// ============================================================================

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum DataFormatError {
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Source is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Row {row}: {fields} fields, but the header has {expected}")]
    TooManyFields {
        row: usize,
        fields: usize,
        expected: usize,
    },

    #[error("Row {row}: unparsable transaction_date {value:?}")]
    InvalidDate { row: usize, value: String },

    #[error("Row {row}: user_id {value:?} is not an integer")]
    InvalidUserId { row: usize, value: String },
}

// ============================================================================
// Database
// ============================================================================

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let Some(db_err) = err.as_database_error() {
            if matches!(
                db_err.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
                    | ErrorKind::ForeignKeyViolation
            ) {
                return DatabaseError::ConstraintViolation(db_err.message().to_string());
            }
        }
        DatabaseError::Query(err)
    }
}

// ============================================================================
// Run failure
// ============================================================================

/// A run halted at `stage`; stages after it never ran.
#[derive(Error, Debug)]
#[error("Run {run_id} failed in stage '{stage}': {source}")]
pub struct RunError {
    pub run_id: uuid::Uuid,
    pub stage: StageName,
    #[source]
    pub source: PipelineError,
}
