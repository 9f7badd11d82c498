use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing credential: {name}")]
    MissingCredential { name: &'static str },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Row {row} ({company}) not found")]
    RowNotFound { row: u32, company: String },

    #[error("Row {row} no longer holds '{company}' and it could not be re-resolved")]
    StaleRow { row: u32, company: String },

    #[error("Row {row} changed since it was read: expected version {expected}, found {found}")]
    VersionConflict { row: u32, expected: i64, found: i64 },

    #[error("Unknown rule tag '{tag}'")]
    UnknownRuleTag { tag: String },

    #[error("Draft generator failed: {reason}")]
    Generator { reason: String },

    #[error(
        "Another cycle holds the run lock at {path} (pid {})",
        .pid.map_or_else(|| "unknown".to_string(), |p| p.to_string())
    )]
    LockHeld { path: String, pid: Option<u32> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SentinelError {
    /// Errors that abort a cycle wherever they are raised.
    /// Store errors are fatal only during the bulk read; the cycle
    /// controller makes that call, not this method.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SentinelError::MissingCredential { .. }
                | SentinelError::InvalidConfig { .. }
                | SentinelError::LockHeld { .. }
                | SentinelError::Io(_)
        )
    }
}

pub type SentinelResult<T> = Result<T, SentinelError>;
