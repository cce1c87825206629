use thiserror::Error;

/// Shared error type for the four core subsystems, mirroring the teacher's
/// per-crate `thiserror` enum split described in DESIGN.md.
#[derive(Debug, Error)]
pub enum VitaLedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl VitaLedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        VitaLedgerError::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        VitaLedgerError::Storage(msg.into())
    }
}
