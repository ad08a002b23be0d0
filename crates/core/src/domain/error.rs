use thiserror::Error;

/// Rule violations inside domain types
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid delivery state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown dose status: {0}")]
    UnknownDoseStatus(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
