use thiserror::Error;

use crate::recurrence::RuleError;
use crate::storage::StorageError;

/// Errors surfaced by the command layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid repetition rule: {0}")]
    Rule(#[from] RuleError),
    #[error("task {0} not found")]
    TaskNotFound(u64),
    #[error("task {0} does not repeat")]
    NotRecurring(u64),
    #[error("invalid date '{0}'. Use YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),
    #[error("a frequency is required when repetition options are given")]
    MissingFrequency,
}

pub type Result<T> = std::result::Result<T, Error>;
