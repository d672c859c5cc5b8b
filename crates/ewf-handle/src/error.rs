//! Error type for the handle state machine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HandleError>;

/// Errors surfaced by `Handle`. Wraps the format/core error kinds plus
/// the handle-level states that have no counterpart below it.
#[derive(Error, Debug)]
pub enum HandleError {
    #[error(transparent)]
    Format(#[from] ewf_core::Error),

    #[error("handle is not in a state that permits this operation: {0}")]
    WrongState(String),

    #[error("no segment files were given to open()")]
    NoSegmentFiles,

    #[error("hash verification failed: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("acquisition was cancelled")]
    Cancelled,
}
