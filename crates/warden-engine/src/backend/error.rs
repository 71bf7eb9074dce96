use thiserror::Error;

/// Error codes a backend reports through [`Backend::poll_error`].
///
/// [`Backend::poll_error`]: super::Backend::poll_error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("invalid enum: {0}")]
    InvalidEnum(&'static str),
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("out of memory")]
    OutOfMemory,
    #[error("context unavailable: {0}")]
    ContextLost(String),
}
