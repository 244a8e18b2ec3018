use thiserror::Error;

/// Errors raised while constructing core values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A subject identifier was empty or whitespace.
    #[error("subject identifier must not be empty")]
    EmptySubject,
    /// A task key was empty or whitespace.
    #[error("task key must not be empty")]
    EmptyTaskKey,
}
