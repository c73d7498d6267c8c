//! Context helpers for `Result` and `Option`.

use super::{BeadsError, Result};

/// Attach operation context to an error while keeping the source chain.
pub trait ResultExt<T> {
    /// Wrap the error with a fixed context message.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error if `self` is `Err`.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily built context message.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error if `self` is `Err`.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| BeadsError::WithContext {
            context: context.into(),
            source: Box::new(source),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| BeadsError::WithContext {
            context: f().into(),
            source: Box::new(source),
        })
    }
}

/// Convert a missing issue lookup into `IssueNotFound`.
pub trait OptionExt<T> {
    /// # Errors
    ///
    /// Returns `IssueNotFound` with `id` if `self` is `None`.
    fn ok_or_not_found(self, id: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, id: &str) -> Result<T> {
        self.ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })
    }
}
