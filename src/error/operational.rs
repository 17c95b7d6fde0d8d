//! Operational error context propagation with `anyhow`.
//!
//! Used by the binary, where errors only need rich context for the log and
//! a readable message for the terminal.

use std::{error::Error as StdError, fmt::Display};

use {
    anyhow::{Context, Error, Result as AnyhowResult},
    tracing::{error, warn},
};

/// Extension trait for adding context to library results.
pub trait ResultExt<T, E> {
    /// Adds context to an error with a static string.
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;

    /// Adds context to an error with a formatted value.
    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(context)
    }

    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(format.to_string())
    }
}

/// Centralized error reporting.
pub struct ErrorReporter;

impl ErrorReporter {
    /// Logs a recoverable problem, e.g. a library that failed to scan while
    /// others are still usable.
    pub fn warn(error: &Error, context: &str) {
        warn!(context = context, error = %error, "Recoverable library error");
    }

    /// Logs a problem that ends the current operation.
    pub fn error(error: &Error, context: &str) {
        error!(context = context, error = %error, "Library operation failed");
    }

    /// Formats an error chain as a single line, outermost context first.
    pub fn to_user_message(error: &Error) -> String {
        error
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ")
    }
}
