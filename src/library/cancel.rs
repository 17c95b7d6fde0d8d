//! Cooperative cancellation for long-running scans and synchronization.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::error::domain::LibraryError;

/// Shared flag checked between items of a long operation, never mid-item.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancellation point.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Cancelled` once cancellation was requested.
    pub fn check(&self) -> Result<(), LibraryError> {
        if self.is_cancelled() {
            Err(LibraryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{error::domain::LibraryError, library::cancel::CancelToken};

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(LibraryError::Cancelled)));
    }
}
