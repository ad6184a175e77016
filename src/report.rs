//! The most-recent-failure slot read by the calling layer.

use crate::error::DirectoryError;
use std::sync::Mutex;

/// Records the most recent operation failure for later inspection.
///
/// One slot per authenticator instance, overwritten by each new failure and
/// cleared at the start of every top-level call, mirroring a per-request
/// error context. The calling layer reads it after an operation returns a
/// failure indicator, e.g. to render a diagnostic.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    last: Mutex<Option<DirectoryError>>,
}

impl ErrorReporter {
    /// Creates an empty reporter.
    pub fn new() -> Self {
        ErrorReporter::default()
    }

    /// Stores the error, replacing any previous one.
    pub fn record(&self, err: &DirectoryError) {
        *self.slot() = Some(err.to_recorded());
    }

    /// The most recently recorded error, if any.
    pub fn last(&self) -> Option<DirectoryError> {
        self.slot().as_ref().map(DirectoryError::to_recorded)
    }

    /// Empties the slot.
    pub fn clear(&self) {
        *self.slot() = None;
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<DirectoryError>> {
        match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
