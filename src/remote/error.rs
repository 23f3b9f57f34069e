//! Remote operation errors.

use thiserror::Error;

/// A remote operation was rejected by the service or its transport.
///
/// Causes are undifferentiated: connectivity loss, permission denial, a
/// malformed path, and quota exhaustion all surface as this one kind,
/// carrying whatever the underlying call reported. Nothing is retried;
/// each failed call resolves exactly once with this error.
#[derive(Error, Debug)]
#[error("remote request rejected: {reason}")]
pub struct RemoteWriteError {
    reason: String,
}

impl RemoteWriteError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// What the service or transport reported.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<reqwest::Error> for RemoteWriteError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.to_string())
    }
}
