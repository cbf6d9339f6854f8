use folio_core::{ErrorKind, FolioError};
use thiserror::Error;

/// Typed failure handed back by the coordinator and the upload orchestrator.
///
/// Cloneable so that a single in-flight fetch can report the same failure to
/// every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DocsError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DocsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Builds an error from a per-item reason reported inside a successful
    /// batch response.
    pub fn from_reason(reason: impl Into<String>) -> Self {
        FolioError::Rejected(reason.into()).into()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl From<FolioError> for DocsError {
    fn from(err: FolioError) -> Self {
        Self {
            kind: err.classification(),
            message: err.reason(),
        }
    }
}
