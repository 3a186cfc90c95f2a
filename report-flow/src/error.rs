use thiserror::Error;

/// Errors produced while driving a report session.
///
/// Controllers never hand these to the orchestrator. They are folded into controller state
/// (an upload error banner, an assistant message) at the controller boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Rejected on the client before any network call was made.
    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Report extraction failed: {0}")]
    ExtractionFailed(String),

    /// `detail` carries the server-supplied message when the error body had one.
    #[error("Answer failed: {message}")]
    AnswerFailed {
        message: String,
        detail: Option<String>,
    },

    #[error("Preference storage error: {0}")]
    StorageError(String),

    #[error("Session closed")]
    SessionClosed,
}

impl FlowError {
    pub fn answer_failed(message: impl Into<String>, detail: Option<String>) -> Self {
        Self::AnswerFailed {
            message: message.into(),
            detail,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
