use thiserror::Error;

use crate::models::QuestionId;

/// Errors surfaced by the quiz engine. None of them are retried internally.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The tag structure of an imported document could not be resolved.
    #[error("malformed document at offset {offset}: {reason}")]
    MalformedDocument { offset: usize, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Replacement target is absent from the quiz.
    #[error("question {question_id} not found under category '{category}'")]
    NotFound {
        category: String,
        question_id: QuestionId,
    },

    #[error("question store unavailable during {operation}: {reason}")]
    StoreUnavailable { operation: String, reason: String },

    #[error("quiz draft not found: {key}")]
    DraftNotFound { key: String },

    #[error("quiz draft storage failed for {key}: {reason}")]
    DraftStorage { key: String, reason: String },

    #[error("cannot read document {path}: {reason}")]
    DocumentUnreadable { path: String, reason: String },

    #[error("quiz serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QuizError {
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        QuizError::MalformedDocument {
            offset,
            reason: reason.into(),
        }
    }

    pub fn store_unavailable(operation: impl Into<String>, reason: impl ToString) -> Self {
        QuizError::StoreUnavailable {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Transient failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuizError::StoreUnavailable { .. })
    }
}

/// Relabelled with the failing store operation by `timed_store_call`.
impl From<mongodb::error::Error> for QuizError {
    fn from(err: mongodb::error::Error) -> Self {
        QuizError::store_unavailable("mongodb", err)
    }
}

pub type QuizResult<T> = Result<T, QuizError>;
