//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::SelectionError;
use storage::repository::StorageError;

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions match your criteria")]
    EmptySelection,
    #[error("invalid selection criteria: {0}")]
    InvalidCriteria(#[from] SelectionError),
    #[error("choice {index} is out of range for a question with {choices} choices")]
    AnswerOutOfRange { index: usize, choices: usize },
    #[error("session already completed")]
    Completed,
    #[error("no missed questions were selected for retry")]
    EmptyRetrySelection,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuestionBankService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("sheet name is required")]
    MissingSheet,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
