use serde::Serialize;
use thiserror::Error;

use crate::model::ids::QuestionId;

/// Fewest choices a question may present.
pub const MIN_CHOICES: usize = 2;
/// Most choices a question may present.
pub const MAX_CHOICES: usize = 4;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question category cannot be empty")]
    EmptyCategory,

    #[error("question must have between 2 and 4 choices, got {0}")]
    ChoiceCount(usize),

    #[error("row has {0} choice cells, at most 4 are allowed")]
    TooManyCells(usize),

    #[error("choice {0} is empty")]
    EmptyChoice(usize),

    #[error("correct choice index {index} is out of range for {choices} choices")]
    CorrectChoiceOutOfRange { index: usize, choices: usize },

    #[error("answer {0:?} matches neither a choice number nor a choice text")]
    UnresolvableAnswer(String),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question as loaded into a session.
///
/// Choices are kept in presentation order. A `Question` is validated on
/// construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    id: QuestionId,
    category: String,
    prompt: String,
    choices: Vec<String>,
    correct_choice: usize,
    explanation: String,
}

impl Question {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt or category is blank, when there are
    /// not 2–4 non-empty choices, or when `correct_choice` does not index into `choices`.
    pub fn new(
        id: QuestionId,
        category: impl Into<String>,
        prompt: impl Into<String>,
        choices: Vec<String>,
        correct_choice: usize,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let category = category.into();
        let prompt = prompt.into();

        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if category.trim().is_empty() {
            return Err(QuestionError::EmptyCategory);
        }
        if !(MIN_CHOICES..=MAX_CHOICES).contains(&choices.len()) {
            return Err(QuestionError::ChoiceCount(choices.len()));
        }
        if let Some(pos) = choices.iter().position(|c| c.trim().is_empty()) {
            return Err(QuestionError::EmptyChoice(pos));
        }
        if correct_choice >= choices.len() {
            return Err(QuestionError::CorrectChoiceOutOfRange {
                index: correct_choice,
                choices: choices.len(),
            });
        }

        Ok(Self {
            id,
            category,
            prompt,
            choices,
            correct_choice,
            explanation: explanation.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// Text of the choice at `index`, if it exists.
    #[must_use]
    pub fn choice(&self, index: usize) -> Option<&str> {
        self.choices.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn correct_choice(&self) -> usize {
        self.correct_choice
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Returns true when `index` is a valid choice position for this question.
    #[must_use]
    pub fn accepts(&self, index: usize) -> bool {
        index < self.choices.len()
    }

    /// Returns true when `index` is the correct choice.
    #[must_use]
    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_choice
    }
}
