use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::QuestionId;

/// One answer event, as handed to the attempt sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub sheet: String,
    pub question_id: QuestionId,
    pub category: String,
    pub is_correct: bool,
    pub chosen_choice: usize,
    pub chosen_text: String,
    pub time_taken_seconds: Option<f64>,
    pub answered_at: DateTime<Utc>,
}

/// Accuracy over recorded attempts for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAccuracy {
    pub category: String,
    pub attempts: u32,
    pub correct: u32,
}

impl CategoryAccuracy {
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.attempts)
        }
    }
}
