use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::model::{Question, QuestionId};

/// Per-category answer tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub total: u32,
    pub correct: u32,
}

impl CategoryStats {
    /// Count one answer in this category.
    pub fn record(&mut self, is_correct: bool) {
        self.total = self.total.saturating_add(1);
        if is_correct {
            self.correct = self.correct.saturating_add(1);
        }
    }

    /// Fraction of correct answers, 0 when nothing was answered.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.total)
    }
}

/// Feedback for a single submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub question_id: QuestionId,
    pub category: String,
    pub chosen_choice: usize,
    pub correct_choice: usize,
    pub is_correct: bool,
    pub explanation: String,
}

/// Aggregate results of a (possibly partial) quiz session.
///
/// `accuracy` is the exact ratio `correct / answered`; round only when displaying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    answered: u32,
    correct: u32,
    accuracy: f64,
    streak: u32,
    category_stats: BTreeMap<String, CategoryStats>,
    /// Full questions stay in memory for retry; only their IDs are serialized.
    #[serde(serialize_with = "serialize_ids")]
    missed: Vec<Question>,
}

impl ResultSummary {
    #[must_use]
    pub fn new(
        answered: u32,
        correct: u32,
        streak: u32,
        category_stats: BTreeMap<String, CategoryStats>,
        missed: Vec<Question>,
    ) -> Self {
        Self {
            answered,
            correct,
            accuracy: ratio(correct, answered),
            streak,
            category_stats,
            missed,
        }
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.answered.saturating_sub(self.correct)
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Accuracy as a whole percentage, for display only.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn accuracy_percent(&self) -> u32 {
        (self.accuracy * 100.0).round() as u32
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn category_stats(&self) -> &BTreeMap<String, CategoryStats> {
        &self.category_stats
    }

    #[must_use]
    pub fn missed(&self) -> &[Question] {
        &self.missed
    }

    #[must_use]
    pub fn missed_ids(&self) -> Vec<QuestionId> {
        self.missed.iter().map(Question::id).collect()
    }
}

fn serialize_ids<S: Serializer>(questions: &[Question], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(questions.iter().map(Question::id))
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        f64::from(numerator) / f64::from(denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_is_zero_without_answers() {
        let summary = ResultSummary::new(0, 0, 0, BTreeMap::new(), Vec::new());
        assert!(summary.accuracy().abs() < f64::EPSILON);
        assert_eq!(summary.accuracy_percent(), 0);
    }

    #[test]
    fn accuracy_is_exact_ratio() {
        let summary = ResultSummary::new(3, 2, 1, BTreeMap::new(), Vec::new());
        assert!((summary.accuracy() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.accuracy_percent(), 67);
        assert_eq!(summary.incorrect(), 1);
    }

    #[test]
    fn category_stats_record() {
        let mut stats = CategoryStats::default();
        stats.record(true);
        stats.record(false);
        assert_eq!(stats, CategoryStats { total: 2, correct: 1 });
        assert!((stats.accuracy() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_serializes_flat_category_map() {
        let mut stats = BTreeMap::new();
        stats.insert("math".to_owned(), CategoryStats { total: 2, correct: 1 });
        let summary = ResultSummary::new(2, 1, 0, stats, Vec::new());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["answered"], 2);
        assert_eq!(json["category_stats"]["math"]["total"], 2);
        assert_eq!(json["category_stats"]["math"]["correct"], 1);
        assert_eq!(json["accuracy"], 0.5);
    }

    #[test]
    fn missed_questions_serialize_as_ids() {
        let question = |id| {
            Question::new(
                QuestionId::new(id),
                "math",
                "2 + 2?",
                vec!["3".to_owned(), "4".to_owned()],
                1,
                "",
            )
            .unwrap()
        };
        let summary = ResultSummary::new(2, 0, 0, BTreeMap::new(), vec![question(7), question(3)]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["missed"], serde_json::json!([7, 3]));
        assert_eq!(summary.missed().len(), 2);
    }
}
