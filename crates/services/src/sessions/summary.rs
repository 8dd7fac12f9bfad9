use chrono::{DateTime, Utc};
use std::collections::HashSet;

use quiz_core::model::{Question, QuestionId, ResultSummary};

use super::service::QuizSession;
use crate::error::SessionError;

/// Derive the result summary of `session`. Never mutates; valid mid-session.
#[must_use]
pub fn summarize(session: &QuizSession) -> ResultSummary {
    ResultSummary::new(
        session.answered(),
        session.correct(),
        session.streak(),
        session.category_stats().clone(),
        session.missed().to_vec(),
    )
}

/// Build a fresh session over the `missed` questions whose IDs are in `selected`.
///
/// Relative order from `missed` is preserved. Only already-loaded questions are
/// used; no repository is consulted.
///
/// # Errors
///
/// Returns `SessionError::EmptyRetrySelection` when `selected` is empty, and
/// `SessionError::EmptySelection` when none of the selected IDs were missed.
pub fn build_retry_session(
    sheet: &str,
    missed: &[Question],
    selected: &HashSet<QuestionId>,
    started_at: DateTime<Utc>,
) -> Result<QuizSession, SessionError> {
    if selected.is_empty() {
        return Err(SessionError::EmptyRetrySelection);
    }

    let questions: Vec<Question> = missed
        .iter()
        .filter(|q| selected.contains(&q.id()))
        .cloned()
        .collect();

    QuizSession::new(sheet, questions, started_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::CategoryStats;
    use quiz_core::time::fixed_now;

    fn build_question(id: u64, category: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            category,
            format!("Q{id}"),
            vec!["right".into(), "wrong".into()],
            0,
            "",
        )
        .unwrap()
    }

    fn ids(values: &[u64]) -> HashSet<QuestionId> {
        values.iter().copied().map(QuestionId::new).collect()
    }

    #[test]
    fn summary_of_fresh_session_is_zeroed() {
        let session = QuizSession::new("s", vec![build_question(1, "c")], fixed_now()).unwrap();
        let summary = summarize(&session);
        assert_eq!(summary.answered(), 0);
        assert_eq!(summary.correct(), 0);
        assert!(summary.accuracy().abs() < f64::EPSILON);
        assert!(summary.category_stats().is_empty());
        assert!(summary.missed().is_empty());
    }

    #[test]
    fn partial_summary_matches_session_state() {
        let questions = vec![
            build_question(1, "math"),
            build_question(2, "math"),
            build_question(3, "art"),
            build_question(4, "art"),
        ];
        let mut session = QuizSession::new("s", questions, fixed_now()).unwrap();
        session.submit_answer(0, fixed_now()).unwrap();
        session.submit_answer(1, fixed_now()).unwrap();
        session.submit_answer(1, fixed_now()).unwrap();

        let summary = summarize(&session);
        assert_eq!(summary.answered(), 3);
        assert_eq!(summary.correct(), 1);
        assert_eq!(summary.streak(), 0);
        assert!((summary.accuracy() - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(
            summary.category_stats()["math"],
            CategoryStats { total: 2, correct: 1 }
        );
        assert_eq!(summary.missed_ids(), vec![QuestionId::new(2), QuestionId::new(3)]);
        assert!(!session.is_complete());
    }

    #[test]
    fn category_totals_sum_to_answered() {
        let questions: Vec<_> = (1..=9)
            .map(|id| build_question(id, ["a", "b", "c"][(id % 3) as usize]))
            .collect();
        let mut session = QuizSession::new("s", questions, fixed_now()).unwrap();
        for i in 0..9 {
            session.submit_answer(i % 2, fixed_now()).unwrap();
        }
        let summary = session.summary();
        let total: u32 = summary.category_stats().values().map(|s| s.total).sum();
        let correct: u32 = summary.category_stats().values().map(|s| s.correct).sum();
        assert_eq!(total, summary.answered());
        assert_eq!(correct, summary.correct());
        assert!(summary.category_stats().values().all(|s| s.correct <= s.total));
        assert_eq!(summary.missed().len() as u32, summary.incorrect());
    }

    #[test]
    fn retry_preserves_missed_order_and_resets_counters() {
        let missed = vec![build_question(7, "c"), build_question(3, "c"), build_question(5, "c")];
        let retry = build_retry_session("s", &missed, &ids(&[5, 7]), fixed_now()).unwrap();

        let order: Vec<_> = retry.questions().iter().map(Question::id).collect();
        assert_eq!(order, vec![QuestionId::new(7), QuestionId::new(5)]);
        assert_eq!(retry.answered(), 0);
        assert_eq!(retry.correct(), 0);
        assert_eq!(retry.streak(), 0);
        assert!(retry.category_stats().is_empty());
        assert!(retry.missed().is_empty());
    }

    #[test]
    fn empty_retry_selection_is_rejected() {
        let missed = vec![build_question(1, "c")];
        let err = build_retry_session("s", &missed, &HashSet::new(), fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::EmptyRetrySelection));
    }

    #[test]
    fn retry_selection_outside_missed_is_empty() {
        let missed = vec![build_question(1, "c")];
        let err = build_retry_session("s", &missed, &ids(&[2]), fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::EmptySelection));
    }
}
