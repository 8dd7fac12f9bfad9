use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use quiz_core::model::{AnswerOutcome, CategoryStats, Question, QuestionId, ResultSummary};

use super::progress::{SessionPhase, SessionProgress};
use super::summary::{build_retry_session, summarize};
use crate::error::SessionError;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One play-through of an ordered, fixed list of questions.
///
/// Each question is answered exactly once, in order. Counters only change
/// through `submit_answer`; a completed session accepts no further answers.
pub struct QuizSession {
    sheet: String,
    questions: Vec<Question>,
    current: usize,
    answered: u32,
    correct: u32,
    streak: u32,
    category_stats: BTreeMap<String, CategoryStats>,
    missed: Vec<Question>,
    started_at: DateTime<Utc>,
    presented_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    /// Create a session over `questions` in the given order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptySelection` if no questions are provided.
    pub fn new(
        sheet: impl Into<String>,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::EmptySelection);
        }

        Ok(Self {
            sheet: sheet.into(),
            questions,
            current: 0,
            answered: 0,
            correct: 0,
            streak: 0,
            category_stats: BTreeMap::new(),
            missed: Vec::new(),
            started_at,
            presented_at: started_at,
            completed_at: None,
        })
    }

    #[must_use]
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the current question was shown to the player.
    #[must_use]
    pub fn presented_at(&self) -> DateTime<Utc> {
        self.presented_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Record when the current question was actually shown.
    ///
    /// Answering advances this automatically; front ends that pause on feedback
    /// call it again once the next question is on screen.
    pub fn mark_presented(&mut self, at: DateTime<Utc>) {
        self.presented_at = at;
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Position of the question to be answered next.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
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
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn category_stats(&self) -> &BTreeMap<String, CategoryStats> {
        &self.category_stats
    }

    /// Questions answered incorrectly, in the order they were encountered.
    #[must_use]
    pub fn missed(&self) -> &[Question] {
        &self.missed
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.questions.len().saturating_sub(self.current)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.current >= self.questions.len() {
            SessionPhase::Completed
        } else if self.current == 0 {
            SessionPhase::Created
        } else {
            SessionPhase::InProgress
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase() == SessionPhase::Completed
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.total_questions(),
            answered: self.answered,
            correct: self.correct,
            streak: self.streak,
            remaining: self.remaining(),
            phase: self.phase(),
        }
    }

    /// The question awaiting an answer, or `None` once the session is complete.
    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    /// Answer the current question and advance.
    ///
    /// `answered_at` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if every question was already answered, and
    /// `SessionError::AnswerOutOfRange` if `chosen` is not a valid choice index. Neither
    /// changes the session.
    pub fn submit_answer(
        &mut self,
        chosen: usize,
        answered_at: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        let Some(question) = self.questions.get(self.current) else {
            return Err(SessionError::Completed);
        };
        if !question.accepts(chosen) {
            return Err(SessionError::AnswerOutOfRange {
                index: chosen,
                choices: question.choices().len(),
            });
        }

        let is_correct = question.is_correct(chosen);
        let outcome = AnswerOutcome {
            question_id: question.id(),
            category: question.category().to_owned(),
            chosen_choice: chosen,
            correct_choice: question.correct_choice(),
            is_correct,
            explanation: question.explanation().to_owned(),
        };

        self.answered = self.answered.saturating_add(1);
        if is_correct {
            self.correct = self.correct.saturating_add(1);
            self.streak = self.streak.saturating_add(1);
        } else {
            self.streak = 0;
            self.missed.push(question.clone());
        }
        self.category_stats
            .entry(question.category().to_owned())
            .or_default()
            .record(is_correct);

        self.current += 1;
        self.presented_at = answered_at;
        if self.current >= self.questions.len() {
            self.completed_at = Some(answered_at);
        }

        Ok(outcome)
    }

    /// Results so far; valid in any phase.
    #[must_use]
    pub fn summary(&self) -> ResultSummary {
        summarize(self)
    }

    /// Start a new session over the missed questions whose IDs are in `selected`.
    ///
    /// # Errors
    ///
    /// See [`build_retry_session`].
    pub fn retry_missed(
        &self,
        selected: &HashSet<QuestionId>,
        started_at: DateTime<Utc>,
    ) -> Result<QuizSession, SessionError> {
        build_retry_session(&self.sheet, &self.missed, selected, started_at)
    }

    /// Start a new session over every missed question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyRetrySelection` when nothing was missed.
    pub fn retry_all_missed(&self, started_at: DateTime<Utc>) -> Result<QuizSession, SessionError> {
        let selected: HashSet<QuestionId> = self.missed.iter().map(Question::id).collect();
        self.retry_missed(&selected, started_at)
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("sheet", &self.sheet)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answered", &self.answered)
            .field("correct", &self.correct)
            .field("streak", &self.streak)
            .field("missed_len", &self.missed.len())
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::time::fixed_now;

    fn build_question(id: u64, category: &str, correct: usize) -> Question {
        Question::new(
            QuestionId::new(id),
            category,
            format!("Q{id}"),
            vec!["a".into(), "b".into(), "c".into()],
            correct,
            format!("explanation {id}"),
        )
        .unwrap()
    }

    fn build_session(questions: Vec<Question>) -> QuizSession {
        QuizSession::new("general", questions, fixed_now()).unwrap()
    }

    #[test]
    fn empty_session_returns_error() {
        let err = QuizSession::new("general", Vec::new(), fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::EmptySelection));
    }

    #[test]
    fn starts_in_created_phase() {
        let session = build_session(vec![build_question(1, "math", 0)]);
        assert_eq!(session.phase(), SessionPhase::Created);
        assert_eq!(session.current().map(Question::id), Some(QuestionId::new(1)));
        assert_eq!(session.answered(), 0);
        assert_eq!(session.correct(), 0);
        assert_eq!(session.streak(), 0);
        assert!(session.category_stats().is_empty());
        assert!(session.missed().is_empty());
    }

    #[test]
    fn right_wrong_right_scenario() {
        let mut session = build_session(vec![
            build_question(1, "math", 0),
            build_question(2, "math", 1),
            build_question(3, "art", 2),
        ]);

        let first = session.submit_answer(0, fixed_now()).unwrap();
        assert!(first.is_correct);
        assert_eq!(first.explanation, "explanation 1");
        assert_eq!(session.phase(), SessionPhase::InProgress);

        let second = session.submit_answer(2, fixed_now()).unwrap();
        assert!(!second.is_correct);
        assert_eq!(second.correct_choice, 1);
        assert_eq!(session.streak(), 0);

        let third = session.submit_answer(2, fixed_now()).unwrap();
        assert!(third.is_correct);

        assert!(session.is_complete());
        assert_eq!(session.answered(), 3);
        assert_eq!(session.correct(), 2);
        assert_eq!(session.streak(), 1);
        let missed: Vec<_> = session.missed().iter().map(Question::id).collect();
        assert_eq!(missed, vec![QuestionId::new(2)]);
        assert_eq!(session.completed_at(), Some(fixed_now()));
        assert!(session.current().is_none());
    }

    #[test]
    fn streak_tracks_consecutive_correct_answers() {
        let questions = (1..=6).map(|id| build_question(id, "c", 0)).collect();
        let mut session = build_session(questions);
        let answers = [0, 0, 1, 0, 0, 0];
        let mut previous = 0;
        for chosen in answers {
            let outcome = session.submit_answer(chosen, fixed_now()).unwrap();
            let expected = if outcome.is_correct { previous + 1 } else { 0 };
            assert_eq!(session.streak(), expected);
            previous = session.streak();
        }
        assert_eq!(session.streak(), 3);
        assert_eq!(session.answered(), 6);
        assert_eq!(session.correct(), 5);
    }

    #[test]
    fn category_stats_only_cover_encountered_categories() {
        let mut session = build_session(vec![
            build_question(1, "math", 0),
            build_question(2, "art", 0),
            build_question(3, "math", 0),
            build_question(4, "history", 0),
        ]);
        session.submit_answer(0, fixed_now()).unwrap();
        session.submit_answer(1, fixed_now()).unwrap();
        session.submit_answer(1, fixed_now()).unwrap();

        let stats = session.category_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["math"], CategoryStats { total: 2, correct: 1 });
        assert_eq!(stats["art"], CategoryStats { total: 1, correct: 0 });
        assert!(!stats.contains_key("history"));
    }

    #[test]
    fn out_of_range_answer_fails_without_state_change() {
        let mut session = build_session(vec![build_question(1, "math", 0)]);
        let err = session.submit_answer(3, fixed_now()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::AnswerOutOfRange {
                index: 3,
                choices: 3
            }
        ));
        assert_eq!(session.answered(), 0);
        assert_eq!(session.current_index(), 0);
        assert!(session.missed().is_empty());
    }

    #[test]
    fn answering_completed_session_fails() {
        let mut session = build_session(vec![build_question(1, "math", 0)]);
        session.submit_answer(0, fixed_now()).unwrap();
        let err = session.submit_answer(0, fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::Completed));
        assert_eq!(session.answered(), 1);
    }

    #[test]
    fn answering_advances_presentation_time() {
        let mut session = build_session(vec![build_question(1, "c", 0), build_question(2, "c", 0)]);
        let later = fixed_now() + Duration::seconds(30);
        session.submit_answer(0, later).unwrap();
        assert_eq!(session.presented_at(), later);

        let shown = later + Duration::seconds(5);
        session.mark_presented(shown);
        assert_eq!(session.presented_at(), shown);
    }

    #[test]
    fn progress_reflects_counters() {
        let mut session = build_session(vec![build_question(1, "c", 0), build_question(2, "c", 0)]);
        session.submit_answer(0, fixed_now()).unwrap();
        let progress = session.progress();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.correct, 1);
        assert_eq!(progress.remaining, 1);
        assert_eq!(progress.phase, SessionPhase::InProgress);
        assert!(!progress.is_complete());
    }

    #[test]
    fn retry_all_missed_keeps_sheet_and_order() {
        let mut session = build_session(vec![
            build_question(5, "c", 0),
            build_question(2, "c", 0),
            build_question(9, "c", 0),
        ]);
        for _ in 0..3 {
            session.submit_answer(1, fixed_now()).unwrap();
        }

        let retry = session.retry_all_missed(fixed_now()).unwrap();
        assert_eq!(retry.sheet(), "general");
        let ids: Vec<_> = retry.questions().iter().map(Question::id).collect();
        assert_eq!(ids, vec![QuestionId::new(5), QuestionId::new(2), QuestionId::new(9)]);
        assert_eq!(retry.phase(), SessionPhase::Created);
    }

    #[test]
    fn retry_without_misses_is_rejected() {
        let mut session = build_session(vec![build_question(1, "c", 0)]);
        session.submit_answer(0, fixed_now()).unwrap();
        let err = session.retry_all_missed(fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::EmptyRetrySelection));
    }
}
