use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{
    AnswerOutcome, AttemptRecord, CategoryPolicy, QuestionId, SelectionCriteria,
};
use quiz_core::time::elapsed_seconds;
use storage::repository::{AttemptRepository, QuestionRepository, SkippedRow};
use tracing::{debug, info, warn};

use super::plan::SelectionPolicy;
use super::service::QuizSession;
use crate::Clock;
use crate::error::SessionError;

const DEFAULT_REPORTER_TIMEOUT: Duration = Duration::from_secs(2);

/// How a session's question list was derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReport {
    /// Usable questions that passed the category filter.
    pub matching: usize,
    pub selected: usize,
    /// Rows excluded because they could not be normalized.
    pub skipped_rows: Vec<SkippedRow>,
}

/// Result of answering a single question in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAnswerResult {
    pub outcome: AnswerOutcome,
    pub is_complete: bool,
    /// Whether the attempt sink stored this answer.
    pub recorded: bool,
}

/// Orchestrates session start from the question bank and answering with attempt reporting.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    attempts: Option<Arc<dyn AttemptRepository>>,
    category_policy: CategoryPolicy,
    selection: SelectionPolicy,
    reporter_timeout: Duration,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(clock: Clock, questions: Arc<dyn QuestionRepository>) -> Self {
        Self {
            clock,
            questions,
            attempts: None,
            category_policy: CategoryPolicy::default(),
            selection: SelectionPolicy::from_entropy(),
            reporter_timeout: DEFAULT_REPORTER_TIMEOUT,
        }
    }

    /// Record every answer to `attempts`. Without a sink, answers are not reported.
    #[must_use]
    pub fn with_reporter(mut self, attempts: Arc<dyn AttemptRepository>) -> Self {
        self.attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn with_reporter_timeout(mut self, timeout: Duration) -> Self {
        self.reporter_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_category_policy(mut self, policy: CategoryPolicy) -> Self {
        self.category_policy = policy;
        self
    }

    /// Use a seeded random source for `random` ordering.
    #[must_use]
    pub fn with_selection_seed(mut self, seed: Option<u64>) -> Self {
        self.selection = seed.map_or_else(SelectionPolicy::from_entropy, SelectionPolicy::seeded);
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Start a new session for the given criteria.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidCriteria` for a rejected request,
    /// `SessionError::EmptySelection` when no usable question matches, or
    /// `SessionError::Storage` on repository failures.
    pub async fn start_session(
        &self,
        criteria: &SelectionCriteria,
    ) -> Result<(QuizSession, SelectionReport), SessionError> {
        let filter = criteria.resolve(self.category_policy)?;
        let matching = self.questions.matching_ids(&criteria.sheet, &filter).await?;

        for row in &matching.skipped {
            warn!(
                sheet = %criteria.sheet,
                question_id = row.id,
                reason = %row.reason,
                "skipping malformed question row"
            );
        }

        let ids = self.selection.select(criteria, &matching.ids)?;
        if ids.is_empty() {
            info!(sheet = %criteria.sheet, "no questions match selection");
            return Err(SessionError::EmptySelection);
        }
        debug!(sheet = %criteria.sheet, order = %criteria.order, ?ids, "selected questions");

        let questions = self.questions.get_questions(&criteria.sheet, &ids).await?;
        let session = QuizSession::new(criteria.sheet.clone(), questions, self.clock.now())?;

        let report = SelectionReport {
            matching: matching.ids.len(),
            selected: session.total_questions(),
            skipped_rows: matching.skipped,
        };
        info!(
            sheet = %criteria.sheet,
            matching = report.matching,
            selected = report.selected,
            skipped = report.skipped_rows.len(),
            "session started"
        );
        Ok((session, report))
    }

    /// Start a retry session over the selected missed questions of `session`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyRetrySelection` or `SessionError::EmptySelection`
    /// when nothing would be retried.
    pub fn start_retry(
        &self,
        session: &QuizSession,
        selected: &HashSet<QuestionId>,
    ) -> Result<QuizSession, SessionError> {
        let retry = session.retry_missed(selected, self.clock.now())?;
        info!(
            sheet = %retry.sheet(),
            questions = retry.total_questions(),
            "retry session started"
        );
        Ok(retry)
    }

    /// Answer the current question, then report the attempt on a best-effort basis.
    ///
    /// The session is updated before the sink is called; a failing or slow sink
    /// only shows up as `recorded == false`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` or `SessionError::AnswerOutOfRange` from the session.
    pub async fn answer_current(
        &self,
        session: &mut QuizSession,
        chosen: usize,
    ) -> Result<SessionAnswerResult, SessionError> {
        let answered_at = self.clock.now();
        let presented_at = session.presented_at();
        let chosen_text = session
            .current()
            .and_then(|q| q.choice(chosen))
            .map(str::to_owned)
            .unwrap_or_default();

        let outcome = session.submit_answer(chosen, answered_at)?;
        let is_complete = session.is_complete();
        if is_complete {
            info!(
                sheet = %session.sheet(),
                answered = session.answered(),
                correct = session.correct(),
                "session completed"
            );
        }

        let recorded = match &self.attempts {
            Some(sink) => {
                let attempt = AttemptRecord {
                    sheet: session.sheet().to_owned(),
                    question_id: outcome.question_id,
                    category: outcome.category.clone(),
                    is_correct: outcome.is_correct,
                    chosen_choice: outcome.chosen_choice,
                    chosen_text,
                    time_taken_seconds: Some(elapsed_seconds(presented_at, answered_at)),
                    answered_at,
                };
                self.report(sink.as_ref(), &attempt).await
            }
            None => false,
        };

        Ok(SessionAnswerResult {
            outcome,
            is_complete,
            recorded,
        })
    }

    async fn report(&self, sink: &dyn AttemptRepository, attempt: &AttemptRecord) -> bool {
        match tokio::time::timeout(self.reporter_timeout, sink.append_attempt(attempt)).await {
            Ok(Ok(id)) => {
                debug!(attempt_id = id, question_id = %attempt.question_id, "attempt recorded");
                true
            }
            Ok(Err(err)) => {
                warn!(error = %err, question_id = %attempt.question_id, "failed to record attempt");
                false
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.reporter_timeout.as_millis(),
                    question_id = %attempt.question_id,
                    "recording attempt timed out"
                );
                false
            }
        }
    }
}
