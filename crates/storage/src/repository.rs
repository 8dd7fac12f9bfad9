use async_trait::async_trait;
use quiz_core::model::{
    AttemptRecord, CategoryAccuracy, CategoryFilter, MAX_CHOICES, Question, QuestionError,
    QuestionId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── QUESTION ROWS ─────────────────────────────────────────────────────────────
//

/// Raw question row as stored in a sheet.
///
/// `choices` may contain blank cells and `answer` may hold either a 1-based
/// choice number or the literal text of the correct choice. `into_question`
/// normalizes both before anything reaches a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Blank in import files that rely on a sheet given on the command line.
    #[serde(default)]
    pub sheet: String,
    pub id: u64,
    pub category: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(sheet: impl Into<String>, question: &Question) -> Self {
        Self {
            sheet: sheet.into(),
            id: question.id().value(),
            category: question.category().to_owned(),
            prompt: question.prompt().to_owned(),
            choices: question.choices().to_vec(),
            answer: (question.correct_choice() + 1).to_string(),
            explanation: question.explanation().to_owned(),
        }
    }

    /// Normalize the row into a validated `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the row has more than four choice cells
    /// (blank or not), no prompt, fewer than two non-blank choices, or an
    /// answer that resolves to no choice.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        if self.choices.len() > MAX_CHOICES {
            return Err(QuestionError::TooManyCells(self.choices.len()));
        }
        let choices: Vec<String> = self
            .choices
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();
        let correct = resolve_answer(&self.answer, &choices)?;
        Question::new(
            QuestionId::new(self.id),
            self.category,
            self.prompt,
            choices,
            correct,
            self.explanation,
        )
    }
}

/// Resolve a stored answer cell to a 0-based choice index.
///
/// A 1-based number wins when it is in range; otherwise the trimmed text must
/// equal exactly one choice's trimmed text.
fn resolve_answer(raw: &str, choices: &[String]) -> Result<usize, QuestionError> {
    let answer = raw.trim();
    let numeric = answer.parse::<usize>().ok();

    if let Some(n) = numeric {
        if (1..=choices.len()).contains(&n) {
            return Ok(n - 1);
        }
    }

    if !answer.is_empty() {
        if let Some(pos) = choices.iter().position(|c| c.trim() == answer) {
            return Ok(pos);
        }
    }

    match numeric {
        Some(n) if n > 0 => Err(QuestionError::CorrectChoiceOutOfRange {
            index: n - 1,
            choices: choices.len(),
        }),
        _ => Err(QuestionError::UnresolvableAnswer(raw.to_owned())),
    }
}

/// A row excluded from selection because it could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub id: u64,
    pub reason: QuestionError,
}

/// IDs of the usable questions that match a filter, plus the rows that were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchingQuestions {
    pub ids: Vec<QuestionId>,
    pub skipped: Vec<SkippedRow>,
}

impl MatchingQuestions {
    /// Normalize category-matching records, splitting usable IDs from malformed rows.
    pub fn from_records(
        records: impl IntoIterator<Item = QuestionRecord>,
        filter: &CategoryFilter,
    ) -> Self {
        let mut out = Self::default();
        for record in records.into_iter().filter(|r| filter.matches(&r.category)) {
            let id = record.id;
            match record.into_question() {
                Ok(question) => out.ids.push(question.id()),
                Err(reason) => out.skipped.push(SkippedRow { id, reason }),
            }
        }
        out
    }
}

/// Distinct categories of the records that normalize, sorted.
pub(crate) fn usable_categories(records: impl IntoIterator<Item = QuestionRecord>) -> Vec<String> {
    records
        .into_iter()
        .filter_map(|r| r.into_question().ok())
        .map(|q| q.category().to_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for question banks.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Names of all sheets, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn sheet_names(&self) -> Result<Vec<String>, StorageError>;

    /// Distinct categories of usable questions in a sheet, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn categories(&self, sheet: &str) -> Result<Vec<String>, StorageError>;

    /// IDs of usable questions in `sheet` whose category passes `filter`, ascending.
    ///
    /// Rows that cannot be normalized are reported in `MatchingQuestions::skipped`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn matching_ids(
        &self,
        sheet: &str,
        filter: &CategoryFilter,
    ) -> Result<MatchingQuestions, StorageError>;

    /// Fetch full questions in exactly the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any ID is missing, or
    /// `StorageError::Serialization` if a requested row is malformed.
    async fn get_questions(
        &self,
        sheet: &str,
        ids: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError>;

    /// Insert or replace a raw question row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_record(&self, record: &QuestionRecord) -> Result<(), StorageError>;
}

/// Sink for answer events and the per-category accuracy derived from them.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append one attempt and return its row ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError>;

    /// Accuracy per category over all attempts recorded for `sheet`, sorted by category.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn category_accuracy(&self, sheet: &str) -> Result<Vec<CategoryAccuracy>, StorageError>;

    /// Delete recorded attempts for one sheet, or all sheets when `None`.
    /// Returns the number of removed attempts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn reset_attempts(&self, sheet: Option<&str>) -> Result<u64, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<BTreeMap<(String, u64), QuestionRecord>>>,
    attempts: Arc<Mutex<Vec<AttemptRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded attempts, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn attempts(&self) -> Result<Vec<AttemptRecord>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    fn sheet_records(&self, sheet: &str) -> Result<Vec<QuestionRecord>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .range((sheet.to_owned(), 0)..=(sheet.to_owned(), u64::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn sheet_names(&self) -> Result<Vec<String>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let names: BTreeSet<String> = guard.keys().map(|(sheet, _)| sheet.clone()).collect();
        Ok(names.into_iter().collect())
    }

    async fn categories(&self, sheet: &str) -> Result<Vec<String>, StorageError> {
        Ok(usable_categories(self.sheet_records(sheet)?))
    }

    async fn matching_ids(
        &self,
        sheet: &str,
        filter: &CategoryFilter,
    ) -> Result<MatchingQuestions, StorageError> {
        Ok(MatchingQuestions::from_records(
            self.sheet_records(sheet)?,
            filter,
        ))
    }

    async fn get_questions(
        &self,
        sheet: &str,
        ids: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            let record = guard
                .get(&(sheet.to_owned(), id.value()))
                .cloned()
                .ok_or(StorageError::NotFound)?;
            let question = record
                .into_question()
                .map_err(|e| StorageError::Serialization(format!("question {id}: {e}")))?;
            found.push(question);
        }
        Ok(found)
    }

    async fn upsert_record(&self, record: &QuestionRecord) -> Result<(), StorageError> {
        if record.choices.len() > MAX_CHOICES {
            return Err(StorageError::Serialization(format!(
                "question {} has {} choices, at most {MAX_CHOICES} can be stored",
                record.id,
                record.choices.len()
            )));
        }
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((record.sheet.clone(), record.id), record.clone());
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(attempt.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Serialization("attempt id overflow".into()))
    }

    async fn category_accuracy(&self, sheet: &str) -> Result<Vec<CategoryAccuracy>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut by_category: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
        for attempt in guard.iter().filter(|a| a.sheet == sheet) {
            let entry = by_category.entry(attempt.category.as_str()).or_default();
            entry.0 = entry.0.saturating_add(1);
            if attempt.is_correct {
                entry.1 = entry.1.saturating_add(1);
            }
        }
        Ok(by_category
            .into_iter()
            .map(|(category, (attempts, correct))| CategoryAccuracy {
                category: category.to_owned(),
                attempts,
                correct,
            })
            .collect())
    }

    async fn reset_attempts(&self, sheet: Option<&str>) -> Result<u64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let before = guard.len();
        match sheet {
            Some(sheet) => guard.retain(|a| a.sheet != sheet),
            None => guard.clear(),
        }
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}

/// Aggregates the question and attempt repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self {
            questions,
            attempts,
        }
    }
}
