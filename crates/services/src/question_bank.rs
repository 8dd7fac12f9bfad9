use std::sync::Arc;

use quiz_core::model::CategoryAccuracy;
use storage::repository::{AttemptRepository, QuestionRecord, QuestionRepository, SkippedRow};
use tracing::{info, warn};

use crate::error::QuestionBankError;

/// Outcome of importing raw question rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub stored: usize,
    pub rejected: Vec<SkippedRow>,
}

/// Sheet/category listings, row import, and per-category progress.
#[derive(Clone)]
pub struct QuestionBankService {
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl QuestionBankService {
    #[must_use]
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            questions,
            attempts,
        }
    }

    /// List sheet names, sorted.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` if repository access fails.
    pub async fn sheets(&self) -> Result<Vec<String>, QuestionBankError> {
        Ok(self.questions.sheet_names().await?)
    }

    /// List the categories of usable questions in `sheet`, sorted.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::MissingSheet` for a blank name, or
    /// `QuestionBankError::Storage` if repository access fails.
    pub async fn categories(&self, sheet: &str) -> Result<Vec<String>, QuestionBankError> {
        if sheet.trim().is_empty() {
            return Err(QuestionBankError::MissingSheet);
        }
        Ok(self.questions.categories(sheet).await?)
    }

    /// Store rows that normalize into valid questions; report the rest.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` if persisting a valid row fails.
    pub async fn import(
        &self,
        records: impl IntoIterator<Item = QuestionRecord>,
    ) -> Result<ImportReport, QuestionBankError> {
        let mut report = ImportReport::default();
        for record in records {
            if record.sheet.trim().is_empty() {
                return Err(QuestionBankError::MissingSheet);
            }
            if let Err(reason) = record.clone().into_question() {
                warn!(sheet = %record.sheet, question_id = record.id, %reason, "rejecting question row");
                report.rejected.push(SkippedRow {
                    id: record.id,
                    reason,
                });
                continue;
            }
            self.questions.upsert_record(&record).await?;
            report.stored += 1;
        }
        info!(
            stored = report.stored,
            rejected = report.rejected.len(),
            "question import finished"
        );
        Ok(report)
    }

    /// Accuracy per category over recorded attempts in `sheet`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` if repository access fails.
    pub async fn progress(&self, sheet: &str) -> Result<Vec<CategoryAccuracy>, QuestionBankError> {
        Ok(self.attempts.category_accuracy(sheet).await?)
    }

    /// Forget recorded attempts for `sheet`, or for every sheet.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` if repository access fails.
    pub async fn reset_progress(&self, sheet: Option<&str>) -> Result<u64, QuestionBankError> {
        let removed = self.attempts.reset_attempts(sheet).await?;
        info!(sheet = sheet.unwrap_or("*"), removed, "attempts reset");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{CategoryFilter, QuestionError, QuestionId};
    use storage::repository::InMemoryRepository;
    use storage::sqlite::SqliteRepository;

    fn service(repo: &InMemoryRepository) -> QuestionBankService {
        QuestionBankService::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    fn record(id: u64, category: &str, answer: &str) -> QuestionRecord {
        QuestionRecord {
            sheet: "general".into(),
            id,
            category: category.into(),
            prompt: format!("Q{id}"),
            choices: vec!["yes".into(), "no".into()],
            answer: answer.into(),
            explanation: String::new(),
        }
    }

    #[tokio::test]
    async fn import_stores_valid_rows_and_reports_rejects() {
        let repo = InMemoryRepository::new();
        let bank = service(&repo);

        let report = bank
            .import(vec![record(1, "math", "1"), record(2, "math", "maybe"), record(3, "art", "no")])
            .await
            .unwrap();

        assert_eq!(report.stored, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].id, 2);
        assert_eq!(bank.sheets().await.unwrap(), vec!["general"]);
        assert_eq!(bank.categories("general").await.unwrap(), vec!["art", "math"]);
    }

    #[tokio::test]
    async fn oversized_row_is_rejected_before_reaching_sqlite() {
        let repo = SqliteRepository::open("sqlite:file:bank_oversized?mode=memory&cache=shared")
            .await
            .unwrap();
        let shared = Arc::new(repo);
        let bank = QuestionBankService::new(shared.clone(), shared);

        let mut oversized = record(2, "math", "1");
        oversized.choices = vec!["a".into(), "b".into(), "c".into(), "d".into(), String::new()];
        let report = bank
            .import(vec![record(1, "math", "1"), oversized, record(3, "math", "2")])
            .await
            .unwrap();

        assert_eq!(report.stored, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].id, 2);
        assert_eq!(report.rejected[0].reason, QuestionError::TooManyCells(5));
        let matching = shared_ids(&bank).await;
        assert_eq!(matching, vec![QuestionId::new(1), QuestionId::new(3)]);
    }

    async fn shared_ids(bank: &QuestionBankService) -> Vec<QuestionId> {
        bank.questions
            .matching_ids("general", &CategoryFilter::All)
            .await
            .unwrap()
            .ids
    }

    #[tokio::test]
    async fn blank_sheet_is_rejected() {
        let repo = InMemoryRepository::new();
        let bank = service(&repo);
        assert!(matches!(
            bank.categories(" ").await,
            Err(QuestionBankError::MissingSheet)
        ));
    }
}
