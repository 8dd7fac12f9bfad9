use quiz_core::model::{AttemptRecord, CategoryAccuracy};

use super::{
    SqliteRepository,
    mapping::{map_category_accuracy_row, question_id_to_i64},
};
use crate::repository::{AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError> {
        let chosen = i64::try_from(attempt.chosen_choice)
            .map_err(|_| StorageError::Serialization("chosen_choice overflow".into()))?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    sheet, question_id, category, is_correct,
                    chosen_choice, chosen_text, time_taken_seconds, answered_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(attempt.sheet.as_str())
        .bind(question_id_to_i64(attempt.question_id)?)
        .bind(attempt.category.as_str())
        .bind(attempt.is_correct)
        .bind(chosen)
        .bind(attempt.chosen_text.as_str())
        .bind(attempt.time_taken_seconds)
        .bind(attempt.answered_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn category_accuracy(&self, sheet: &str) -> Result<Vec<CategoryAccuracy>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    category,
                    COUNT(*) AS attempts,
                    COALESCE(SUM(is_correct), 0) AS correct
                FROM attempts
                WHERE sheet = ?1
                GROUP BY category
                ORDER BY category ASC
            ",
        )
        .bind(sheet)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_category_accuracy_row).collect()
    }

    async fn reset_attempts(&self, sheet: Option<&str>) -> Result<u64, StorageError> {
        let res = match sheet {
            Some(sheet) => {
                sqlx::query("DELETE FROM attempts WHERE sheet = ?1")
                    .bind(sheet)
                    .execute(&self.pool)
                    .await
            }
            None => sqlx::query("DELETE FROM attempts").execute(&self.pool).await,
        }
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.rows_affected())
    }
}
