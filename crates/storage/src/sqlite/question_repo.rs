use std::collections::HashMap;

use quiz_core::model::{CategoryFilter, MAX_CHOICES, Question, QuestionId};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{id_to_i64, map_question_row, question_id_to_i64},
};
use crate::repository::{
    MatchingQuestions, QuestionRecord, QuestionRepository, StorageError, usable_categories,
};

const QUESTION_COLUMNS: &str = r"
    SELECT
        sheet, id, category, prompt, choice1, choice2, choice3, choice4, answer, explanation
    FROM questions
";

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SqliteRepository {
    async fn sheet_records(&self, sheet: &str) -> Result<Vec<QuestionRecord>, StorageError> {
        let sql = format!("{QUESTION_COLUMNS} WHERE sheet = ?1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(sheet)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_question_row).collect()
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn sheet_names(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT DISTINCT sheet FROM questions ORDER BY sheet ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("sheet")
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn categories(&self, sheet: &str) -> Result<Vec<String>, StorageError> {
        Ok(usable_categories(self.sheet_records(sheet).await?))
    }

    async fn matching_ids(
        &self,
        sheet: &str,
        filter: &CategoryFilter,
    ) -> Result<MatchingQuestions, StorageError> {
        let records = match filter {
            CategoryFilter::All => self.sheet_records(sheet).await?,
            CategoryFilter::Only(categories) if categories.is_empty() => Vec::new(),
            CategoryFilter::Only(categories) => {
                let sql = format!(
                    "{QUESTION_COLUMNS} WHERE sheet = ?1 AND category IN ({}) ORDER BY id ASC",
                    placeholders(2, categories.len())
                );
                let mut q = sqlx::query(&sql).bind(sheet);
                for category in categories {
                    q = q.bind(category.as_str());
                }
                let rows = q
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| StorageError::Connection(e.to_string()))?;
                rows.iter()
                    .map(map_question_row)
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(MatchingQuestions::from_records(records, filter))
    }

    async fn get_questions(
        &self,
        sheet: &str,
        ids: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{QUESTION_COLUMNS} WHERE sheet = ?1 AND id IN ({})",
            placeholders(2, ids.len())
        );
        let mut q = sqlx::query(&sql).bind(sheet);
        for id in ids {
            q = q.bind(question_id_to_i64(*id)?);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut by_id: HashMap<u64, QuestionRecord> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let record = map_question_row(row)?;
            by_id.insert(record.id, record);
        }

        // Duplicate IDs in the request are served from the same row.
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let record = by_id.get(&id.value()).cloned().ok_or(StorageError::NotFound)?;
            let question = record
                .into_question()
                .map_err(|e| StorageError::Serialization(format!("question {id}: {e}")))?;
            out.push(question);
        }
        Ok(out)
    }

    async fn upsert_record(&self, record: &QuestionRecord) -> Result<(), StorageError> {
        if record.choices.len() > MAX_CHOICES {
            return Err(StorageError::Serialization(format!(
                "question {} has {} choices, at most {MAX_CHOICES} can be stored",
                record.id,
                record.choices.len()
            )));
        }

        sqlx::query(
            r"
            INSERT INTO questions (
                sheet, id, category, prompt, choice1, choice2, choice3, choice4, answer, explanation
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(sheet, id) DO UPDATE SET
                category = excluded.category,
                prompt = excluded.prompt,
                choice1 = excluded.choice1,
                choice2 = excluded.choice2,
                choice3 = excluded.choice3,
                choice4 = excluded.choice4,
                answer = excluded.answer,
                explanation = excluded.explanation
            ",
        )
        .bind(record.sheet.as_str())
        .bind(id_to_i64("id", record.id)?)
        .bind(record.category.as_str())
        .bind(record.prompt.as_str())
        .bind(record.choices.first().cloned())
        .bind(record.choices.get(1).cloned())
        .bind(record.choices.get(2).cloned())
        .bind(record.choices.get(3).cloned())
        .bind(record.answer.as_str())
        .bind(record.explanation.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
