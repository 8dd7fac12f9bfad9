use quiz_core::model::{CategoryAccuracy, QuestionId};
use sqlx::Row;

use crate::repository::{QuestionRecord, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    id_to_i64("question_id", id.value())
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionRecord, StorageError> {
    let mut choices = Vec::with_capacity(4);
    for column in ["choice1", "choice2", "choice3", "choice4"] {
        if let Some(choice) = row.try_get::<Option<String>, _>(column).map_err(ser)? {
            choices.push(choice);
        }
    }

    Ok(QuestionRecord {
        sheet: row.try_get("sheet").map_err(ser)?,
        id: i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?,
        category: row.try_get("category").map_err(ser)?,
        prompt: row.try_get("prompt").map_err(ser)?,
        choices,
        answer: row.try_get("answer").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
    })
}

pub(crate) fn map_category_accuracy_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CategoryAccuracy, StorageError> {
    Ok(CategoryAccuracy {
        category: row.try_get("category").map_err(ser)?,
        attempts: i64_to_u32("attempts", row.try_get::<i64, _>("attempts").map_err(ser)?)?,
        correct: i64_to_u32("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
    })
}
