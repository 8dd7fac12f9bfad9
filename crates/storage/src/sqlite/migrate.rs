use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::SqliteInitError;

struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

// Rows are stored as imported; answer normalization happens on read.
const CREATE_QUESTIONS: &str = r"
    CREATE TABLE IF NOT EXISTS questions (
        sheet TEXT NOT NULL,
        id INTEGER NOT NULL CHECK (id >= 0),
        category TEXT NOT NULL,
        prompt TEXT NOT NULL,
        choice1 TEXT,
        choice2 TEXT,
        choice3 TEXT,
        choice4 TEXT,
        answer TEXT NOT NULL,
        explanation TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (sheet, id)
    );
";

const CREATE_ATTEMPTS: &str = r"
    CREATE TABLE IF NOT EXISTS attempts (
        id INTEGER PRIMARY KEY,
        sheet TEXT NOT NULL,
        question_id INTEGER NOT NULL,
        category TEXT NOT NULL,
        is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
        chosen_choice INTEGER NOT NULL CHECK (chosen_choice >= 0),
        chosen_text TEXT NOT NULL,
        time_taken_seconds REAL,
        answered_at TEXT NOT NULL
    );
";

const INDEX_QUESTIONS: &str = r"
    CREATE INDEX IF NOT EXISTS idx_questions_sheet_category
        ON questions (sheet, category, id);
";

const INDEX_ATTEMPTS: &str = r"
    CREATE INDEX IF NOT EXISTS idx_attempts_sheet_category
        ON attempts (sheet, category);
";

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    statements: &[CREATE_QUESTIONS, CREATE_ATTEMPTS, INDEX_QUESTIONS, INDEX_ATTEMPTS],
}];

async fn ensure_migrations_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        ",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn current_version(pool: &SqlitePool) -> Result<i64, SqliteInitError> {
    ensure_migrations_table(pool).await?;
    let row = sqlx::query("SELECT COALESCE(MAX(version), 0) AS version FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("version")?)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in migration.statements {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    sqlx::query(
        r"
        INSERT INTO schema_migrations (version, applied_at)
        VALUES (?1, ?2)
        ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(migration.version)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    tx.commit().await
}

/// Apply every migration newer than the recorded schema version, each in its own transaction.
pub(super) async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    let applied = current_version(pool).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(pool, migration)
            .await
            .map_err(|source| SqliteInitError::Migration {
                version: migration.version,
                source,
            })?;
    }
    Ok(())
}
