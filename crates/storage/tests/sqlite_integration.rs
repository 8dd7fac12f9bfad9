use quiz_core::model::{AttemptRecord, CategoryFilter, Question, QuestionId};
use quiz_core::time::fixed_now;
use storage::repository::{AttemptRepository, QuestionRecord, QuestionRepository};
use storage::sqlite::SqliteRepository;

fn record(sheet: &str, id: u64, category: &str, answer: &str) -> QuestionRecord {
    QuestionRecord {
        sheet: sheet.to_owned(),
        id,
        category: category.to_owned(),
        prompt: format!("Question {id}"),
        choices: vec!["alpha".into(), "beta".into(), String::new(), "delta".into()],
        answer: answer.to_owned(),
        explanation: format!("because {id}"),
    }
}

async fn connect(name: &str) -> SqliteRepository {
    SqliteRepository::open(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("open")
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrations").await;
    assert_eq!(repo.schema_version().await.unwrap(), 1);

    repo.migrate().await.unwrap();
    assert_eq!(repo.schema_version().await.unwrap(), 1);
    assert!(repo.sheet_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_normalizes_rows_and_preserves_fetch_order() {
    let repo = connect("memdb_questions").await;

    repo.upsert_record(&record("general", 3, "math", "1")).await.unwrap();
    repo.upsert_record(&record("general", 1, "math", "delta")).await.unwrap();
    repo.upsert_record(&record("general", 2, "art", "2")).await.unwrap();
    repo.upsert_record(&record("general", 4, "math", "nope")).await.unwrap();
    repo.upsert_record(&record("history", 1, "wars", "1")).await.unwrap();

    assert_eq!(repo.sheet_names().await.unwrap(), vec!["general", "history"]);
    assert_eq!(repo.categories("general").await.unwrap(), vec!["art", "math"]);

    let filter = CategoryFilter::Only(["math".to_owned()].into_iter().collect());
    let matching = repo.matching_ids("general", &filter).await.unwrap();
    assert_eq!(matching.ids, vec![QuestionId::new(1), QuestionId::new(3)]);
    assert_eq!(matching.skipped.len(), 1);
    assert_eq!(matching.skipped[0].id, 4);

    let all = repo.matching_ids("general", &CategoryFilter::All).await.unwrap();
    assert_eq!(all.ids.len(), 3);

    let ids = [QuestionId::new(3), QuestionId::new(1)];
    let questions = repo.get_questions("general", &ids).await.unwrap();
    let got: Vec<_> = questions.iter().map(Question::id).collect();
    assert_eq!(got, ids);
    // blank third choice is dropped, so "delta" moves to index 2
    assert_eq!(questions[1].choices().len(), 3);
    assert_eq!(questions[1].correct_choice(), 2);
    assert_eq!(questions[0].explanation(), "because 3");
}

#[tokio::test]
async fn sqlite_upsert_replaces_existing_row() {
    let repo = connect("memdb_upsert").await;

    repo.upsert_record(&record("general", 1, "math", "1")).await.unwrap();
    let mut updated = record("general", 1, "science", "2");
    updated.prompt = "Updated".into();
    repo.upsert_record(&updated).await.unwrap();

    let questions = repo
        .get_questions("general", &[QuestionId::new(1)])
        .await
        .unwrap();
    assert_eq!(questions[0].prompt(), "Updated");
    assert_eq!(questions[0].category(), "science");
    assert_eq!(questions[0].correct_choice(), 1);

    let missing = repo.get_questions("general", &[QuestionId::new(2)]).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn sqlite_attempts_aggregate_by_category() {
    let repo = connect("memdb_attempts").await;

    for (category, correct) in [("math", true), ("math", false), ("math", true), ("art", false)] {
        let attempt = AttemptRecord {
            sheet: "general".into(),
            question_id: QuestionId::new(1),
            category: category.into(),
            is_correct: correct,
            chosen_choice: 1,
            chosen_text: "beta".into(),
            time_taken_seconds: Some(2.5),
            answered_at: fixed_now(),
        };
        repo.append_attempt(&attempt).await.unwrap();
    }

    let accuracy = repo.category_accuracy("general").await.unwrap();
    assert_eq!(accuracy.len(), 2);
    assert_eq!(accuracy[0].category, "art");
    assert_eq!(accuracy[0].correct, 0);
    assert_eq!(accuracy[1].category, "math");
    assert_eq!(accuracy[1].attempts, 3);
    assert_eq!(accuracy[1].correct, 2);

    assert_eq!(repo.reset_attempts(Some("general")).await.unwrap(), 4);
    assert!(repo.category_accuracy("general").await.unwrap().is_empty());
}
