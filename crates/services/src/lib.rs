#![forbid(unsafe_code)]

pub mod error;
pub mod question_bank;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use error::{QuestionBankError, SessionError};
pub use question_bank::{ImportReport, QuestionBankService};

pub use sessions::{
    QuizSession, SelectionPolicy, SelectionReport, SessionAnswerResult, SessionLoopService,
    SessionPhase, SessionProgress, build_retry_session, select_question_ids, summarize,
};
