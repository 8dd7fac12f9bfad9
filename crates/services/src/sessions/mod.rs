mod plan;
mod progress;
mod service;
mod summary;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use plan::{SelectionPolicy, select_question_ids};
pub use progress::{SessionPhase, SessionProgress};
pub use service::QuizSession;
pub use summary::{build_retry_session, summarize};
pub use workflow::{SelectionReport, SessionAnswerResult, SessionLoopService};
