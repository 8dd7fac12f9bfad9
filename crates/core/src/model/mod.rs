mod attempt;
mod ids;
mod question;
mod selection;
mod session;

pub use ids::{ParseIdError, QuestionId};

pub use attempt::{AttemptRecord, CategoryAccuracy};
pub use question::{MAX_CHOICES, MIN_CHOICES, Question, QuestionError};
pub use selection::{CategoryFilter, CategoryPolicy, QuestionOrder, SelectionCriteria, SelectionError};
pub use session::{AnswerOutcome, CategoryStats, ResultSummary};
