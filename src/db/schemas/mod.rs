//! Database schemas for Agora
//!
//! Defines MongoDB document structures for users, questions, answers and
//! notifications.

mod answer;
mod metadata;
mod notification;
mod question;
mod user;

pub use answer::{AnswerDoc, ANSWER_COLLECTION};
pub use metadata::Metadata;
pub use notification::{NotificationDoc, NotificationKind, NOTIFICATION_COLLECTION};
pub use question::{QuestionDoc, QUESTION_COLLECTION};
pub use user::{UserDoc, STARTING_REPUTATION, USER_COLLECTION};
