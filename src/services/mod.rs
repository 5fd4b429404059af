//! Business logic for the forum
//!
//! Each service owns one resource and talks only to the [`ForumStore`]
//! seam, so the same rules run against MongoDB and the in-memory store.
//!
//! ## Services
//!
//! - **Accounts**: registration, login, token-to-member resolution
//! - **Questions**: asking, listing, editing, deleting, voting
//! - **Answers**: answering, editing, deleting, voting, acceptance
//! - **Notifications**: inbox listing and read markers
//! - **Moderation**: user bans, bulk content removal, dashboard counters

pub mod accounts;
pub mod answers;
pub mod moderation;
pub mod notifications;
pub mod questions;

use bson::oid::ObjectId;

use crate::auth::{is_action_allowed, ForumAction, PermissionLevel};
use crate::store::ForumStore;
use crate::types::{ForumError, Result};

pub use accounts::{AccountService, AuthSession, Registration};
pub use answers::{AcceptOutcome, AnswerService};
pub use moderation::{BulkAction, BulkOutcome, ModerationService, MAX_BULK_IDS};
pub use notifications::{notify, Inbox, NotificationService};
pub use questions::{NewQuestion, QuestionListing, QuestionService, QuestionThread};

/// The authenticated member behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ObjectId,
    pub username: String,
    pub permission_level: PermissionLevel,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.permission_level >= PermissionLevel::Admin
    }

    /// Fail with `Forbidden` unless this member may perform `action`
    pub fn ensure(&self, action: ForumAction) -> Result<()> {
        if is_action_allowed(action, self.permission_level) {
            Ok(())
        } else {
            Err(ForumError::Forbidden(format!(
                "{} permission required",
                crate::auth::required_permission(action)
            )))
        }
    }
}

/// Parse a hex ObjectId from a path segment or request body
pub fn parse_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| ForumError::BadRequest(format!("Invalid {} ID", what)))
}

/// Load a live question or fail with `NotFound`
pub(crate) async fn require_question(
    store: &dyn ForumStore,
    id: &ObjectId,
) -> Result<crate::db::schemas::QuestionDoc> {
    store
        .find_question(id)
        .await?
        .ok_or_else(|| ForumError::NotFound("question not found".into()))
}

/// Load a live answer or fail with `NotFound`
pub(crate) async fn require_answer(
    store: &dyn ForumStore,
    id: &ObjectId,
) -> Result<crate::db::schemas::AnswerDoc> {
    store
        .find_answer(id)
        .await?
        .ok_or_else(|| ForumError::NotFound("answer not found".into()))
}

/// Trim `text` and check its length in characters
pub(crate) fn bounded_text(text: &str, field: &str, min: usize, max: usize) -> Result<String> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(ForumError::BadRequest(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_text_trims_and_counts_chars() {
        assert_eq!(bounded_text("  héllo ", "title", 5, 10).unwrap(), "héllo");
        assert!(bounded_text("hey", "title", 5, 10).is_err());
        assert!(bounded_text("   ", "body", 1, 10).is_err());
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id("not-an-id", "question").unwrap_err();
        assert!(matches!(err, ForumError::BadRequest(_)));
        assert!(parse_id(&ObjectId::new().to_hex(), "question").is_ok());
    }

    #[test]
    fn test_actor_permissions() {
        let member = Actor {
            id: ObjectId::new(),
            username: "ada".into(),
            permission_level: PermissionLevel::Authenticated,
        };
        assert!(member.ensure(ForumAction::Vote).is_ok());
        assert!(matches!(
            member.ensure(ForumAction::BulkModerate),
            Err(ForumError::Forbidden(_))
        ));
        assert!(!member.is_admin());
    }
}
