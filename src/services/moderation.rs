//! Admin moderation: member bans, bulk content removal and counters

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::answers::remove_answers;
use super::questions::remove_questions;
use super::Actor;
use crate::auth::ForumAction;
use crate::db::schemas::UserDoc;
use crate::store::{ForumStats, ForumStore, Page, UserQuery};
use crate::types::{ForumError, Result};

/// Most ids accepted by one bulk request
pub const MAX_BULK_IDS: usize = 100;

/// Bulk moderation actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    DeleteQuestions,
    DeleteAnswers,
    BanUsers,
    UnbanUsers,
}

impl BulkAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkAction::DeleteQuestions => "delete_questions",
            BulkAction::DeleteAnswers => "delete_answers",
            BulkAction::BanUsers => "ban_users",
            BulkAction::UnbanUsers => "unban_users",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a bulk request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutcome {
    pub action: BulkAction,
    /// Distinct ids in the request
    pub requested: usize,
    /// Documents that actually changed
    pub affected: u64,
}

/// Parse and dedupe bulk ids; any malformed id rejects the whole request
fn parse_bulk_ids(raw: &[String]) -> Result<Vec<ObjectId>> {
    if raw.is_empty() {
        return Err(ForumError::BadRequest("No ids provided".into()));
    }
    if raw.len() > MAX_BULK_IDS {
        return Err(ForumError::BadRequest(format!(
            "At most {} ids per request",
            MAX_BULK_IDS
        )));
    }

    let mut ids = Vec::with_capacity(raw.len());
    let mut invalid = Vec::new();
    for value in raw {
        match ObjectId::parse_str(value.trim()) {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(_) => invalid.push(value.as_str()),
        }
    }

    if !invalid.is_empty() {
        return Err(ForumError::BadRequest(format!(
            "Invalid ids: {}",
            invalid.join(", ")
        )));
    }
    Ok(ids)
}

#[derive(Clone)]
pub struct ModerationService {
    store: Arc<dyn ForumStore>,
}

impl ModerationService {
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        Self { store }
    }

    pub async fn list_users(&self, actor: &Actor, query: &UserQuery) -> Result<Page<UserDoc>> {
        actor.ensure(ForumAction::ModerateUsers)?;
        self.store.list_users(query).await
    }

    /// Ban or unban one member. Banning revokes their outstanding tokens.
    pub async fn set_user_status(
        &self,
        actor: &Actor,
        user_id: &ObjectId,
        active: bool,
    ) -> Result<UserDoc> {
        actor.ensure(ForumAction::ModerateUsers)?;
        if !active && *user_id == actor.id {
            return Err(ForumError::BadRequest("Admins cannot ban themselves".into()));
        }

        if self.store.set_users_active(&[*user_id], active).await? == 0 {
            return Err(ForumError::NotFound("user not found".into()));
        }

        let action = if active { "unbanned" } else { "banned" };
        info!("User {} {} by admin {}", user_id, action, actor.username);

        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("user not found".into()))
    }

    pub async fn bulk(
        &self,
        actor: &Actor,
        action: BulkAction,
        raw_ids: &[String],
    ) -> Result<BulkOutcome> {
        actor.ensure(ForumAction::BulkModerate)?;
        let ids = parse_bulk_ids(raw_ids)?;
        let store = self.store.as_ref();

        let affected = match action {
            BulkAction::DeleteQuestions => remove_questions(store, actor, &ids).await?.len() as u64,
            BulkAction::DeleteAnswers => remove_answers(store, actor, &ids).await?.len() as u64,
            BulkAction::BanUsers => {
                if ids.contains(&actor.id) {
                    return Err(ForumError::BadRequest("Admins cannot ban themselves".into()));
                }
                store.set_users_active(&ids, false).await?
            }
            BulkAction::UnbanUsers => store.set_users_active(&ids, true).await?,
        };

        if affected < ids.len() as u64 {
            warn!(
                %action,
                requested = ids.len(),
                affected,
                "Bulk moderation skipped missing or already removed documents"
            );
        }
        info!(%action, affected, by = %actor.username, "Bulk moderation applied");

        Ok(BulkOutcome {
            action,
            requested: ids.len(),
            affected,
        })
    }

    pub async fn stats(&self, actor: &Actor) -> Result<ForumStats> {
        actor.ensure(ForumAction::ModerateUsers)?;
        self.store.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PermissionLevel;
    use crate::db::schemas::{AnswerDoc, NotificationKind, QuestionDoc};
    use crate::store::MemoryForumStore;

    async fn seed_user(store: &MemoryForumStore, name: &str, level: PermissionLevel) -> Actor {
        let mut doc = UserDoc::new(name.into(), format!("{name}@example.com"), "hash".into());
        doc.permission_level = level;
        let id = store.insert_user(doc).await.unwrap();
        Actor {
            id,
            username: name.into(),
            permission_level: level,
        }
    }

    #[test]
    fn test_parse_bulk_ids() {
        let a = ObjectId::new();
        let ids = parse_bulk_ids(&[a.to_hex(), a.to_hex()]).unwrap();
        assert_eq!(ids, vec![a]);

        let err = parse_bulk_ids(&[a.to_hex(), "nope".into()]).unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert!(parse_bulk_ids(&[]).is_err());
    }

    #[test]
    fn test_bulk_action_wire_names() {
        let action: BulkAction = serde_json::from_str("\"unban_users\"").unwrap();
        assert_eq!(action, BulkAction::UnbanUsers);
        assert_eq!(BulkAction::DeleteAnswers.to_string(), "delete_answers");
    }

    #[tokio::test]
    async fn test_members_cannot_moderate() {
        let store = Arc::new(MemoryForumStore::new());
        let member = seed_user(&store, "member", PermissionLevel::Authenticated).await;
        let service = ModerationService::new(store);

        assert!(matches!(
            service.stats(&member).await,
            Err(ForumError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_cannot_ban_self() {
        let store = Arc::new(MemoryForumStore::new());
        let admin = seed_user(&store, "root", PermissionLevel::Admin).await;
        let service = ModerationService::new(store);

        assert!(matches!(
            service.set_user_status(&admin, &admin.id, false).await,
            Err(ForumError::BadRequest(_))
        ));
        assert!(matches!(
            service
                .bulk(&admin, BulkAction::BanUsers, &[admin.id.to_hex()])
                .await,
            Err(ForumError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_delete_counts_and_notifies() {
        let store = Arc::new(MemoryForumStore::new());
        let admin = seed_user(&store, "root", PermissionLevel::Admin).await;
        let author = seed_user(&store, "author", PermissionLevel::Authenticated).await;
        let service = ModerationService::new(store.clone());

        let q1 = store
            .insert_question(QuestionDoc::new(author.id, "Spam one".into(), "b".into(), vec![]))
            .await
            .unwrap();
        let q2 = store
            .insert_question(QuestionDoc::new(author.id, "Spam two".into(), "b".into(), vec![]))
            .await
            .unwrap();
        let answer = store
            .insert_answer(AnswerDoc::new(q1, author.id, "reply".into()))
            .await
            .unwrap();

        let outcome = service
            .bulk(
                &admin,
                BulkAction::DeleteQuestions,
                &[q1.to_hex(), q2.to_hex(), ObjectId::new().to_hex()],
            )
            .await
            .unwrap();
        assert_eq!(outcome.requested, 3);
        assert_eq!(outcome.affected, 2);
        assert!(store.find_answer(&answer).await.unwrap().is_none());

        let inbox = store.list_notifications(&author.id, false, 10).await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert!(inbox
            .iter()
            .all(|n| n.kind == NotificationKind::ContentRemoved));

        let stats = service.stats(&admin).await.unwrap();
        assert_eq!(stats.questions, 0);
        assert_eq!(stats.answers, 0);
    }

    #[tokio::test]
    async fn test_ban_and_unban() {
        let store = Arc::new(MemoryForumStore::new());
        let admin = seed_user(&store, "root", PermissionLevel::Admin).await;
        let troll = seed_user(&store, "troll", PermissionLevel::Authenticated).await;
        let service = ModerationService::new(store.clone());

        let banned = service.set_user_status(&admin, &troll.id, false).await.unwrap();
        assert!(!banned.is_active);
        assert_eq!(service.stats(&admin).await.unwrap().banned_users, 1);

        let outcome = service
            .bulk(&admin, BulkAction::UnbanUsers, &[troll.id.to_hex()])
            .await
            .unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(store.find_user(&troll.id).await.unwrap().unwrap().is_active);

        let query = UserQuery {
            search: Some("TROLL".into()),
            ..Default::default()
        };
        assert_eq!(service.list_users(&admin, &query).await.unwrap().total, 1);
    }
}
