//! Member inbox
//!
//! Notifications are written inline by the operation that causes them.
//! Delivery is best effort: a failed insert is logged and the causing
//! operation still succeeds.

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{debug, warn};

use super::Actor;
use crate::db::schemas::NotificationDoc;
use crate::store::ForumStore;
use crate::types::{ForumError, Result};

/// Most notifications returned by one listing
pub const MAX_INBOX_SIZE: u32 = 50;

/// Record a notification without failing the caller
pub async fn notify(store: &dyn ForumStore, notification: NotificationDoc) {
    let recipient = notification.recipient_id;
    let kind = notification.kind;
    match store.insert_notification(notification).await {
        Ok(id) => debug!(%recipient, ?kind, notification = %id, "Notification stored"),
        Err(e) => warn!(%recipient, ?kind, "Failed to store notification: {}", e),
    }
}

/// A page of the caller's inbox
#[derive(Debug, Clone)]
pub struct Inbox {
    pub items: Vec<NotificationDoc>,
    pub unread_count: u64,
}

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn ForumStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        Self { store }
    }

    /// Newest first, capped at [`MAX_INBOX_SIZE`]
    pub async fn inbox(&self, actor: &Actor, unread_only: bool) -> Result<Inbox> {
        let items = self
            .store
            .list_notifications(&actor.id, unread_only, MAX_INBOX_SIZE)
            .await?;
        let unread_count = self.store.count_unread(&actor.id).await?;
        Ok(Inbox {
            items,
            unread_count,
        })
    }

    pub async fn mark_read(&self, actor: &Actor, id: &ObjectId) -> Result<()> {
        if self.store.mark_notification_read(&actor.id, id).await? {
            Ok(())
        } else {
            Err(ForumError::NotFound("notification not found".into()))
        }
    }

    /// Returns how many notifications changed state
    pub async fn mark_all_read(&self, actor: &Actor) -> Result<u64> {
        self.store.mark_all_read(&actor.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PermissionLevel;
    use crate::db::schemas::NotificationKind;
    use crate::store::MemoryForumStore;

    fn actor(id: ObjectId) -> Actor {
        Actor {
            id,
            username: "reader".into(),
            permission_level: PermissionLevel::Authenticated,
        }
    }

    async fn push(store: &MemoryForumStore, recipient: ObjectId, message: &str) -> ObjectId {
        store
            .insert_notification(NotificationDoc::new(
                recipient,
                ObjectId::new(),
                NotificationKind::NewAnswer,
                ObjectId::new(),
                None,
                message.into(),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_mark_read_is_scoped_to_recipient() {
        let store = Arc::new(MemoryForumStore::new());
        let me = ObjectId::new();
        let someone_else = ObjectId::new();
        let theirs = push(&store, someone_else, "not yours").await;
        let mine = push(&store, me, "yours").await;

        let service = NotificationService::new(store.clone());
        let err = service.mark_read(&actor(me), &theirs).await.unwrap_err();
        assert!(matches!(err, ForumError::NotFound(_)));

        service.mark_read(&actor(me), &mine).await.unwrap();
        let inbox = service.inbox(&actor(me), false).await.unwrap();
        assert_eq!(inbox.unread_count, 0);
        assert!(inbox.items[0].is_read);
    }

    #[tokio::test]
    async fn test_unread_filter_and_read_all() {
        let store = Arc::new(MemoryForumStore::new());
        let me = ObjectId::new();
        let first = push(&store, me, "first").await;
        push(&store, me, "second").await;
        push(&store, me, "third").await;

        let service = NotificationService::new(store.clone());
        service.mark_read(&actor(me), &first).await.unwrap();

        let unread = service.inbox(&actor(me), true).await.unwrap();
        assert_eq!(unread.items.len(), 2);
        assert_eq!(unread.unread_count, 2);

        assert_eq!(service.mark_all_read(&actor(me)).await.unwrap(), 2);
        assert_eq!(service.mark_all_read(&actor(me)).await.unwrap(), 0);
    }
}
