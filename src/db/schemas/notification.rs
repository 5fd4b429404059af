//! Notification document schema
//!
//! One document per recipient per event; written inline by the handlers
//! that cause the event.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for notifications
pub const NOTIFICATION_COLLECTION: &str = "notifications";

/// What happened
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Someone answered the recipient's question
    #[default]
    NewAnswer,
    /// The recipient's answer was accepted
    AnswerAccepted,
    /// A moderator removed the recipient's content
    ContentRemoved,
}

/// Notification document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NotificationDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub recipient_id: ObjectId,

    /// User whose action triggered the notification
    pub actor_id: ObjectId,

    pub kind: NotificationKind,

    pub question_id: ObjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_id: Option<ObjectId>,

    pub message: String,

    #[serde(default)]
    pub is_read: bool,
}

impl NotificationDoc {
    pub fn new(
        recipient_id: ObjectId,
        actor_id: ObjectId,
        kind: NotificationKind,
        question_id: ObjectId,
        answer_id: Option<ObjectId>,
        message: String,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            recipient_id,
            actor_id,
            kind,
            question_id,
            answer_id,
            message,
            is_read: false,
        }
    }
}

impl IntoIndexes for NotificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "recipient_id": 1, "is_read": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("recipient_unread_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for NotificationDoc {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
