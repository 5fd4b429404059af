//! User document schema
//!
//! Stores credentials, permission level and reputation.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::PermissionLevel;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Reputation a freshly registered member starts with
pub const STARTING_REPUTATION: i64 = 1;

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Public handle, unique
    pub username: String,

    /// Contact email, unique (stored lowercase)
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default)]
    pub permission_level: PermissionLevel,

    /// Cumulative reputation from votes and accepted answers
    #[serde(default)]
    pub reputation: i64,

    /// False when the account is banned
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Token version for invalidation (increment to invalidate all tokens)
    #[serde(default)]
    pub token_version: i32,
}

fn default_true() -> bool {
    true
}

impl UserDoc {
    /// Create a new member document
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            username,
            email: email.to_lowercase(),
            password_hash,
            permission_level: PermissionLevel::Authenticated,
            reputation: STARTING_REPUTATION,
            is_active: true,
            token_version: 1,
        }
    }

    /// Whether the identifier (username or email) names this user
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.username == identifier || self.email == identifier.to_lowercase()
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "reputation": -1 },
                Some(
                    IndexOptions::builder()
                        .name("reputation_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
