//! Storage seam for the forum
//!
//! Services talk to a [`ForumStore`]; the MongoDB implementation is used in
//! production and the in-memory one in development and tests. Both honour
//! the same contract for vote updates: the write is conditional on the
//! voter's current membership and touches only that voter's id.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::oid::ObjectId;
use serde::Deserialize;

use crate::db::schemas::{AnswerDoc, NotificationDoc, QuestionDoc, UserDoc};
use crate::types::Result;
use crate::voting::{ContentKind, Votable, VoteState};

pub use memory::MemoryForumStore;
pub use mongo::MongoForumStore;

/// Hard cap on page sizes
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page size
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One page of results plus the total match count
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// 1-based pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.limit as u64
    }

    pub fn total_pages(&self, total: u64) -> u32 {
        total.div_ceil(self.limit as u64) as u32
    }
}

/// Question listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSort {
    #[default]
    Newest,
    Score,
}

/// Filters for listing questions
#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub pagination: Pagination,
    pub tag: Option<String>,
    /// Case-insensitive substring match on title
    pub search: Option<String>,
    pub sort: QuestionSort,
}

/// Filters for listing users
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub pagination: Pagination,
    /// Case-insensitive substring match on username or email
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

/// Fields an author may edit on a question
#[derive(Debug, Clone, Default)]
pub struct QuestionEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Counters for the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForumStats {
    pub users: u64,
    pub banned_users: u64,
    pub questions: u64,
    pub answers: u64,
}

/// The vote-relevant projection of a question or answer
#[derive(Debug, Clone, PartialEq)]
pub struct VoteTarget {
    pub kind: ContentKind,
    pub id: ObjectId,
    pub author_id: ObjectId,
    pub upvotes: Vec<ObjectId>,
    pub downvotes: Vec<ObjectId>,
}

impl VoteTarget {
    pub fn from_content<T: Votable>(kind: ContentKind, id: ObjectId, content: &T) -> Self {
        Self {
            kind,
            id,
            author_id: content.author_id(),
            upvotes: content.upvotes().to_vec(),
            downvotes: content.downvotes().to_vec(),
        }
    }
}

impl Votable for VoteTarget {
    fn author_id(&self) -> ObjectId {
        self.author_id
    }

    fn upvotes(&self) -> &[ObjectId] {
        &self.upvotes
    }

    fn downvotes(&self) -> &[ObjectId] {
        &self.downvotes
    }

    fn vote_sets_mut(&mut self) -> (&mut Vec<ObjectId>, &mut Vec<ObjectId>) {
        (&mut self.upvotes, &mut self.downvotes)
    }
}

/// Document-store operations the forum needs
#[async_trait]
pub trait ForumStore: Send + Sync {
    /// Short backend name for health output
    fn backend(&self) -> &'static str;

    // ----- users -----

    /// Insert a user; duplicate username/email yields `ForumError::Conflict`
    async fn insert_user(&self, user: UserDoc) -> Result<ObjectId>;
    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>>;
    /// Look up by username or (case-insensitive) email
    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<UserDoc>>;
    async fn list_users(&self, query: &UserQuery) -> Result<Page<UserDoc>>;
    /// Ban/unban; bumps `token_version` on ban. Returns affected count.
    async fn set_users_active(&self, ids: &[ObjectId], active: bool) -> Result<u64>;
    /// Atomic `$inc` on reputation
    async fn adjust_reputation(&self, user_id: &ObjectId, delta: i64) -> Result<()>;

    // ----- questions -----

    async fn insert_question(&self, question: QuestionDoc) -> Result<ObjectId>;
    async fn find_question(&self, id: &ObjectId) -> Result<Option<QuestionDoc>>;
    async fn list_questions(&self, query: &QuestionQuery) -> Result<Page<QuestionDoc>>;
    async fn update_question(&self, id: &ObjectId, edit: QuestionEdit)
        -> Result<Option<QuestionDoc>>;
    async fn set_accepted_answer(&self, question_id: &ObjectId, answer_id: Option<ObjectId>)
        -> Result<()>;
    /// Soft delete; returns the documents that were live before the call
    async fn delete_questions(&self, ids: &[ObjectId]) -> Result<Vec<QuestionDoc>>;

    // ----- answers -----

    async fn insert_answer(&self, answer: AnswerDoc) -> Result<ObjectId>;
    async fn find_answer(&self, id: &ObjectId) -> Result<Option<AnswerDoc>>;
    async fn answers_for_question(&self, question_id: &ObjectId) -> Result<Vec<AnswerDoc>>;
    async fn count_answers(&self, question_id: &ObjectId) -> Result<u64>;
    async fn update_answer_body(&self, id: &ObjectId, body: String) -> Result<Option<AnswerDoc>>;
    async fn set_answer_accepted(&self, id: &ObjectId, accepted: bool) -> Result<()>;
    /// Soft delete; returns the documents that were live before the call
    async fn delete_answers(&self, ids: &[ObjectId]) -> Result<Vec<AnswerDoc>>;

    // ----- votes -----

    async fn load_vote_target(&self, kind: ContentKind, id: &ObjectId)
        -> Result<Option<VoteTarget>>;

    /// Move `voter` from `from` to `to` in one document update.
    ///
    /// Returns `None` when the item is gone or the voter's membership no
    /// longer equals `from`; nothing is written in that case.
    async fn apply_vote(
        &self,
        kind: ContentKind,
        id: &ObjectId,
        voter: &ObjectId,
        from: VoteState,
        to: VoteState,
    ) -> Result<Option<VoteTarget>>;

    // ----- notifications -----

    async fn insert_notification(&self, notification: NotificationDoc) -> Result<ObjectId>;
    /// Newest first
    async fn list_notifications(
        &self,
        recipient: &ObjectId,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<NotificationDoc>>;
    async fn count_unread(&self, recipient: &ObjectId) -> Result<u64>;
    /// False when the notification does not exist or belongs to someone else
    async fn mark_notification_read(&self, recipient: &ObjectId, id: &ObjectId) -> Result<bool>;
    async fn mark_all_read(&self, recipient: &ObjectId) -> Result<u64>;

    // ----- admin -----

    async fn stats(&self) -> Result<ForumStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(0, 500);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, MAX_PAGE_SIZE);
        assert_eq!(p.skip(), 0);

        let p = Pagination::new(3, 10);
        assert_eq!(p.skip(), 20);
        assert_eq!(p.total_pages(21), 3);
        assert_eq!(p.total_pages(0), 0);
    }
}
