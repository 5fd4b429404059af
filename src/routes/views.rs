//! JSON shapes returned by the API
//!
//! Documents are never serialized directly: ids become hex strings,
//! timestamps RFC 3339, and vote sets collapse into a score.

use bson::oid::ObjectId;
use serde::Serialize;

use crate::auth::PermissionLevel;
use crate::db::schemas::{AnswerDoc, NotificationDoc, NotificationKind, QuestionDoc, UserDoc};
use crate::store::{Page, Pagination};
use crate::voting::{Votable, VoteDirection};

fn hex(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

/// A member profile
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub reputation: i64,
    pub permission_level: PermissionLevel,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&UserDoc> for UserView {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: hex(user._id),
            username: user.username.clone(),
            email: user.email.clone(),
            reputation: user.reputation,
            permission_level: user.permission_level,
            is_active: user.is_active,
            created_at: user.metadata.created_at_rfc3339(),
        }
    }
}

/// Token plus profile, returned by register and login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthView {
    pub token: String,
    pub expires_in: u64,
    pub user: UserView,
}

/// A question row in a listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummaryView {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub vote_score: i64,
    pub answer_count: u64,
    pub has_accepted_answer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl QuestionSummaryView {
    pub fn new(question: &QuestionDoc, answer_count: u64) -> Self {
        Self {
            id: hex(question._id),
            author_id: question.author_id.to_hex(),
            title: question.title.clone(),
            tags: question.tags.clone(),
            vote_score: question.vote_score(),
            answer_count,
            has_accepted_answer: question.accepted_answer_id.is_some(),
            created_at: question.metadata.created_at_rfc3339(),
        }
    }
}

/// A full question as seen by `viewer`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub vote_score: i64,
    pub upvote_count: usize,
    pub downvote_count: usize,
    /// The viewer's own vote; `null` when anonymous or not voted
    pub user_vote: Option<VoteDirection>,
    pub accepted_answer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl QuestionView {
    pub fn new(question: &QuestionDoc, viewer: Option<&ObjectId>) -> Self {
        Self {
            id: hex(question._id),
            author_id: question.author_id.to_hex(),
            title: question.title.clone(),
            body: question.body.clone(),
            tags: question.tags.clone(),
            vote_score: question.vote_score(),
            upvote_count: question.upvotes.len(),
            downvote_count: question.downvotes.len(),
            user_vote: viewer.and_then(|v| question.vote_state_of(v).as_direction()),
            accepted_answer_id: question.accepted_answer_id.map(|id| id.to_hex()),
            created_at: question.metadata.created_at_rfc3339(),
            updated_at: question.metadata.updated_at_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: String,
    pub question_id: String,
    pub author_id: String,
    pub body: String,
    pub vote_score: i64,
    pub user_vote: Option<VoteDirection>,
    pub is_accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl AnswerView {
    pub fn new(answer: &AnswerDoc, viewer: Option<&ObjectId>) -> Self {
        Self {
            id: hex(answer._id),
            question_id: answer.question_id.to_hex(),
            author_id: answer.author_id.to_hex(),
            body: answer.body.clone(),
            vote_score: answer.vote_score(),
            user_vote: viewer.and_then(|v| answer.vote_state_of(v).as_direction()),
            is_accepted: answer.is_accepted,
            created_at: answer.metadata.created_at_rfc3339(),
            updated_at: answer.metadata.updated_at_rfc3339(),
        }
    }
}

/// `GET /questions/{id}` body
#[derive(Debug, Serialize)]
pub struct ThreadView {
    pub question: QuestionView,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub kind: NotificationKind,
    pub actor_id: String,
    pub question_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&NotificationDoc> for NotificationView {
    fn from(n: &NotificationDoc) -> Self {
        Self {
            id: hex(n._id),
            kind: n.kind,
            actor_id: n.actor_id.to_hex(),
            question_id: n.question_id.to_hex(),
            answer_id: n.answer_id.map(|id| id.to_hex()),
            message: n.message.clone(),
            is_read: n.is_read,
            created_at: n.metadata.created_at_rfc3339(),
        }
    }
}

/// Paginated list envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> PageView<T> {
    pub fn new<D>(page: Page<D>, pagination: Pagination, view: impl Fn(D) -> T) -> Self {
        Self {
            total_pages: pagination.total_pages(page.total),
            total: page.total,
            page: pagination.page,
            limit: pagination.limit,
            items: page.items.into_iter().map(view).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_view_reports_viewer_vote() {
        let voter = ObjectId::new();
        let mut question = QuestionDoc::new(ObjectId::new(), "Title".into(), "Body".into(), vec![]);
        question._id = Some(ObjectId::new());
        question.downvotes.push(voter);

        let seen = QuestionView::new(&question, Some(&voter));
        assert_eq!(seen.user_vote, Some(VoteDirection::Down));
        assert_eq!(seen.vote_score, -1);

        let anonymous = serde_json::to_value(QuestionView::new(&question, None)).unwrap();
        assert!(anonymous["userVote"].is_null());
        assert!(anonymous["acceptedAnswerId"].is_null());
    }

    #[test]
    fn test_page_view_counts_pages() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
        };
        let view = PageView::new(page, Pagination::new(1, 2), |n: i32| n * 10);
        assert_eq!(view.items, vec![10, 20]);
        assert_eq!(view.total_pages, 3);
    }
}
