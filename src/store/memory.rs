//! In-memory forum store
//!
//! Backed by dashmap; per-entry locks give the same single-document
//! atomicity the MongoDB store gets from its update operators. User inserts
//! are serialised so username/email uniqueness holds like the unique indexes.

use async_trait::async_trait;
use bson::oid::ObjectId;
use dashmap::DashMap;
use std::cmp::Reverse;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    ForumStats, ForumStore, Page, Pagination, QuestionEdit, QuestionQuery, QuestionSort,
    UserQuery, VoteTarget,
};
use crate::db::mongo::MutMetadata;
use crate::db::schemas::{AnswerDoc, Metadata, NotificationDoc, QuestionDoc, UserDoc};
use crate::types::{ForumError, Result};
use crate::voting::{ContentKind, Votable, VoteState};

/// Forum store held entirely in process memory
#[derive(Default)]
pub struct MemoryForumStore {
    users: DashMap<ObjectId, UserDoc>,
    questions: DashMap<ObjectId, QuestionDoc>,
    answers: DashMap<ObjectId, AnswerDoc>,
    notifications: DashMap<ObjectId, NotificationDoc>,
    /// Held across the uniqueness check and the insert
    user_writes: Mutex<()>,
}

impl MemoryForumStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Documents keyed by their `_id`
trait Keyed {
    fn set_id(&mut self, id: ObjectId);
}

macro_rules! impl_keyed {
    ($($doc:ty),*) => {
        $(impl Keyed for $doc {
            fn set_id(&mut self, id: ObjectId) {
                self._id = Some(id);
            }
        })*
    };
}

impl_keyed!(UserDoc, QuestionDoc, AnswerDoc, NotificationDoc);

fn is_live<T: MutMetadata>(doc: &T) -> bool {
    !doc.metadata().is_deleted
}

fn insert_with_id<T: MutMetadata + Keyed>(map: &DashMap<ObjectId, T>, mut doc: T) -> ObjectId {
    let id = ObjectId::new();
    doc.set_id(id);
    *doc.mut_metadata() = Metadata::new();
    map.insert(id, doc);
    id
}

fn find_live<T: MutMetadata + Clone>(map: &DashMap<ObjectId, T>, id: &ObjectId) -> Option<T> {
    map.get(id)
        .map(|entry| entry.value().clone())
        .filter(|doc| is_live(doc))
}

fn soft_delete_many<T: MutMetadata + Clone>(
    map: &DashMap<ObjectId, T>,
    ids: &[ObjectId],
) -> Vec<T> {
    let mut deleted = Vec::new();
    for id in ids {
        if let Some(mut entry) = map.get_mut(id) {
            if !is_live(entry.value()) {
                continue;
            }
            deleted.push(entry.value().clone());
            entry.mut_metadata().mark_deleted();
        }
    }
    deleted
}

fn apply_vote_in<T>(
    map: &DashMap<ObjectId, T>,
    kind: ContentKind,
    id: &ObjectId,
    voter: &ObjectId,
    from: VoteState,
    to: VoteState,
) -> Option<VoteTarget>
where
    T: Votable + MutMetadata,
{
    let mut entry = map.get_mut(id)?;
    if !is_live(entry.value()) || entry.vote_state_of(voter) != from {
        return None;
    }

    entry.set_vote(voter, to);
    entry.mut_metadata().touch();
    Some(VoteTarget::from_content(kind, *id, entry.value()))
}

fn paginate<T>(mut items: Vec<T>, pagination: Pagination) -> Page<T> {
    let total = items.len() as u64;
    let skip = pagination.skip().min(total) as usize;
    let items: Vec<T> = items
        .drain(skip..)
        .take(pagination.limit as usize)
        .collect();
    Page { items, total }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl ForumStore for MemoryForumStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_user(&self, user: UserDoc) -> Result<ObjectId> {
        let _guard = self.user_writes.lock().await;
        let clash = self.users.iter().any(|entry| {
            let existing = entry.value();
            existing.username == user.username || existing.email == user.email
        });
        if clash {
            return Err(ForumError::Conflict("Document already exists".into()));
        }
        Ok(insert_with_id(&self.users, user))
    }

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        Ok(find_live(&self.users, id))
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .iter()
            .filter(|entry| is_live(entry.value()))
            .find(|entry| entry.value().matches_identifier(identifier))
            .map(|entry| entry.value().clone()))
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Page<UserDoc>> {
        let mut users: Vec<UserDoc> = self
            .users
            .iter()
            .filter(|entry| is_live(entry.value()))
            .map(|entry| entry.value().clone())
            .filter(|u| query.is_active.map_or(true, |active| u.is_active == active))
            .filter(|u| {
                query.search.as_deref().map_or(true, |s| {
                    contains_ci(&u.username, s) || contains_ci(&u.email, s)
                })
            })
            .collect();

        users.sort_by_key(|u| Reverse((u.metadata.created_at, u._id)));
        Ok(paginate(users, query.pagination))
    }

    async fn set_users_active(&self, ids: &[ObjectId], active: bool) -> Result<u64> {
        let mut affected = 0;
        for id in ids {
            if let Some(mut user) = self.users.get_mut(id) {
                if user.metadata.is_deleted {
                    continue;
                }
                user.is_active = active;
                if !active {
                    user.token_version += 1;
                }
                user.metadata.touch();
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn adjust_reputation(&self, user_id: &ObjectId, delta: i64) -> Result<()> {
        match self.users.get_mut(user_id) {
            Some(mut user) => {
                user.reputation += delta;
                debug!(user = %user_id, delta, reputation = user.reputation, "Reputation adjusted");
                Ok(())
            }
            None => Err(ForumError::NotFound("User not found".into())),
        }
    }

    async fn insert_question(&self, question: QuestionDoc) -> Result<ObjectId> {
        Ok(insert_with_id(&self.questions, question))
    }

    async fn find_question(&self, id: &ObjectId) -> Result<Option<QuestionDoc>> {
        Ok(find_live(&self.questions, id))
    }

    async fn list_questions(&self, query: &QuestionQuery) -> Result<Page<QuestionDoc>> {
        let mut questions: Vec<QuestionDoc> = self
            .questions
            .iter()
            .filter(|entry| is_live(entry.value()))
            .map(|entry| entry.value().clone())
            .filter(|q| query.tag.as_ref().map_or(true, |t| q.tags.contains(t)))
            .filter(|q| query.search.as_deref().map_or(true, |s| contains_ci(&q.title, s)))
            .collect();

        match query.sort {
            QuestionSort::Newest => {
                questions.sort_by_key(|q| Reverse((q.metadata.created_at, q._id)));
            }
            QuestionSort::Score => {
                questions.sort_by_key(|q| {
                    (Reverse(q.vote_score()), Reverse((q.metadata.created_at, q._id)))
                });
            }
        }

        Ok(paginate(questions, query.pagination))
    }

    async fn update_question(
        &self,
        id: &ObjectId,
        edit: QuestionEdit,
    ) -> Result<Option<QuestionDoc>> {
        let Some(mut question) = self.questions.get_mut(id) else {
            return Ok(None);
        };
        if !is_live(question.value()) {
            return Ok(None);
        }

        if let Some(title) = edit.title {
            question.title = title;
        }
        if let Some(body) = edit.body {
            question.body = body;
        }
        if let Some(tags) = edit.tags {
            question.tags = tags;
        }
        question.metadata.touch();

        Ok(Some(question.value().clone()))
    }

    async fn set_accepted_answer(
        &self,
        question_id: &ObjectId,
        answer_id: Option<ObjectId>,
    ) -> Result<()> {
        if let Some(mut question) = self.questions.get_mut(question_id) {
            question.accepted_answer_id = answer_id;
            question.metadata.touch();
        }
        Ok(())
    }

    async fn delete_questions(&self, ids: &[ObjectId]) -> Result<Vec<QuestionDoc>> {
        Ok(soft_delete_many(&self.questions, ids))
    }

    async fn insert_answer(&self, answer: AnswerDoc) -> Result<ObjectId> {
        Ok(insert_with_id(&self.answers, answer))
    }

    async fn find_answer(&self, id: &ObjectId) -> Result<Option<AnswerDoc>> {
        Ok(find_live(&self.answers, id))
    }

    async fn answers_for_question(&self, question_id: &ObjectId) -> Result<Vec<AnswerDoc>> {
        let mut answers: Vec<AnswerDoc> = self
            .answers
            .iter()
            .filter(|entry| is_live(entry.value()) && entry.value().question_id == *question_id)
            .map(|entry| entry.value().clone())
            .collect();
        answers.sort_by_key(|a| (a.metadata.created_at, a._id));
        Ok(answers)
    }

    async fn count_answers(&self, question_id: &ObjectId) -> Result<u64> {
        Ok(self
            .answers
            .iter()
            .filter(|entry| is_live(entry.value()) && entry.value().question_id == *question_id)
            .count() as u64)
    }

    async fn update_answer_body(&self, id: &ObjectId, body: String) -> Result<Option<AnswerDoc>> {
        let Some(mut answer) = self.answers.get_mut(id) else {
            return Ok(None);
        };
        if !is_live(answer.value()) {
            return Ok(None);
        }
        answer.body = body;
        answer.metadata.touch();

        Ok(Some(answer.value().clone()))
    }

    async fn set_answer_accepted(&self, id: &ObjectId, accepted: bool) -> Result<()> {
        if let Some(mut answer) = self.answers.get_mut(id) {
            answer.is_accepted = accepted;
            answer.metadata.touch();
        }
        Ok(())
    }

    async fn delete_answers(&self, ids: &[ObjectId]) -> Result<Vec<AnswerDoc>> {
        Ok(soft_delete_many(&self.answers, ids))
    }

    async fn load_vote_target(
        &self,
        kind: ContentKind,
        id: &ObjectId,
    ) -> Result<Option<VoteTarget>> {
        Ok(match kind {
            ContentKind::Question => {
                find_live(&self.questions, id).map(|q| VoteTarget::from_content(kind, *id, &q))
            }
            ContentKind::Answer => {
                find_live(&self.answers, id).map(|a| VoteTarget::from_content(kind, *id, &a))
            }
        })
    }

    async fn apply_vote(
        &self,
        kind: ContentKind,
        id: &ObjectId,
        voter: &ObjectId,
        from: VoteState,
        to: VoteState,
    ) -> Result<Option<VoteTarget>> {
        Ok(match kind {
            ContentKind::Question => apply_vote_in(&self.questions, kind, id, voter, from, to),
            ContentKind::Answer => apply_vote_in(&self.answers, kind, id, voter, from, to),
        })
    }

    async fn insert_notification(&self, notification: NotificationDoc) -> Result<ObjectId> {
        Ok(insert_with_id(&self.notifications, notification))
    }

    async fn list_notifications(
        &self,
        recipient: &ObjectId,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<NotificationDoc>> {
        let mut items: Vec<NotificationDoc> = self
            .notifications
            .iter()
            .filter(|entry| {
                let n = entry.value();
                n.recipient_id == *recipient && (!unread_only || !n.is_read)
            })
            .map(|entry| entry.value().clone())
            .collect();

        // ObjectIds grow monotonically, which breaks ties within one timestamp
        items.sort_by_key(|n| Reverse((n.metadata.created_at, n._id)));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn count_unread(&self, recipient: &ObjectId) -> Result<u64> {
        Ok(self
            .notifications
            .iter()
            .filter(|entry| entry.value().recipient_id == *recipient && !entry.value().is_read)
            .count() as u64)
    }

    async fn mark_notification_read(&self, recipient: &ObjectId, id: &ObjectId) -> Result<bool> {
        match self.notifications.get_mut(id) {
            Some(mut n) if n.recipient_id == *recipient => {
                n.is_read = true;
                n.metadata.touch();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient: &ObjectId) -> Result<u64> {
        let mut updated = 0;
        for mut entry in self.notifications.iter_mut() {
            let n = entry.value_mut();
            if n.recipient_id == *recipient && !n.is_read {
                n.is_read = true;
                n.metadata.touch();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn stats(&self) -> Result<ForumStats> {
        let live_users: Vec<bool> = self
            .users
            .iter()
            .filter(|entry| is_live(entry.value()))
            .map(|entry| entry.value().is_active)
            .collect();

        Ok(ForumStats {
            users: live_users.len() as u64,
            banned_users: live_users.iter().filter(|active| !**active).count() as u64,
            questions: self.questions.iter().filter(|e| is_live(e.value())).count() as u64,
            answers: self.answers.iter().filter(|e| is_live(e.value())).count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserDoc {
        UserDoc::new(name.into(), format!("{name}@example.com"), "hash".into())
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryForumStore::new();
        store.insert_user(user("ada")).await.unwrap();

        let err = store.insert_user(user("ada")).await.unwrap_err();
        assert!(matches!(err, ForumError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_registrations_keep_one() {
        let store = std::sync::Arc::new(MemoryForumStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_user(user("grace")).await })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => inserted += 1,
                Err(e) => assert!(matches!(e, ForumError::Conflict(_))),
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.users.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_vote_requires_expected_membership() {
        let store = MemoryForumStore::new();
        let author = ObjectId::new();
        let voter = ObjectId::new();
        let qid = store
            .insert_question(QuestionDoc::new(author, "t".into(), "b".into(), vec![]))
            .await
            .unwrap();

        let stale = store
            .apply_vote(ContentKind::Question, &qid, &voter, VoteState::Up, VoteState::None)
            .await
            .unwrap();
        assert!(stale.is_none());

        let applied = store
            .apply_vote(ContentKind::Question, &qid, &voter, VoteState::None, VoteState::Up)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(applied.vote_score(), 1);
    }

    #[tokio::test]
    async fn test_soft_deleted_question_is_hidden() {
        let store = MemoryForumStore::new();
        let qid = store
            .insert_question(QuestionDoc::new(ObjectId::new(), "t".into(), "b".into(), vec![]))
            .await
            .unwrap();

        let deleted = store.delete_questions(&[qid]).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(store.find_question(&qid).await.unwrap().is_none());
        assert!(store.delete_questions(&[qid]).await.unwrap().is_empty());
        assert!(store
            .load_vote_target(ContentKind::Question, &qid)
            .await
            .unwrap()
            .is_none());
    }
}
