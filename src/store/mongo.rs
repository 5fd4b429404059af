//! MongoDB-backed forum store

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::options::FindOptions;
use tracing::{debug, warn};

use super::{
    ForumStats, ForumStore, Page, QuestionEdit, QuestionQuery, QuestionSort, UserQuery,
    VoteTarget,
};
use crate::db::mongo::{exclude_deleted, MongoClient, MongoCollection};
use crate::db::schemas::{
    AnswerDoc, NotificationDoc, QuestionDoc, UserDoc, ANSWER_COLLECTION,
    NOTIFICATION_COLLECTION, QUESTION_COLLECTION, USER_COLLECTION,
};
use crate::types::{ForumError, Result};
use crate::voting::{ContentKind, VoteState};

/// Forum store over a MongoDB database
pub struct MongoForumStore {
    users: MongoCollection<UserDoc>,
    questions: MongoCollection<QuestionDoc>,
    answers: MongoCollection<AnswerDoc>,
    notifications: MongoCollection<NotificationDoc>,
}

impl MongoForumStore {
    /// Open all collections and apply their indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: mongo.collection(USER_COLLECTION).await?,
            questions: mongo.collection(QUESTION_COLLECTION).await?,
            answers: mongo.collection(ANSWER_COLLECTION).await?,
            notifications: mongo.collection(NOTIFICATION_COLLECTION).await?,
        })
    }
}

fn id_filter(id: &ObjectId) -> Document {
    doc! { "_id": *id }
}

fn ids_filter(ids: &[ObjectId]) -> Document {
    let ids: Vec<Bson> = ids.iter().map(|id| Bson::ObjectId(*id)).collect();
    doc! { "_id": { "$in": ids } }
}

/// Escape user input for use inside a `$regex`
fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Filter asserting `voter`'s membership in the vote sets
fn membership_filter(voter: &ObjectId, state: VoteState) -> Document {
    match state {
        VoteState::None => doc! {
            "upvotes": { "$ne": *voter },
            "downvotes": { "$ne": *voter },
        },
        VoteState::Up => doc! { "upvotes": *voter },
        VoteState::Down => doc! { "downvotes": *voter },
    }
}

/// Update moving `voter` into the set named by `next`; other voters are untouched
fn membership_update(voter: &ObjectId, next: VoteState) -> Document {
    match next {
        VoteState::Up => doc! {
            "$addToSet": { "upvotes": *voter },
            "$pull": { "downvotes": *voter },
        },
        VoteState::Down => doc! {
            "$addToSet": { "downvotes": *voter },
            "$pull": { "upvotes": *voter },
        },
        VoteState::None => doc! {
            "$pull": { "upvotes": *voter, "downvotes": *voter },
        },
    }
}

fn vote_filter(id: &ObjectId, voter: &ObjectId, from: VoteState) -> Document {
    let mut filter = id_filter(id);
    for (key, value) in membership_filter(voter, from) {
        filter.insert(key, value);
    }
    filter
}

#[async_trait]
impl ForumStore for MongoForumStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn insert_user(&self, user: UserDoc) -> Result<ObjectId> {
        self.users.insert_one(user).await
    }

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        self.users.find_one(id_filter(id)).await
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<UserDoc>> {
        self.users
            .find_one(doc! {
                "$or": [
                    { "username": identifier },
                    { "email": identifier.to_lowercase() },
                ]
            })
            .await
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Page<UserDoc>> {
        let mut filter = Document::new();
        if let Some(search) = &query.search {
            let pattern = escape_regex(search);
            filter.insert(
                "$or",
                vec![
                    doc! { "username": { "$regex": &pattern, "$options": "i" } },
                    doc! { "email": { "$regex": &pattern, "$options": "i" } },
                ],
            );
        }
        if let Some(active) = query.is_active {
            filter.insert("is_active", active);
        }

        let total = self.users.count(filter.clone()).await?;
        let options = FindOptions::builder()
            .sort(doc! { "metadata.created_at": -1, "_id": -1 })
            .skip(query.pagination.skip())
            .limit(query.pagination.limit as i64)
            .build();
        let items = self.users.find_many(filter, Some(options)).await?;

        Ok(Page { items, total })
    }

    async fn set_users_active(&self, ids: &[ObjectId], active: bool) -> Result<u64> {
        let mut filter = ids_filter(ids);
        exclude_deleted(&mut filter);

        let update = if active {
            doc! { "$set": { "is_active": true } }
        } else {
            doc! { "$set": { "is_active": false }, "$inc": { "token_version": 1 } }
        };

        let result = self.users.update_many(filter, update).await?;
        Ok(result.matched_count)
    }

    async fn adjust_reputation(&self, user_id: &ObjectId, delta: i64) -> Result<()> {
        let result = self
            .users
            .update_one(id_filter(user_id), doc! { "$inc": { "reputation": delta } })
            .await?;

        if result.matched_count == 0 {
            return Err(ForumError::NotFound("User not found".into()));
        }
        debug!(user = %user_id, delta, "Reputation adjusted");
        Ok(())
    }

    async fn insert_question(&self, question: QuestionDoc) -> Result<ObjectId> {
        self.questions.insert_one(question).await
    }

    async fn find_question(&self, id: &ObjectId) -> Result<Option<QuestionDoc>> {
        self.questions.find_one(id_filter(id)).await
    }

    async fn list_questions(&self, query: &QuestionQuery) -> Result<Page<QuestionDoc>> {
        let mut filter = Document::new();
        if let Some(tag) = &query.tag {
            filter.insert("tags", tag.as_str());
        }
        if let Some(search) = &query.search {
            filter.insert(
                "title",
                doc! { "$regex": escape_regex(search), "$options": "i" },
            );
        }

        let total = self.questions.count(filter.clone()).await?;

        let items = match query.sort {
            QuestionSort::Newest => {
                let options = FindOptions::builder()
                    .sort(doc! { "metadata.created_at": -1, "_id": -1 })
                    .skip(query.pagination.skip())
                    .limit(query.pagination.limit as i64)
                    .build();
                self.questions.find_many(filter, Some(options)).await?
            }
            QuestionSort::Score => {
                // Score is derived from the vote sets, so rank in an aggregation
                exclude_deleted(&mut filter);
                let pipeline = vec![
                    doc! { "$match": filter },
                    doc! { "$addFields": {
                        "_score": { "$subtract": [
                            { "$size": { "$ifNull": ["$upvotes", []] } },
                            { "$size": { "$ifNull": ["$downvotes", []] } },
                        ] }
                    } },
                    doc! { "$sort": { "_score": -1, "metadata.created_at": -1, "_id": -1 } },
                    doc! { "$skip": query.pagination.skip() as i64 },
                    doc! { "$limit": query.pagination.limit as i64 },
                    doc! { "$project": { "_score": 0 } },
                ];

                let cursor = self.questions.inner().aggregate(pipeline).await?;
                let docs: Vec<Document> = cursor.try_collect().await?;
                docs.into_iter()
                    .filter_map(|d| match bson::from_document::<QuestionDoc>(d) {
                        Ok(q) => Some(q),
                        Err(e) => {
                            warn!("Skipping unreadable question document: {}", e);
                            None
                        }
                    })
                    .collect()
            }
        };

        Ok(Page { items, total })
    }

    async fn update_question(
        &self,
        id: &ObjectId,
        edit: QuestionEdit,
    ) -> Result<Option<QuestionDoc>> {
        let mut set = Document::new();
        if let Some(title) = edit.title {
            set.insert("title", title);
        }
        if let Some(body) = edit.body {
            set.insert("body", body);
        }
        if let Some(tags) = edit.tags {
            set.insert("tags", tags);
        }

        self.questions
            .find_one_and_update(id_filter(id), doc! { "$set": set })
            .await
    }

    async fn set_accepted_answer(
        &self,
        question_id: &ObjectId,
        answer_id: Option<ObjectId>,
    ) -> Result<()> {
        let update = match answer_id {
            Some(answer_id) => doc! { "$set": { "accepted_answer_id": answer_id } },
            None => doc! { "$unset": { "accepted_answer_id": "" } },
        };
        self.questions.update_one(id_filter(question_id), update).await?;
        Ok(())
    }

    async fn delete_questions(&self, ids: &[ObjectId]) -> Result<Vec<QuestionDoc>> {
        let live = self.questions.find_many(ids_filter(ids), None).await?;
        if !live.is_empty() {
            self.questions.soft_delete(ids_filter(ids)).await?;
        }
        Ok(live)
    }

    async fn insert_answer(&self, answer: AnswerDoc) -> Result<ObjectId> {
        self.answers.insert_one(answer).await
    }

    async fn find_answer(&self, id: &ObjectId) -> Result<Option<AnswerDoc>> {
        self.answers.find_one(id_filter(id)).await
    }

    async fn answers_for_question(&self, question_id: &ObjectId) -> Result<Vec<AnswerDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "metadata.created_at": 1, "_id": 1 })
            .build();
        self.answers
            .find_many(doc! { "question_id": *question_id }, Some(options))
            .await
    }

    async fn count_answers(&self, question_id: &ObjectId) -> Result<u64> {
        self.answers.count(doc! { "question_id": *question_id }).await
    }

    async fn update_answer_body(&self, id: &ObjectId, body: String) -> Result<Option<AnswerDoc>> {
        self.answers
            .find_one_and_update(id_filter(id), doc! { "$set": { "body": body } })
            .await
    }

    async fn set_answer_accepted(&self, id: &ObjectId, accepted: bool) -> Result<()> {
        self.answers
            .update_one(id_filter(id), doc! { "$set": { "is_accepted": accepted } })
            .await?;
        Ok(())
    }

    async fn delete_answers(&self, ids: &[ObjectId]) -> Result<Vec<AnswerDoc>> {
        let live = self.answers.find_many(ids_filter(ids), None).await?;
        if !live.is_empty() {
            self.answers.soft_delete(ids_filter(ids)).await?;
        }
        Ok(live)
    }

    async fn load_vote_target(
        &self,
        kind: ContentKind,
        id: &ObjectId,
    ) -> Result<Option<VoteTarget>> {
        Ok(match kind {
            ContentKind::Question => self
                .find_question(id)
                .await?
                .map(|q| VoteTarget::from_content(kind, *id, &q)),
            ContentKind::Answer => self
                .find_answer(id)
                .await?
                .map(|a| VoteTarget::from_content(kind, *id, &a)),
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
        let filter = vote_filter(id, voter, from);
        let update = membership_update(voter, to);

        let target = match kind {
            ContentKind::Question => self
                .questions
                .find_one_and_update(filter, update)
                .await?
                .map(|q| VoteTarget::from_content(kind, *id, &q)),
            ContentKind::Answer => self
                .answers
                .find_one_and_update(filter, update)
                .await?
                .map(|a| VoteTarget::from_content(kind, *id, &a)),
        };

        Ok(target)
    }

    async fn insert_notification(&self, notification: NotificationDoc) -> Result<ObjectId> {
        self.notifications.insert_one(notification).await
    }

    async fn list_notifications(
        &self,
        recipient: &ObjectId,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<NotificationDoc>> {
        let mut filter = doc! { "recipient_id": *recipient };
        if unread_only {
            filter.insert("is_read", false);
        }
        let options = FindOptions::builder()
            .sort(doc! { "metadata.created_at": -1, "_id": -1 })
            .limit(limit as i64)
            .build();
        self.notifications.find_many(filter, Some(options)).await
    }

    async fn count_unread(&self, recipient: &ObjectId) -> Result<u64> {
        self.notifications
            .count(doc! { "recipient_id": *recipient, "is_read": false })
            .await
    }

    async fn mark_notification_read(&self, recipient: &ObjectId, id: &ObjectId) -> Result<bool> {
        let result = self
            .notifications
            .update_one(
                doc! { "_id": *id, "recipient_id": *recipient },
                doc! { "$set": { "is_read": true } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn mark_all_read(&self, recipient: &ObjectId) -> Result<u64> {
        let result = self
            .notifications
            .update_many(
                doc! { "recipient_id": *recipient, "is_read": false },
                doc! { "$set": { "is_read": true } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn stats(&self) -> Result<ForumStats> {
        Ok(ForumStats {
            users: self.users.count(Document::new()).await?,
            banned_users: self.users.count(doc! { "is_active": false }).await?,
            questions: self.questions.count(Document::new()).await?,
            answers: self.answers.count(Document::new()).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_filter_shapes() {
        let voter = ObjectId::new();

        let none = membership_filter(&voter, VoteState::None);
        assert!(none.contains_key("upvotes"));
        assert!(none.contains_key("downvotes"));

        let up = membership_filter(&voter, VoteState::Up);
        assert_eq!(up.get_object_id("upvotes").unwrap(), voter);
    }

    #[test]
    fn test_membership_update_touches_only_voter() {
        let voter = ObjectId::new();

        let up = membership_update(&voter, VoteState::Up);
        assert_eq!(
            up.get_document("$addToSet").unwrap().get_object_id("upvotes").unwrap(),
            voter
        );
        assert_eq!(
            up.get_document("$pull").unwrap().get_object_id("downvotes").unwrap(),
            voter
        );

        let off = membership_update(&voter, VoteState::None);
        assert!(off.get_document("$addToSet").is_err());
        assert_eq!(off.get_document("$pull").unwrap().len(), 2);
    }

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("c++ (rust)"), "c\\+\\+ \\(rust\\)");
        assert_eq!(escape_regex("plain"), "plain");
    }
}
