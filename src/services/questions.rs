//! Questions: asking, browsing, editing, removal and voting

use bson::oid::ObjectId;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::info;

use super::{bounded_text, notify, require_question, Actor};
use crate::auth::ForumAction;
use crate::db::schemas::{AnswerDoc, NotificationDoc, NotificationKind, QuestionDoc};
use crate::store::{ForumStore, Page, QuestionEdit, QuestionQuery};
use crate::types::{ForumError, Result};
use crate::voting::{ContentKind, Votable, VoteDirection, VoteOutcome, VoteService};

pub const MIN_TITLE_LEN: usize = 5;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_BODY_LEN: usize = 30_000;
pub const MAX_TAGS: usize = 5;
pub const MAX_TAG_LEN: usize = 32;

/// Input for asking a question
#[derive(Debug, Clone, Default)]
pub struct NewQuestion {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// A question with its live answer count
#[derive(Debug, Clone)]
pub struct QuestionListing {
    pub question: QuestionDoc,
    pub answer_count: u64,
}

/// A question and its answers, accepted answer first then by score
#[derive(Debug, Clone)]
pub struct QuestionThread {
    pub question: QuestionDoc,
    pub answers: Vec<AnswerDoc>,
}

/// Lowercase, trim and dedupe tags, keeping first-seen order
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || normalized.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(ForumError::BadRequest(format!(
                "Tags must be at most {} characters",
                MAX_TAG_LEN
            )));
        }
        normalized.push(tag);
    }
    if normalized.len() > MAX_TAGS {
        return Err(ForumError::BadRequest(format!(
            "At most {} tags are allowed",
            MAX_TAGS
        )));
    }
    Ok(normalized)
}

/// Accepted answer first, then highest score, then oldest
pub fn order_answers(answers: &mut [AnswerDoc]) {
    answers.sort_by_key(|a| {
        (
            !a.is_accepted,
            Reverse(a.vote_score()),
            a.metadata.created_at,
            a._id,
        )
    });
}

/// Soft delete questions together with their answers.
///
/// Authors other than `actor` are told their question was removed.
/// Reputation earned on the removed content is kept.
pub(crate) async fn remove_questions(
    store: &dyn ForumStore,
    actor: &Actor,
    ids: &[ObjectId],
) -> Result<Vec<QuestionDoc>> {
    let removed = store.delete_questions(ids).await?;

    for question in &removed {
        let Some(question_id) = question._id else {
            continue;
        };

        let answer_ids: Vec<ObjectId> = store
            .answers_for_question(&question_id)
            .await?
            .into_iter()
            .filter_map(|a| a._id)
            .collect();
        if !answer_ids.is_empty() {
            store.delete_answers(&answer_ids).await?;
        }

        if question.author_id != actor.id {
            notify(
                store,
                NotificationDoc::new(
                    question.author_id,
                    actor.id,
                    NotificationKind::ContentRemoved,
                    question_id,
                    None,
                    format!("Your question \"{}\" was removed by a moderator", question.title),
                ),
            )
            .await;
        }

        info!(
            question = %question_id,
            by = %actor.username,
            answers = answer_ids.len(),
            "Question removed"
        );
    }

    Ok(removed)
}

#[derive(Clone)]
pub struct QuestionService {
    store: Arc<dyn ForumStore>,
    votes: VoteService,
}

impl QuestionService {
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        let votes = VoteService::new(store.clone());
        Self { store, votes }
    }

    pub async fn ask(&self, actor: &Actor, input: NewQuestion) -> Result<QuestionDoc> {
        actor.ensure(ForumAction::Ask)?;
        let title = bounded_text(&input.title, "Title", MIN_TITLE_LEN, MAX_TITLE_LEN)?;
        let body = bounded_text(&input.body, "Body", 1, MAX_BODY_LEN)?;
        let tags = normalize_tags(&input.tags)?;

        let id = self
            .store
            .insert_question(QuestionDoc::new(actor.id, title, body, tags))
            .await?;

        info!(question = %id, author = %actor.username, "Question asked");
        // Re-read so timestamps match what the store holds
        require_question(self.store.as_ref(), &id).await
    }

    pub async fn list(&self, query: &QuestionQuery) -> Result<Page<QuestionListing>> {
        let page = self.store.list_questions(query).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for question in page.items {
            let answer_count = match question._id {
                Some(id) => self.store.count_answers(&id).await?,
                None => 0,
            };
            items.push(QuestionListing {
                question,
                answer_count,
            });
        }

        Ok(Page {
            items,
            total: page.total,
        })
    }

    pub async fn thread(&self, id: &ObjectId) -> Result<QuestionThread> {
        let question = require_question(self.store.as_ref(), id).await?;
        let mut answers = self.store.answers_for_question(id).await?;
        order_answers(&mut answers);
        Ok(QuestionThread { question, answers })
    }

    /// Author-only edit of title, body or tags
    pub async fn edit(
        &self,
        actor: &Actor,
        id: &ObjectId,
        edit: QuestionEdit,
    ) -> Result<QuestionDoc> {
        let question = require_question(self.store.as_ref(), id).await?;
        if question.author_id != actor.id {
            return Err(ForumError::Forbidden(
                "Only the author can edit this question".into(),
            ));
        }

        let edit = QuestionEdit {
            title: edit
                .title
                .map(|t| bounded_text(&t, "Title", MIN_TITLE_LEN, MAX_TITLE_LEN))
                .transpose()?,
            body: edit
                .body
                .map(|b| bounded_text(&b, "Body", 1, MAX_BODY_LEN))
                .transpose()?,
            tags: edit.tags.map(|t| normalize_tags(&t)).transpose()?,
        };

        self.store
            .update_question(id, edit)
            .await?
            .ok_or_else(|| ForumError::NotFound("question not found".into()))
    }

    /// Author or admin removal
    pub async fn delete(&self, actor: &Actor, id: &ObjectId) -> Result<()> {
        let question = require_question(self.store.as_ref(), id).await?;
        if question.author_id != actor.id && !actor.is_admin() {
            return Err(ForumError::Forbidden(
                "Only the author or an admin can delete this question".into(),
            ));
        }

        remove_questions(self.store.as_ref(), actor, &[*id]).await?;
        Ok(())
    }

    pub async fn vote(
        &self,
        actor: &Actor,
        id: &ObjectId,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        actor.ensure(ForumAction::Vote)?;
        self.votes
            .cast(ContentKind::Question, id, &actor.id, direction)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PermissionLevel;
    use crate::store::{MemoryForumStore, Pagination, QuestionSort};

    fn member(name: &str) -> Actor {
        Actor {
            id: ObjectId::new(),
            username: name.into(),
            permission_level: PermissionLevel::Authenticated,
        }
    }

    fn new_question(title: &str, tags: &[&str]) -> NewQuestion {
        NewQuestion {
            title: title.into(),
            body: "What am I missing?".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![" Rust ".to_string(), "rust".into(), "".into(), "Async".into()];
        assert_eq!(normalize_tags(&tags).unwrap(), vec!["rust", "async"]);

        let too_many: Vec<String> = (0..6).map(|i| format!("t{i}")).collect();
        assert!(normalize_tags(&too_many).is_err());
    }

    #[test]
    fn test_order_answers_puts_accepted_first() {
        let q = ObjectId::new();
        let mut popular = AnswerDoc::new(q, ObjectId::new(), "popular".into());
        popular.upvotes = vec![ObjectId::new(), ObjectId::new()];
        let mut accepted = AnswerDoc::new(q, ObjectId::new(), "accepted".into());
        accepted.is_accepted = true;
        let plain = AnswerDoc::new(q, ObjectId::new(), "plain".into());

        let mut answers = vec![plain, popular, accepted];
        order_answers(&mut answers);
        let bodies: Vec<&str> = answers.iter().map(|a| a.body.as_str()).collect();
        assert_eq!(bodies, vec!["accepted", "popular", "plain"]);
    }

    #[tokio::test]
    async fn test_ask_list_and_filter() {
        let store = Arc::new(MemoryForumStore::new());
        let service = QuestionService::new(store);
        let ada = member("ada");

        service
            .ask(&ada, new_question("Borrow checker woes", &["rust"]))
            .await
            .unwrap();
        service
            .ask(&ada, new_question("Tokio runtime panics", &["rust", "tokio"]))
            .await
            .unwrap();
        service
            .ask(&ada, new_question("Python GIL question", &["python"]))
            .await
            .unwrap();

        let query = QuestionQuery {
            pagination: Pagination::new(1, 10),
            tag: Some("rust".into()),
            search: None,
            sort: QuestionSort::Newest,
        };
        let page = service.list(&query).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].question.title, "Tokio runtime panics");
        assert_eq!(page.items[0].answer_count, 0);

        let query = QuestionQuery {
            search: Some("gil".into()),
            ..Default::default()
        };
        assert_eq!(service.list(&query).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_only_author_edits_and_admin_may_delete() {
        let store = Arc::new(MemoryForumStore::new());
        let service = QuestionService::new(store.clone());
        let author = member("author");
        let stranger = member("stranger");
        let admin = Actor {
            permission_level: PermissionLevel::Admin,
            ..member("admin")
        };

        let question = service
            .ask(&author, new_question("Lifetimes in traits", &[]))
            .await
            .unwrap();
        let id = question._id.unwrap();

        let edit = QuestionEdit {
            title: Some("Lifetimes in trait objects".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.edit(&stranger, &id, edit.clone()).await,
            Err(ForumError::Forbidden(_))
        ));
        let edited = service.edit(&author, &id, edit).await.unwrap();
        assert_eq!(edited.title, "Lifetimes in trait objects");

        assert!(matches!(
            service.delete(&stranger, &id).await,
            Err(ForumError::Forbidden(_))
        ));
        service.delete(&admin, &id).await.unwrap();
        assert!(matches!(service.thread(&id).await, Err(ForumError::NotFound(_))));

        let inbox = store.list_notifications(&author.id, false, 10).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::ContentRemoved);
    }
}
