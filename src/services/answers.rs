//! Answers: posting, editing, removal, voting and acceptance

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{debug, info};

use super::questions::MAX_BODY_LEN;
use super::{bounded_text, notify, require_answer, require_question, Actor};
use crate::auth::ForumAction;
use crate::db::schemas::{AnswerDoc, NotificationDoc, NotificationKind};
use crate::store::ForumStore;
use crate::types::{ForumError, Result};
use crate::voting::{acceptance_bonus, ContentKind, VoteDirection, VoteOutcome, VoteService};

/// State of a question's acceptance after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptOutcome {
    /// Whether the toggled answer is now accepted
    pub accepted: bool,
    pub accepted_answer_id: Option<ObjectId>,
}

/// Apply a reputation change, skipping zero deltas
async fn shift_reputation(store: &dyn ForumStore, user: &ObjectId, delta: i64) -> Result<()> {
    if delta != 0 {
        store.adjust_reputation(user, delta).await?;
    }
    Ok(())
}

/// Soft delete answers.
///
/// A removed accepted answer is unaccepted first, so its author loses the
/// acceptance bonus. Authors other than `actor` are told about the removal.
pub(crate) async fn remove_answers(
    store: &dyn ForumStore,
    actor: &Actor,
    ids: &[ObjectId],
) -> Result<Vec<AnswerDoc>> {
    let removed = store.delete_answers(ids).await?;

    for answer in &removed {
        let Some(answer_id) = answer._id else {
            continue;
        };

        if answer.is_accepted {
            if let Some(question) = store.find_question(&answer.question_id).await? {
                if question.accepted_answer_id == Some(answer_id) {
                    store.set_accepted_answer(&answer.question_id, None).await?;
                    let bonus = acceptance_bonus(&answer.author_id, &question.author_id);
                    shift_reputation(store, &answer.author_id, -bonus).await?;
                }
            }
        }

        if answer.author_id != actor.id {
            notify(
                store,
                NotificationDoc::new(
                    answer.author_id,
                    actor.id,
                    NotificationKind::ContentRemoved,
                    answer.question_id,
                    Some(answer_id),
                    "Your answer was removed by a moderator".into(),
                ),
            )
            .await;
        }

        info!(answer = %answer_id, by = %actor.username, "Answer removed");
    }

    Ok(removed)
}

#[derive(Clone)]
pub struct AnswerService {
    store: Arc<dyn ForumStore>,
    votes: VoteService,
}

impl AnswerService {
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        let votes = VoteService::new(store.clone());
        Self { store, votes }
    }

    /// Answer a question and tell its author
    pub async fn post(
        &self,
        actor: &Actor,
        question_id: &ObjectId,
        body: &str,
    ) -> Result<AnswerDoc> {
        actor.ensure(ForumAction::Answer)?;
        let body = bounded_text(body, "Body", 1, MAX_BODY_LEN)?;
        let question = require_question(self.store.as_ref(), question_id).await?;

        let id = self
            .store
            .insert_answer(AnswerDoc::new(*question_id, actor.id, body))
            .await?;
        info!(answer = %id, question = %question_id, author = %actor.username, "Answer posted");

        if question.author_id != actor.id {
            notify(
                self.store.as_ref(),
                NotificationDoc::new(
                    question.author_id,
                    actor.id,
                    NotificationKind::NewAnswer,
                    *question_id,
                    Some(id),
                    format!("{} answered \"{}\"", actor.username, question.title),
                ),
            )
            .await;
        }

        require_answer(self.store.as_ref(), &id).await
    }

    pub async fn edit(&self, actor: &Actor, id: &ObjectId, body: &str) -> Result<AnswerDoc> {
        let answer = require_answer(self.store.as_ref(), id).await?;
        if answer.author_id != actor.id {
            return Err(ForumError::Forbidden(
                "Only the author can edit this answer".into(),
            ));
        }

        let body = bounded_text(body, "Body", 1, MAX_BODY_LEN)?;
        self.store
            .update_answer_body(id, body)
            .await?
            .ok_or_else(|| ForumError::NotFound("answer not found".into()))
    }

    /// Author or admin removal
    pub async fn delete(&self, actor: &Actor, id: &ObjectId) -> Result<()> {
        let answer = require_answer(self.store.as_ref(), id).await?;
        if answer.author_id != actor.id && !actor.is_admin() {
            return Err(ForumError::Forbidden(
                "Only the author or an admin can delete this answer".into(),
            ));
        }

        remove_answers(self.store.as_ref(), actor, &[*id]).await?;
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
            .cast(ContentKind::Answer, id, &actor.id, direction)
            .await
    }

    /// Toggle acceptance of an answer. Only the question's author may call this.
    ///
    /// Accepting a different answer first unaccepts the current one, moving
    /// the bonus with it.
    pub async fn toggle_accept(
        &self,
        actor: &Actor,
        answer_id: &ObjectId,
    ) -> Result<AcceptOutcome> {
        let store = self.store.as_ref();
        let answer = require_answer(store, answer_id).await?;
        let question_id = answer.question_id;
        let question = require_question(store, &question_id).await?;

        if question.author_id != actor.id {
            return Err(ForumError::Forbidden(
                "Only the question author can accept an answer".into(),
            ));
        }

        if question.accepted_answer_id == Some(*answer_id) {
            store.set_answer_accepted(answer_id, false).await?;
            store.set_accepted_answer(&question_id, None).await?;
            let bonus = acceptance_bonus(&answer.author_id, &question.author_id);
            shift_reputation(store, &answer.author_id, -bonus).await?;

            info!(answer = %answer_id, question = %question_id, "Answer unaccepted");
            return Ok(AcceptOutcome {
                accepted: false,
                accepted_answer_id: None,
            });
        }

        if let Some(previous_id) = question.accepted_answer_id {
            if let Some(previous) = store.find_answer(&previous_id).await? {
                store.set_answer_accepted(&previous_id, false).await?;
                let bonus = acceptance_bonus(&previous.author_id, &question.author_id);
                shift_reputation(store, &previous.author_id, -bonus).await?;
                debug!(answer = %previous_id, "Previously accepted answer unaccepted");
            }
        }

        store.set_answer_accepted(answer_id, true).await?;
        store
            .set_accepted_answer(&question_id, Some(*answer_id))
            .await?;
        let bonus = acceptance_bonus(&answer.author_id, &question.author_id);
        shift_reputation(store, &answer.author_id, bonus).await?;

        if answer.author_id != actor.id {
            notify(
                store,
                NotificationDoc::new(
                    answer.author_id,
                    actor.id,
                    NotificationKind::AnswerAccepted,
                    question_id,
                    Some(*answer_id),
                    format!("Your answer to \"{}\" was accepted", question.title),
                ),
            )
            .await;
        }

        info!(answer = %answer_id, question = %question_id, bonus, "Answer accepted");
        Ok(AcceptOutcome {
            accepted: true,
            accepted_answer_id: Some(*answer_id),
        })
    }
}
