//! Applies vote requests against the store
//!
//! A request is reconciled against the voter's membership as last read, and
//! the write is conditional on that membership still holding. When another
//! request from the same voter lands in between, the write matches nothing
//! and the whole read-reconcile-write cycle runs again.

use bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::store::ForumStore;
use crate::types::{ForumError, Result};
use crate::voting::{ContentKind, Votable, VoteDirection};

/// Attempts before a contended vote gives up
pub const MAX_VOTE_ATTEMPTS: u32 = 3;

/// Response body for a vote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub vote_score: i64,
    /// `null` when the request toggled the vote off
    pub user_vote: Option<VoteDirection>,
    #[serde(skip)]
    pub reputation_delta: i64,
}

/// Vote reconciliation over a [`ForumStore`]
#[derive(Clone)]
pub struct VoteService {
    store: Arc<dyn ForumStore>,
}

impl VoteService {
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        Self { store }
    }

    /// Cast `direction` on behalf of `voter`.
    ///
    /// Fails with `NotFound` for missing or deleted content and `SelfVote`
    /// when the voter authored it. The author's reputation moves by exactly
    /// the delta of the transition that was written.
    pub async fn cast(
        &self,
        kind: ContentKind,
        id: &ObjectId,
        voter: &ObjectId,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        for attempt in 1..=MAX_VOTE_ATTEMPTS {
            let target = self
                .store
                .load_vote_target(kind, id)
                .await?
                .ok_or_else(|| ForumError::NotFound(format!("{} not found", kind.label())))?;

            if target.author_id() == *voter {
                return Err(ForumError::SelfVote);
            }

            let transition = target.vote_state_of(voter).transition(direction);

            let Some(updated) = self
                .store
                .apply_vote(kind, id, voter, transition.from, transition.to)
                .await?
            else {
                debug!(%kind, %id, %voter, attempt, "Vote membership changed, retrying");
                continue;
            };

            if transition.reputation_delta != 0 {
                self.store
                    .adjust_reputation(&target.author_id, transition.reputation_delta)
                    .await?;
            }

            debug!(
                %kind,
                %id,
                %voter,
                from = %transition.from,
                to = %transition.to,
                delta = transition.reputation_delta,
                "Vote applied"
            );

            return Ok(VoteOutcome {
                vote_score: updated.vote_score(),
                user_vote: transition.to.as_direction(),
                reputation_delta: transition.reputation_delta,
            });
        }

        warn!(%kind, %id, %voter, "Vote abandoned after {} attempts", MAX_VOTE_ATTEMPTS);
        Err(ForumError::Internal(format!(
            "vote on {} {} did not settle",
            kind.label(),
            id
        )))
    }
}
