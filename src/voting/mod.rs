//! Vote reconciliation and reputation ledger
//!
//! Questions and answers carry two disjoint voter sets. A vote request is
//! reconciled against the voter's current membership using a fixed
//! transition table, which also yields the reputation delta for the author:
//!
//! | current | requested | next | author Δ |
//! |---------|-----------|------|----------|
//! | none    | up        | up   | +10      |
//! | none    | down      | down | −2       |
//! | up      | up        | none | −10      |
//! | down    | down      | none | +2       |
//! | down    | up        | up   | +12      |
//! | up      | down      | down | −12      |
//!
//! Accepting an answer is the only other reputation source: the answer's
//! author holds [`ACCEPT_REPUTATION`] for as long as it stays accepted.
//!
//! The table lives here as pure functions; [`service::VoteService`] wires it
//! to the store.

pub mod service;

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use service::{VoteOutcome, VoteService, MAX_VOTE_ATTEMPTS};

/// Reputation gained by an author per upvote
pub const UPVOTE_REPUTATION: i64 = 10;

/// Reputation lost by an author per downvote
pub const DOWNVOTE_REPUTATION: i64 = 2;

/// Reputation an answer author gains while their answer is accepted
pub const ACCEPT_REPUTATION: i64 = 15;

/// Bonus carried by an accepted answer; accepting your own answer earns nothing
pub fn acceptance_bonus(answer_author: &ObjectId, question_author: &ObjectId) -> i64 {
    if answer_author == question_author {
        0
    } else {
        ACCEPT_REPUTATION
    }
}

/// Requested vote direction (`{"type": "up" | "down"}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

/// A voter's membership for one content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VoteState {
    #[default]
    None,
    Up,
    Down,
}

/// Result of reconciling one vote request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: VoteState,
    pub to: VoteState,
    /// Applied to the content author's reputation
    pub reputation_delta: i64,
}

impl VoteState {
    /// Reputation an author holds from a single voter in this state
    fn weight(self) -> i64 {
        match self {
            VoteState::None => 0,
            VoteState::Up => UPVOTE_REPUTATION,
            VoteState::Down => -DOWNVOTE_REPUTATION,
        }
    }

    /// Reconcile a request against this state.
    ///
    /// Repeating the current direction toggles the vote off; anything else
    /// moves the voter to the requested side.
    pub fn transition(self, requested: VoteDirection) -> Transition {
        let to = match (self, requested) {
            (VoteState::Up, VoteDirection::Up) | (VoteState::Down, VoteDirection::Down) => {
                VoteState::None
            }
            (_, VoteDirection::Up) => VoteState::Up,
            (_, VoteDirection::Down) => VoteState::Down,
        };

        Transition {
            from: self,
            to,
            reputation_delta: to.weight() - self.weight(),
        }
    }

    /// The caller-facing value (`userVote`)
    pub fn as_direction(self) -> Option<VoteDirection> {
        match self {
            VoteState::None => None,
            VoteState::Up => Some(VoteDirection::Up),
            VoteState::Down => Some(VoteDirection::Down),
        }
    }
}

impl From<VoteDirection> for VoteState {
    fn from(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => VoteState::Up,
            VoteDirection::Down => VoteState::Down,
        }
    }
}

impl fmt::Display for VoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteState::None => write!(f, "none"),
            VoteState::Up => write!(f, "up"),
            VoteState::Down => write!(f, "down"),
        }
    }
}

/// Which collection a vote targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Question,
    Answer,
}

impl ContentKind {
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Question => "question",
            ContentKind::Answer => "answer",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Content that carries upvote/downvote sets
pub trait Votable {
    fn author_id(&self) -> ObjectId;
    fn upvotes(&self) -> &[ObjectId];
    fn downvotes(&self) -> &[ObjectId];
    fn vote_sets_mut(&mut self) -> (&mut Vec<ObjectId>, &mut Vec<ObjectId>);

    /// Current membership of `voter`
    fn vote_state_of(&self, voter: &ObjectId) -> VoteState {
        if self.upvotes().contains(voter) {
            VoteState::Up
        } else if self.downvotes().contains(voter) {
            VoteState::Down
        } else {
            VoteState::None
        }
    }

    /// `|upvotes| - |downvotes|`
    fn vote_score(&self) -> i64 {
        self.upvotes().len() as i64 - self.downvotes().len() as i64
    }

    /// Move `voter` into exactly the set named by `next`, touching no other voter
    fn set_vote(&mut self, voter: &ObjectId, next: VoteState) {
        let (upvotes, downvotes) = self.vote_sets_mut();
        upvotes.retain(|id| id != voter);
        downvotes.retain(|id| id != voter);
        match next {
            VoteState::Up => upvotes.push(*voter),
            VoteState::Down => downvotes.push(*voter),
            VoteState::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Ballot {
        author: ObjectId,
        up: Vec<ObjectId>,
        down: Vec<ObjectId>,
    }

    impl Votable for Ballot {
        fn author_id(&self) -> ObjectId {
            self.author
        }
        fn upvotes(&self) -> &[ObjectId] {
            &self.up
        }
        fn downvotes(&self) -> &[ObjectId] {
            &self.down
        }
        fn vote_sets_mut(&mut self) -> (&mut Vec<ObjectId>, &mut Vec<ObjectId>) {
            (&mut self.up, &mut self.down)
        }
    }

    #[test]
    fn test_transition_table() {
        use VoteDirection as D;
        use VoteState as S;

        let cases = [
            (S::None, D::Up, S::Up, 10),
            (S::None, D::Down, S::Down, -2),
            (S::Up, D::Up, S::None, -10),
            (S::Down, D::Down, S::None, 2),
            (S::Down, D::Up, S::Up, 12),
            (S::Up, D::Down, S::Down, -12),
        ];

        for (from, requested, to, delta) in cases {
            let t = from.transition(requested);
            assert_eq!(t.from, from);
            assert_eq!(t.to, to, "{from} + {requested:?}");
            assert_eq!(t.reputation_delta, delta, "{from} + {requested:?}");
        }
    }

    #[test]
    fn test_double_upvote_toggles_off() {
        let first = VoteState::None.transition(VoteDirection::Up);
        let second = first.to.transition(VoteDirection::Up);
        assert_eq!(second.to, VoteState::None);
        assert_eq!(first.reputation_delta + second.reputation_delta, 0);
    }

    #[test]
    fn test_set_vote_switches_sides() {
        let voter = ObjectId::new();
        let mut ballot = Ballot::default();

        ballot.set_vote(&voter, VoteState::Down);
        assert_eq!(ballot.vote_state_of(&voter), VoteState::Down);
        assert_eq!(ballot.vote_score(), -1);

        ballot.set_vote(&voter, VoteState::Up);
        assert_eq!(ballot.vote_state_of(&voter), VoteState::Up);
        assert!(ballot.down.is_empty());
        assert_eq!(ballot.vote_score(), 1);

        ballot.set_vote(&voter, VoteState::None);
        assert_eq!(ballot.vote_score(), 0);
    }

    #[test]
    fn test_self_accept_earns_nothing() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_eq!(acceptance_bonus(&a, &a), 0);
        assert_eq!(acceptance_bonus(&a, &b), ACCEPT_REPUTATION);
    }

    #[test]
    fn test_direction_serde() {
        let parsed: VoteDirection = serde_json::from_str("\"down\"").unwrap();
        assert_eq!(parsed, VoteDirection::Down);
        assert_eq!(VoteState::Up.as_direction(), Some(VoteDirection::Up));
        assert_eq!(VoteState::None.as_direction(), None);
    }

    fn arb_direction() -> impl Strategy<Value = VoteDirection> {
        prop_oneof![Just(VoteDirection::Up), Just(VoteDirection::Down)]
    }

    proptest! {
        /// Replaying any request sequence keeps the sets disjoint, the score
        /// equal to the set sizes, and the ledger equal to the final weights.
        #[test]
        fn prop_reconciliation_is_consistent(
            requests in prop::collection::vec((0usize..6, arb_direction()), 0..64)
        ) {
            let voters: Vec<ObjectId> = (0..6).map(|_| ObjectId::new()).collect();
            let mut ballot = Ballot::default();
            let mut reputation = 0i64;

            for (idx, direction) in requests {
                let voter = voters[idx];
                let t = ballot.vote_state_of(&voter).transition(direction);
                ballot.set_vote(&voter, t.to);
                reputation += t.reputation_delta;

                for v in &voters {
                    prop_assert!(!(ballot.up.contains(v) && ballot.down.contains(v)));
                }
            }

            prop_assert_eq!(
                ballot.vote_score(),
                ballot.up.len() as i64 - ballot.down.len() as i64
            );
            let expected = ballot.up.len() as i64 * UPVOTE_REPUTATION
                - ballot.down.len() as i64 * DOWNVOTE_REPUTATION;
            prop_assert_eq!(reputation, expected);
        }
    }
}
