//! Score and reputation stay reconciled under arbitrary vote sequences

use agora::db::schemas::{AnswerDoc, QuestionDoc, UserDoc, STARTING_REPUTATION};
use agora::store::{ForumStore, MemoryForumStore};
use agora::voting::{
    ContentKind, Votable, VoteDirection, VoteService, DOWNVOTE_REPUTATION, UPVOTE_REPUTATION,
};
use bson::oid::ObjectId;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn arb_direction() -> impl Strategy<Value = VoteDirection> {
    prop_oneof![Just(VoteDirection::Up), Just(VoteDirection::Down)]
}

/// (voter index, direction) pairs over a small voter pool
fn arb_requests() -> impl Strategy<Value = Vec<(usize, VoteDirection)>> {
    prop::collection::vec((0..5usize, arb_direction()), 0..40)
}

/// Replay `requests` and return (author reputation, final score, final votes)
async fn replay(
    kind: ContentKind,
    requests: &[(usize, VoteDirection)],
) -> (i64, i64, HashMap<usize, VoteDirection>) {
    let store = Arc::new(MemoryForumStore::new());
    let author = store
        .insert_user(UserDoc::new("author".into(), "author@example.com".into(), "x".into()))
        .await
        .unwrap();
    let question = store
        .insert_question(QuestionDoc::new(author, "A question".into(), "Body".into(), vec![]))
        .await
        .unwrap();
    let target = match kind {
        ContentKind::Question => question,
        ContentKind::Answer => store
            .insert_answer(AnswerDoc::new(question, author, "An answer".into()))
            .await
            .unwrap(),
    };

    let voters: Vec<ObjectId> = (0..5).map(|_| ObjectId::new()).collect();
    let service = VoteService::new(store.clone());
    let mut expected: HashMap<usize, VoteDirection> = HashMap::new();

    let mut score = 0;
    for &(voter, direction) in requests {
        let outcome = service
            .cast(kind, &target, &voters[voter], direction)
            .await
            .unwrap();
        score = outcome.vote_score;

        if expected.get(&voter) == Some(&direction) {
            expected.remove(&voter);
        } else {
            expected.insert(voter, direction);
        }
        assert_eq!(outcome.user_vote, expected.get(&voter).copied());
    }

    let stored = store.load_vote_target(kind, &target).await.unwrap().unwrap();
    assert_eq!(stored.vote_score(), score);

    let reputation = store.find_user(&author).await.unwrap().unwrap().reputation;
    (reputation, score, expected)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The score is ups minus downs and the author's reputation is exactly
    /// what the surviving votes are worth, whatever order they arrived in.
    #[test]
    fn prop_votes_reconcile(requests in arb_requests(), on_answer in any::<bool>()) {
        let kind = if on_answer { ContentKind::Answer } else { ContentKind::Question };
        let (reputation, score, votes) = tokio_test::block_on(replay(kind, &requests));

        let ups = votes.values().filter(|d| **d == VoteDirection::Up).count() as i64;
        let downs = votes.len() as i64 - ups;

        prop_assert_eq!(score, ups - downs);
        prop_assert_eq!(
            reputation,
            STARTING_REPUTATION + ups * UPVOTE_REPUTATION - downs * DOWNVOTE_REPUTATION
        );
    }
}

#[tokio::test]
async fn test_concurrent_voters_all_land() {
    let store = Arc::new(MemoryForumStore::new());
    let author = store
        .insert_user(UserDoc::new("author".into(), "author@example.com".into(), "x".into()))
        .await
        .unwrap();
    let question = store
        .insert_question(QuestionDoc::new(author, "Busy question".into(), "Body".into(), vec![]))
        .await
        .unwrap();
    let service = VoteService::new(store.clone());

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let service = service.clone();
            let direction = if i % 4 == 0 { VoteDirection::Down } else { VoteDirection::Up };
            tokio::spawn(async move {
                service
                    .cast(ContentKind::Question, &question, &ObjectId::new(), direction)
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = store.find_question(&question).await.unwrap().unwrap();
    assert_eq!(stored.upvotes.len(), 15);
    assert_eq!(stored.downvotes.len(), 5);
    assert_eq!(stored.vote_score(), 10);

    let reputation = store.find_user(&author).await.unwrap().unwrap().reputation;
    assert_eq!(
        reputation,
        STARTING_REPUTATION + 15 * UPVOTE_REPUTATION - 5 * DOWNVOTE_REPUTATION
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_voter_racing_stays_reconciled() {
    for _ in 0..50 {
        let store = Arc::new(MemoryForumStore::new());
        let author = store
            .insert_user(UserDoc::new("author".into(), "author@example.com".into(), "x".into()))
            .await
            .unwrap();
        let question = store
            .insert_question(QuestionDoc::new(
                author,
                "Racy question".into(),
                "Body".into(),
                vec![],
            ))
            .await
            .unwrap();
        let voter = ObjectId::new();
        let service = VoteService::new(store.clone());

        let handles: Vec<_> = (0..7)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .cast(ContentKind::Question, &question, &voter, VoteDirection::Up)
                        .await
                })
            })
            .collect();
        for handle in handles {
            // A request that never settles fails whole; it must not leak a delta
            let _ = handle.await.unwrap();
        }

        let stored = store.find_question(&question).await.unwrap().unwrap();
        assert!(stored.upvotes.len() <= 1);
        assert!(stored.downvotes.is_empty());

        let reputation = store.find_user(&author).await.unwrap().unwrap().reputation;
        assert_eq!(
            reputation,
            STARTING_REPUTATION + stored.upvotes.len() as i64 * UPVOTE_REPUTATION
        );
    }
}
