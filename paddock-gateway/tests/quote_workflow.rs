//! End-to-end quote moderation flow: nomination, vote tallies, the commit
//! into the quote table, and exactly-once behavior under replayed events.

use std::collections::HashSet;

use paddock_core::{Nomination, PendingQuotes, validate_nomination};
use paddock_db::{NewQuote, QuoteRepository, test_helpers::create_test_pool};

const NOMINATOR: u64 = 10;
const SUBJECT: u64 = 20;
const OUTSIDER: u64 = 30;

fn approvers(ids: &[u64]) -> HashSet<u64> {
    ids.iter().copied().collect()
}

/// Drive one vote event the way the reaction handler does: tally under the
/// pending store, remove on commit, then write the quote row.
async fn vote_event(
    pending: &mut PendingQuotes,
    pool: &sqlx::SqlitePool,
    vote_message_id: u64,
    reactors: &[u64],
) -> bool {
    let Some(nomination) = pending.get_mut_by_vote_message(vote_message_id) else {
        return false;
    };
    let update = nomination.tally(&approvers(reactors));
    if !update.committed {
        return false;
    }
    let snapshot = nomination.clone();
    pending.remove(snapshot.message_id);

    let message_id = snapshot.message_id.to_string();
    let member_id = snapshot.subject_id.to_string();
    QuoteRepository::insert(
        pool,
        &NewQuote {
            message_id: &message_id,
            member_discord_id: &member_id,
            text: "box box box",
            context_text: None,
            context_author: None,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn nomination_commits_exactly_once() {
    let db = create_test_pool().await.unwrap();
    let pool = db.pool();

    assert!(validate_nomination("box box box", false).is_ok());

    let mut pending = PendingQuotes::default();
    pending.insert(Nomination::new(100, 1, NOMINATOR, SUBJECT, 500));

    // Nominator reacts alone: threshold not met, nothing stored.
    assert!(!vote_event(&mut pending, pool, 500, &[NOMINATOR]).await);
    assert_eq!(QuoteRepository::count(pool, None).await.unwrap(), 0);
    assert!(pending.contains(100));

    // An uninvolved third reactor arrives: commit fires, the nomination
    // leaves the pending set.
    assert!(vote_event(&mut pending, pool, 500, &[NOMINATOR, OUTSIDER]).await);
    assert_eq!(QuoteRepository::count(pool, None).await.unwrap(), 1);
    assert!(!pending.contains(100));

    // Replayed reaction event: the pending set is empty, nothing happens.
    assert!(!vote_event(&mut pending, pool, 500, &[NOMINATOR, OUTSIDER]).await);
    assert_eq!(QuoteRepository::count(pool, None).await.unwrap(), 1);
}

#[tokio::test]
async fn database_backstops_duplicate_commits() {
    let db = create_test_pool().await.unwrap();
    let pool = db.pool();

    // Two pending stores simulating a lost state file after a restart:
    // both believe the nomination is open.
    let mut first = PendingQuotes::default();
    first.insert(Nomination::new(100, 1, NOMINATOR, SUBJECT, 500));
    let mut second = PendingQuotes::default();
    second.insert(Nomination::new(100, 1, NOMINATOR, SUBJECT, 500));

    assert!(vote_event(&mut first, pool, 500, &[OUTSIDER]).await);
    // The second commit finds the unique message id taken.
    assert!(!vote_event(&mut second, pool, 500, &[OUTSIDER]).await);
    assert_eq!(QuoteRepository::count(pool, None).await.unwrap(), 1);
}

#[tokio::test]
async fn pending_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending_quotes.toml");

    let mut pending = PendingQuotes::default();
    let mut nomination = Nomination::new(100, 1, NOMINATOR, SUBJECT, 500);
    // Nominator already voted (and was scolded) before the restart.
    nomination.tally(&approvers(&[NOMINATOR]));
    pending.insert(nomination);
    pending.save_to(&path).unwrap();

    // After the restart the flags are intact: no second scold, and the
    // outside vote still commits.
    let mut restored = PendingQuotes::load_from(&path).unwrap();
    let nomination = restored.get_mut_by_vote_message(500).unwrap();
    let update = nomination.tally(&approvers(&[NOMINATOR]));
    assert!(!update.scold_nominator);
    assert!(!update.committed);

    let update = nomination.tally(&approvers(&[NOMINATOR, OUTSIDER]));
    assert!(update.committed);
}
