#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Concurrency tests: many connections hitting one party at the same time.
//!
//! Runs on the multi-threaded runtime so handlers for the same party really
//! do interleave.

mod common;

use std::sync::Arc;

use futures_util::future::join_all;
use party_sync::{MemoryPartyStore, Player, SessionCoordinator};
use serde_json::json;

use common::{conn, encode, names, player_payload, RecordingTransport};

type Recorded = SessionCoordinator<MemoryPartyStore, RecordingTransport>;

fn shared() -> Arc<Recorded> {
    Arc::new(SessionCoordinator::new(
        MemoryPartyStore::new(),
        RecordingTransport::new(),
    ))
}

const PLAYERS: usize = 20;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_keep_every_player() {
    let c = shared();

    let joins = (0..PLAYERS).map(|i| {
        let c = Arc::clone(&c);
        tokio::spawn(async move {
            c.join(&conn(&format!("c{i}")), "P", &player_payload(&format!("Player{i}")))
                .await
        })
    });
    for outcome in join_all(joins).await {
        outcome.expect("task").expect("join");
    }

    let party = c.party("P").await.expect("fetch").expect("party");
    let mut seen = names(&party);
    seen.sort();
    let mut expected: Vec<_> = (0..PLAYERS).map(|i| format!("Player{i}")).collect();
    expected.sort();
    assert_eq!(seen, expected);
    assert_eq!(c.index().members_of("P").len(), PLAYERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn join_then_disconnect_storm_leaves_nothing_behind() {
    let c = shared();

    let storm = (0..PLAYERS).map(|i| {
        let c = Arc::clone(&c);
        tokio::spawn(async move {
            let id = conn(&format!("c{i}"));
            c.join(&id, "P", &player_payload(&format!("Player{i}")))
                .await?;
            tokio::task::yield_now().await;
            c.on_disconnect(&id).await
        })
    });
    for outcome in join_all(storm).await {
        outcome.expect("task").expect("join and disconnect");
    }

    assert!(c.party("P").await.expect("fetch").is_none());
    assert!(c.store().is_empty());
    assert!(c.index().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_are_all_retained() {
    let c = shared();
    for i in 0..PLAYERS {
        c.join(&conn(&format!("c{i}")), "P", &player_payload(&format!("Player{i}")))
            .await
            .expect("join");
    }

    let updates = (0..PLAYERS).map(|i| {
        let c = Arc::clone(&c);
        tokio::spawn(async move {
            let updated = Player::new(format!("Player{i}")).with_state("level", json!(i));
            c.update_player(&conn(&format!("c{i}")), "P", &encode(&updated))
                .await
        })
    });
    for outcome in join_all(updates).await {
        outcome.expect("task").expect("update");
    }

    let party = c.party("P").await.expect("fetch").expect("party");
    assert_eq!(party.len(), PLAYERS);
    for player in &party.players {
        let index: usize = player
            .name()
            .trim_start_matches("Player")
            .parse()
            .expect("numbered player");
        assert_eq!(player.state["level"], json!(index), "{} lost its update", player.name());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn companions_and_members_race_without_losses() {
    let c = shared();
    c.join(&conn("host"), "P", &player_payload("Host"))
        .await
        .expect("host joins");

    let members = (0..PLAYERS / 2).map(|i| {
        let c = Arc::clone(&c);
        tokio::spawn(async move {
            c.join(&conn(&format!("c{i}")), "P", &player_payload(&format!("Player{i}")))
                .await
        })
    });
    let companions = (0..PLAYERS / 2).map(|i| {
        let c = Arc::clone(&c);
        tokio::spawn(async move {
            c.generic_update_player(
                Player::new(format!("Minion{i}")).with_generic_host("Host"),
                "P",
            )
            .await
        })
    });
    let (joined, spawned) = tokio::join!(join_all(members), join_all(companions));
    for outcome in joined.into_iter().chain(spawned) {
        outcome.expect("task").expect("operation");
    }

    assert_eq!(
        c.party("P").await.expect("fetch").expect("party").len(),
        1 + PLAYERS
    );

    c.on_disconnect(&conn("host")).await.expect("host drops");

    let party = c.party("P").await.expect("fetch").expect("party");
    assert_eq!(party.len(), PLAYERS / 2);
    assert!(party.players.iter().all(|p| p.generic_host.is_none()));
}
