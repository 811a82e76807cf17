//! # Local Party Example
//!
//! Runs the party engine entirely in-process:
//!
//! 1. Build a coordinator over the in-memory store and local transport
//! 2. Start a session per connection
//! 3. Alice and Bob join a party, Alice summons a companion
//! 4. Alice drops off and takes the companion with her
//!
//! ## Running
//!
//! ```sh
//! cargo run --example local_party
//!
//! # Verbose engine logs:
//! RUST_LOG=party_sync=debug cargo run --example local_party
//! ```

use std::sync::Arc;
use std::time::Duration;

use party_sync::codec::PayloadCodec;
use party_sync::{
    ConnectionSession, CoordinatorConfig, InboundEvent, LocalGroupTransport, MemoryPartyStore,
    Notification, Player, SessionCoordinator,
};
use tokio::sync::mpsc;

const PARTY: &str = "the-coast";

/// Print everything that arrived in `inbox` so far.
async fn show(who: &str, inbox: &mut mpsc::Receiver<Notification>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok(note) = inbox.try_recv() {
        tracing::info!("{who} <- {}", note.kind());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Engine ──────────────────────────────────────────────────────
    let config = CoordinatorConfig::new().with_store_timeout(Duration::from_secs(1));
    let coordinator = Arc::new(SessionCoordinator::with_parts(
        MemoryPartyStore::new(),
        LocalGroupTransport::new(),
        party_sync::Base64Codec,
        config,
    ));

    let (alice, mut alice_inbox) = coordinator.transport().connect();
    let (bob, mut bob_inbox) = coordinator.transport().connect();
    let mut alice_session = ConnectionSession::start(Arc::clone(&coordinator), alice);
    let mut bob_session = ConnectionSession::start(Arc::clone(&coordinator), bob);

    // ── Join ────────────────────────────────────────────────────────
    let codec = coordinator.codec();
    alice_session.submit(InboundEvent::Join {
        party_name: PARTY.into(),
        player: codec.encode_player(&Player::new("Alice").with_state("level", 92.into()))?,
    })?;
    show("alice", &mut alice_inbox).await;

    bob_session.submit(InboundEvent::Join {
        party_name: PARTY.into(),
        player: codec.encode_player(&Player::new("Bob"))?,
    })?;
    show("bob", &mut bob_inbox).await;
    show("alice", &mut alice_inbox).await;

    // ── Companion ───────────────────────────────────────────────────
    alice_session.submit(InboundEvent::GenericUpdatePlayer {
        player: Player::new("Golem").with_generic_host("Alice"),
        party_name: PARTY.into(),
    })?;
    show("bob", &mut bob_inbox).await;

    if let Some(party) = coordinator.party(PARTY).await? {
        let names: Vec<_> = party.players.iter().map(Player::name).collect();
        tracing::info!("{PARTY}: {names:?}");
    }

    // ── Disconnect ──────────────────────────────────────────────────
    alice_session.close().await;
    show("bob", &mut bob_inbox).await;

    if let Some(party) = coordinator.party(PARTY).await? {
        let names: Vec<_> = party.players.iter().map(Player::name).collect();
        tracing::info!("{PARTY} after Alice dropped: {names:?}");
    }

    bob_session.close().await;
    tracing::info!(
        "party exists after everyone left: {}",
        coordinator.party(PARTY).await?.is_some()
    );
    Ok(())
}
