use std::{sync::Arc, time::Duration};

use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::broadcast;

use tictactoe_back::{
    config::AppConfig,
    dao::match_store::{InMemoryMatchStore, MatchStore},
    dto::sse::ServerEvent,
    services::sse_events::{EVENT_MATCH_DELETED, EVENT_MATCH_UPDATED},
    state::{
        AppState, SharedState,
        board::Mark,
        coin::FixedCoin,
        game::MatchPhase,
        registry::{MoveOutcome, RegistryError},
    },
};

async fn state_with_store(coin: FixedCoin) -> (SharedState, InMemoryMatchStore) {
    let state = AppState::with_coin(AppConfig::default(), Arc::new(coin));
    let store = InMemoryMatchStore::new();
    state.set_game_store(Arc::new(store.clone())).await;
    (state, store)
}

fn drain(receiver: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn every_committed_change_reaches_store_and_subscribers() {
    let (state, store) = state_with_store(FixedCoin::always(true)).await;
    let mut events = state.public_sse().subscribe();
    let registry = state.registry();

    let id = registry.create("A").await.unwrap().id;
    registry.join(id, "B").await.unwrap();
    let MoveOutcome::Applied(after_move) = registry.make_move(id, "A", 4).await.unwrap() else {
        panic!("cell 4 was free");
    };

    let stored = store.find_match(id).await.unwrap().unwrap();
    assert_eq!(stored.cells.len(), 9);
    assert_eq!(stored.player_turn.as_deref(), Some("B"));
    assert_eq!(after_move.cells[4].mark, Mark::X);

    let stored_player = store
        .find_player_by_name("B".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_player.name, "B");

    let received = drain(&mut events);
    assert_eq!(received.len(), 3);
    assert!(
        received
            .iter()
            .all(|event| event.event.as_deref() == Some(EVENT_MATCH_UPDATED))
    );
    assert_eq!(received[0].audience, vec!["A".to_owned()]);
    assert_eq!(received[2].audience, vec!["A".to_owned(), "B".to_owned()]);

    let last: Value = serde_json::from_str(&received[2].data).unwrap();
    assert_eq!(last["cells"][4]["mark"], "x");
    assert_eq!(last["player_turn"]["name"], "B");
}

#[tokio::test]
async fn a_rejected_create_leaves_the_existing_match_untouched() {
    let (state, store) = state_with_store(FixedCoin::always(true)).await;
    let registry = state.registry();
    let first = registry.create("A").await.unwrap();

    assert!(matches!(
        registry.create("A").await,
        Err(RegistryError::AlreadyInAMatch { match_id, .. }) if match_id == first.id
    ));
    assert_eq!(registry.get(first.id).await.unwrap(), first);
    assert_eq!(store.list_matches().await.unwrap().len(), 1);
}

#[tokio::test]
async fn draws_stop_the_game() {
    // A holds X and opens.
    let (state, _) = state_with_store(FixedCoin::always(true)).await;
    let registry = state.registry();
    let id = registry.create("A").await.unwrap().id;
    registry.join(id, "B").await.unwrap();

    // X O X / X O O / O X X
    for (player, position) in [
        ("A", 0),
        ("B", 1),
        ("A", 2),
        ("B", 4),
        ("A", 3),
        ("B", 5),
        ("A", 7),
        ("B", 6),
        ("A", 8),
    ] {
        registry.make_move(id, player, position).await.unwrap();
    }

    let snapshot = registry.get(id).await.unwrap();
    assert_eq!(snapshot.phase, MatchPhase::Draw);
    assert!(snapshot.winner.is_none());
    assert!(registry.winner(id).await.unwrap().is_none());
    assert!(matches!(
        registry.make_move(id, "B", 0).await,
        Err(RegistryError::WrongTurn { .. })
    ));
}

#[tokio::test]
async fn sweeping_reclaims_mid_game_matches_everywhere() {
    let (state, store) = state_with_store(FixedCoin::always(true)).await;
    let registry = state.registry();
    let id = registry.create("A").await.unwrap().id;
    registry.join(id, "B").await.unwrap();
    registry.make_move(id, "A", 0).await.unwrap();
    let mut player_events = state.public_sse().subscribe();

    let later = OffsetDateTime::now_utc() + Duration::from_secs(11 * 60);
    let removed = registry.sweep_at(later, Duration::from_secs(10 * 60)).await;

    assert_eq!(removed.len(), 1);
    assert!(registry.is_empty());
    assert!(registry.list().await.is_empty());
    assert!(store.find_match(id).await.unwrap().is_none());

    let deleted = drain(&mut player_events);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].event.as_deref(), Some(EVENT_MATCH_DELETED));
    assert!(deleted[0].concerns("A") && deleted[0].concerns("B"));
    let payload: Value = serde_json::from_str(&deleted[0].data).unwrap();
    assert_eq!(payload["reason"], "expired");

    // Both players may start over.
    assert!(registry.create("A").await.is_ok());
    assert!(registry.create("B").await.is_ok());
}

#[tokio::test]
async fn degraded_mode_keeps_matches_playable() {
    let (state, store) = state_with_store(FixedCoin::always(true)).await;
    let registry = state.registry();
    let id = registry.create("A").await.unwrap().id;

    state.clear_game_store().await;
    assert!(state.is_degraded());

    registry.join(id, "B").await.unwrap();
    registry.make_move(id, "A", 0).await.unwrap();

    let live = registry.get(id).await.unwrap();
    assert_eq!(live.participants(), vec!["A".to_owned(), "B".to_owned()]);
    let stale = store.find_match(id).await.unwrap().unwrap();
    assert!(stale.player2.is_none());
}
