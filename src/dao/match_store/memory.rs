use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    match_store::MatchStore,
    models::{MatchEntity, PlayerEntity},
    storage::StorageResult,
};

/// Process-local store used when no database is configured, and by tests.
#[derive(Clone, Default)]
pub struct InMemoryMatchStore {
    matches: Arc<RwLock<IndexMap<Uuid, MatchEntity>>>,
    players: Arc<DashMap<String, PlayerEntity>>,
}

impl InMemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchStore for InMemoryMatchStore {
    fn save_match(&self, game: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let matches = self.matches.clone();
        Box::pin(async move {
            matches.write().await.insert(game.id, game);
            Ok(())
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let matches = self.matches.clone();
        Box::pin(async move { Ok(matches.read().await.get(&id).cloned()) })
    }

    fn remove_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let matches = self.matches.clone();
        Box::pin(async move { Ok(matches.write().await.shift_remove(&id).is_some()) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let matches = self.matches.clone();
        Box::pin(async move { Ok(matches.read().await.values().cloned().collect()) })
    }

    fn find_player_by_name(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let players = self.players.clone();
        Box::pin(async move { Ok(players.get(&name).map(|entry| entry.value().clone())) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let players = self.players.clone();
        Box::pin(async move {
            players.insert(player.name.clone(), player);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::MarkEntity;

    fn entity(id: Uuid) -> MatchEntity {
        MatchEntity {
            id,
            player1: None,
            player2: None,
            player_turn: None,
            winner: None,
            is_empty: true,
            created_at: SystemTime::now(),
            cells: Vec::new(),
        }
    }

    #[tokio::test]
    async fn keeps_insertion_order_across_updates_and_removals() {
        let store = InMemoryMatchStore::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for id in [a, b, c] {
            store.save_match(entity(id)).await.unwrap();
        }
        store.save_match(entity(a)).await.unwrap();
        assert!(store.remove_match(b).await.unwrap());
        assert!(!store.remove_match(b).await.unwrap());

        let ids: Vec<Uuid> = store
            .list_matches()
            .await
            .unwrap()
            .into_iter()
            .map(|game| game.id)
            .collect();
        assert_eq!(ids, vec![a, c]);
        assert!(store.find_match(b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn players_are_found_by_name() {
        let store = InMemoryMatchStore::new();
        store
            .save_player(PlayerEntity {
                name: "alice".into(),
                mark: MarkEntity::X,
            })
            .await
            .unwrap();

        let found = store.find_player_by_name("alice".into()).await.unwrap();
        assert_eq!(found.map(|player| player.mark), Some(MarkEntity::X));
        assert!(store.find_player_by_name("bob".into()).await.unwrap().is_none());
    }
}
