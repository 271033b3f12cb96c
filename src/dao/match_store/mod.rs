pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::models::{MatchEntity, PlayerEntity};
use crate::dao::storage::StorageResult;

pub use self::memory::InMemoryMatchStore;

/// Abstraction over the persistence layer for matches and players.
pub trait MatchStore: Send + Sync {
    fn save_match(&self, game: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn remove_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    fn find_player_by_name(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Shared, swappable handle to the installed store. Empty while degraded.
#[derive(Clone, Default)]
pub struct StoreSlot {
    inner: Arc<RwLock<Option<Arc<dyn MatchStore>>>>,
}

impl StoreSlot {
    /// Current store, if one is installed.
    pub async fn get(&self) -> Option<Arc<dyn MatchStore>> {
        self.inner.read().await.as_ref().cloned()
    }

    /// Install `store`, replacing any previous one.
    pub async fn install(&self, store: Arc<dyn MatchStore>) {
        *self.inner.write().await = Some(store);
    }

    /// Drop the current store.
    pub async fn clear(&self) {
        self.inner.write().await.take();
    }
}
