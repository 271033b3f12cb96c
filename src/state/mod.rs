pub mod board;
pub mod coin;
pub mod game;
pub mod registry;
mod sse;

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    config::AppConfig,
    dao::match_store::{MatchStore, StoreSlot},
    services::sse_events::{self, SseNotifier},
    state::{
        coin::{CoinFlip, RandomCoin, SeededCoin},
        registry::MatchRegistry,
    },
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

/// Central application state: the live matches, the optional store and the event hub.
pub struct AppState {
    config: AppConfig,
    store: StoreSlot,
    registry: MatchRegistry,
    sse: SseHub,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let coin: Arc<dyn CoinFlip> = match config.coin_seed {
            Some(seed) => Arc::new(SeededCoin::new(seed)),
            None => Arc::new(RandomCoin),
        };
        Self::with_coin(config, coin)
    }

    /// Same as [`AppState::new`] with an explicit random source for seat and turn draws.
    pub fn with_coin(config: AppConfig, coin: Arc<dyn CoinFlip>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let sse = SseHub::new(config.sse_channel_capacity);
        let store = StoreSlot::default();
        let registry = MatchRegistry::new(
            coin,
            store.clone(),
            Arc::new(SseNotifier::new(sse.clone())),
        );

        Arc::new(Self {
            config,
            store,
            registry,
            sse,
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The authoritative set of live matches.
    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn MatchStore>> {
        self.store.get().await
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn MatchStore>) {
        self.store.install(store).await;
        self.update_degraded(false);
    }

    /// Remove the current match store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        self.store.clear().await;
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Flip the degraded flag, announcing the change on the public stream.
    pub fn update_degraded(&self, degraded: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            let changed = *current != degraded;
            *current = degraded;
            changed
        });
        if changed {
            sse_events::broadcast_system_status(&self.sse, degraded);
        }
    }

    /// Broadcast hub feeding every SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }
}
