//! Authoritative collection of live matches.
//!
//! Each match sits behind its own lock so unrelated matches never contend. A second index
//! maps every seated player to their match: claiming a name there is the atomic step that
//! keeps a player in at most one match, and the claim is rolled back when the guarded
//! mutation fails. Persistence and notification run while the match lock is still held,
//! so the store and subscribers observe updates of a given match in order.

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{sync::RwLock, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::{MatchStore, StoreSlot},
        models::{MatchEntity, PlayerEntity},
        storage::{StorageError, StorageResult},
    },
    state::{
        board::{BoardError, CELL_COUNT},
        coin::CoinFlip,
        game::{Match, MatchError, MatchSnapshot, Player},
    },
};

/// Upper bound on a single store call made while a match lock is held.
pub const STORE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

type MatchHandle = RwLock<Option<Match>>;

/// Why a match disappeared from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    /// The last player left.
    Left,
    /// The sweeper reclaimed it.
    Expired,
}

/// Receives match changes once they are committed in memory. Delivery is best effort.
pub trait MatchNotifier: Send + Sync {
    /// A match changed; `audience` lists the players concerned.
    fn match_updated(&self, snapshot: &MatchSnapshot, audience: &[String]);
    /// A match was removed.
    fn match_deleted(&self, match_id: Uuid, reason: DeletionReason, audience: &[String]);
}

/// Result of a successful leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The match became empty and was removed.
    Deleted(Uuid),
    /// The match lives on with the remaining player.
    Updated(MatchSnapshot),
}

/// Result of a move that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The cell was free and the move was played.
    Applied(MatchSnapshot),
    /// The cell was already played; nothing changed.
    CellTaken,
}

/// Errors raised by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Unknown match identifier.
    #[error("match `{0}` not found")]
    MatchNotFound(Uuid),
    /// Position outside the board.
    #[error("cell {position} not found")]
    CellNotFound {
        /// Rejected position.
        position: usize,
    },
    /// The player already sits in a match.
    #[error("player `{player}` is already in match `{match_id}`")]
    AlreadyInAMatch {
        /// Player name.
        player: String,
        /// Match the player is seated in.
        match_id: Uuid,
    },
    /// Both slots are taken.
    #[error("match `{0}` is already full")]
    Full(Uuid),
    /// The player is not seated in any match.
    #[error("player `{0}` has no active match")]
    NotAParticipant(String),
    /// The player is seated elsewhere.
    #[error("player `{player}` is not in match `{match_id}`")]
    NotInMatch {
        /// Player name.
        player: String,
        /// Match that was targeted.
        match_id: Uuid,
    },
    /// The caller does not play in the targeted match.
    #[error("player `{player}` is not playing in match `{match_id}`")]
    Forbidden {
        /// Player name.
        player: String,
        /// Match that was targeted.
        match_id: Uuid,
    },
    /// The caller is not the turn holder.
    #[error("it is not `{player}`'s turn in match `{match_id}`")]
    WrongTurn {
        /// Player name.
        player: String,
        /// Match that was targeted.
        match_id: Uuid,
    },
    /// A persisted match could not be rebuilt.
    #[error("{0}")]
    InvalidRecord(String),
}

/// Live matches keyed by id, plus the seated-player index.
pub struct MatchRegistry {
    matches: DashMap<Uuid, Arc<MatchHandle>>,
    active_players: DashMap<String, Uuid>,
    coin: Arc<dyn CoinFlip>,
    store: StoreSlot,
    notifier: Arc<dyn MatchNotifier>,
}

impl MatchRegistry {
    /// Build an empty registry wired to its collaborators.
    pub fn new(
        coin: Arc<dyn CoinFlip>,
        store: StoreSlot,
        notifier: Arc<dyn MatchNotifier>,
    ) -> Self {
        Self {
            matches: DashMap::new(),
            active_players: DashMap::new(),
            coin,
            store,
            notifier,
        }
    }

    /// Open a new match seated with `name`.
    pub async fn create(&self, name: &str) -> Result<MatchSnapshot, RegistryError> {
        let id = Uuid::new_v4();
        self.claim(name, id)?;

        let player = self.resolve_player(name).await;
        let mut game = Match::new(id, OffsetDateTime::now_utc());
        if let Err(err) = game.join(player, self.coin.as_ref()) {
            self.release(name, id);
            return Err(match_error(id, err));
        }

        let snapshot = game.snapshot();
        let handle = Arc::new(RwLock::new(Some(game)));
        let _guard = handle.write().await;
        self.matches.insert(id, handle.clone());

        self.persist(&snapshot).await;
        self.persist_player(&snapshot, name).await;
        self.notifier.match_updated(&snapshot, &snapshot.participants());
        info!(match_id = %id, player = name, "match created");

        Ok(snapshot)
    }

    /// Seat `name` in match `id`.
    pub async fn join(&self, id: Uuid, name: &str) -> Result<MatchSnapshot, RegistryError> {
        let handle = self.handle(id)?;
        self.claim(name, id)?;

        let player = self.resolve_player(name).await;
        let mut guard = handle.write().await;
        let joined = match guard.as_mut() {
            None => Err(RegistryError::MatchNotFound(id)),
            Some(game) => game
                .join(player, self.coin.as_ref())
                .map(|_| game.snapshot())
                .map_err(|err| match_error(id, err)),
        };

        let snapshot = match joined {
            Ok(snapshot) => snapshot,
            Err(err) => {
                drop(guard);
                self.release(name, id);
                return Err(err);
            }
        };

        self.persist(&snapshot).await;
        self.persist_player(&snapshot, name).await;
        self.notifier.match_updated(&snapshot, &snapshot.participants());
        info!(match_id = %id, player = name, phase = ?snapshot.phase, "player joined match");

        Ok(snapshot)
    }

    /// Remove `name` from match `id`, deleting the match once nobody is left.
    pub async fn leave(&self, id: Uuid, name: &str) -> Result<LeaveOutcome, RegistryError> {
        let handle = self.handle(id)?;
        if !self.active_players.contains_key(name) {
            return Err(RegistryError::NotAParticipant(name.to_owned()));
        }

        let mut guard = handle.write().await;
        let Some(game) = guard.as_mut() else {
            return Err(RegistryError::MatchNotFound(id));
        };
        game.leave(name).map_err(|err| match_error(id, err))?;
        self.release(name, id);

        if game.is_empty() {
            guard.take();
            self.matches
                .remove_if(&id, |_, current| Arc::ptr_eq(current, &handle));
            self.with_store("remove_match", move |store| store.remove_match(id))
                .await;
            self.notifier
                .match_deleted(id, DeletionReason::Left, &[name.to_owned()]);
            info!(match_id = %id, player = name, "last player left; match deleted");
            return Ok(LeaveOutcome::Deleted(id));
        }

        let snapshot = game.snapshot();
        self.persist(&snapshot).await;
        let mut audience = snapshot.participants();
        audience.push(name.to_owned());
        self.notifier.match_updated(&snapshot, &audience);
        info!(match_id = %id, player = name, "player left match");

        Ok(LeaveOutcome::Updated(snapshot))
    }

    /// Play `position` in match `id` on behalf of `name`.
    pub async fn make_move(
        &self,
        id: Uuid,
        name: &str,
        position: usize,
    ) -> Result<MoveOutcome, RegistryError> {
        let handle = self.handle(id)?;
        if position >= CELL_COUNT {
            return Err(RegistryError::CellNotFound { position });
        }

        let mut guard = handle.write().await;
        let game = guard.as_mut().ok_or(RegistryError::MatchNotFound(id))?;
        if !game.is_participant(name) {
            return Err(RegistryError::Forbidden {
                player: name.to_owned(),
                match_id: id,
            });
        }

        if !game
            .make_move(name, position)
            .map_err(|err| match_error(id, err))?
        {
            debug!(match_id = %id, player = name, position, "cell already played");
            return Ok(MoveOutcome::CellTaken);
        }

        let snapshot = game.snapshot();
        self.persist(&snapshot).await;
        self.notifier.match_updated(&snapshot, &snapshot.participants());
        match &snapshot.winner {
            Some(winner) => info!(match_id = %id, winner = %winner.name, "match won"),
            None => debug!(match_id = %id, player = name, position, "move played"),
        }

        Ok(MoveOutcome::Applied(snapshot))
    }

    /// Snapshot of match `id`.
    pub async fn get(&self, id: Uuid) -> Result<MatchSnapshot, RegistryError> {
        let handle = self.handle(id)?;
        let guard = handle.read().await;
        guard
            .as_ref()
            .map(Match::snapshot)
            .ok_or(RegistryError::MatchNotFound(id))
    }

    /// Winner of match `id`, if decided.
    pub async fn winner(&self, id: Uuid) -> Result<Option<Player>, RegistryError> {
        let handle = self.handle(id)?;
        let guard = handle.read().await;
        let game = guard.as_ref().ok_or(RegistryError::MatchNotFound(id))?;
        Ok(game.winner().cloned())
    }

    /// Snapshots of every live match, oldest first.
    pub async fn list(&self) -> Vec<MatchSnapshot> {
        let mut snapshots = Vec::with_capacity(self.matches.len());
        for handle in self.handles() {
            if let Some(game) = handle.read().await.as_ref() {
                snapshots.push(game.snapshot());
            }
        }
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        snapshots
    }

    /// Number of live matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether no match is live.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Match the player is currently seated in.
    pub fn active_match_of(&self, name: &str) -> Option<Uuid> {
        self.active_players.get(name).map(|entry| *entry.value())
    }

    /// Remove every match created more than `max_age` ago.
    pub async fn sweep(&self, max_age: Duration) -> Vec<MatchSnapshot> {
        self.sweep_at(OffsetDateTime::now_utc(), max_age).await
    }

    /// Remove every match created before `now - max_age`, whatever its phase.
    pub async fn sweep_at(&self, now: OffsetDateTime, max_age: Duration) -> Vec<MatchSnapshot> {
        let Some(cutoff) = time::Duration::try_from(max_age)
            .ok()
            .and_then(|age| now.checked_sub(age))
        else {
            debug!(
                max_age_secs = max_age.as_secs(),
                "retention window predates every representable time; nothing to sweep"
            );
            return Vec::new();
        };
        let mut removed = Vec::new();

        for (id, handle) in self.entries() {
            let mut guard = handle.write().await;
            let expired = guard
                .as_ref()
                .is_some_and(|game| game.created_at() < cutoff);
            if !expired {
                continue;
            }
            let Some(game) = guard.take() else {
                continue;
            };

            let audience = game.participants();
            for name in &audience {
                self.release(name, id);
            }
            self.matches
                .remove_if(&id, |_, current| Arc::ptr_eq(current, &handle));

            self.with_store("remove_match", move |store| store.remove_match(id))
                .await;
            self.notifier
                .match_deleted(id, DeletionReason::Expired, &audience);
            debug!(match_id = %id, "stale match removed");

            removed.push(game.snapshot());
        }

        removed
    }

    /// Load persisted matches that are not live yet. Returns how many were restored.
    pub fn restore(&self, entities: Vec<MatchEntity>) -> usize {
        let mut restored = 0;
        for entity in entities {
            let id = entity.id;
            match self.restore_one(entity) {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(err) => warn!(match_id = %id, error = %err, "skipping persisted match"),
            }
        }
        restored
    }

    fn restore_one(&self, entity: MatchEntity) -> Result<bool, RegistryError> {
        let game = Match::try_from(entity).map_err(|err| match_error(Uuid::nil(), err))?;
        if game.is_empty() {
            return Ok(false);
        }

        let id = game.id();
        let Entry::Vacant(slot) = self.matches.entry(id) else {
            return Ok(false);
        };

        let participants = game.participants();
        for (index, name) in participants.iter().enumerate() {
            if let Err(err) = self.claim(name, id) {
                for claimed in &participants[..index] {
                    self.release(claimed, id);
                }
                return Err(err);
            }
        }

        slot.insert(Arc::new(RwLock::new(Some(game))));
        Ok(true)
    }

    fn handle(&self, id: Uuid) -> Result<Arc<MatchHandle>, RegistryError> {
        self.matches
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistryError::MatchNotFound(id))
    }

    fn handles(&self) -> Vec<Arc<MatchHandle>> {
        self.matches
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn entries(&self) -> Vec<(Uuid, Arc<MatchHandle>)> {
        self.matches
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    fn claim(&self, name: &str, id: Uuid) -> Result<(), RegistryError> {
        match self.active_players.entry(name.to_owned()) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyInAMatch {
                player: name.to_owned(),
                match_id: *entry.get(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(id);
                Ok(())
            }
        }
    }

    fn release(&self, name: &str, id: Uuid) {
        self.active_players
            .remove_if(name, |_, current| *current == id);
    }

    async fn resolve_player(&self, name: &str) -> Player {
        let lookup = name.to_owned();
        self.with_store("find_player_by_name", move |store| {
            store.find_player_by_name(lookup)
        })
        .await
        .flatten()
        .map(Player::from)
        .unwrap_or_else(|| Player::new(name))
    }

    async fn persist(&self, snapshot: &MatchSnapshot) {
        let entity = MatchEntity::from(snapshot.clone());
        self.with_store("save_match", move |store| store.save_match(entity))
            .await;
    }

    async fn persist_player(&self, snapshot: &MatchSnapshot, name: &str) {
        let Some(player) = [&snapshot.player1, &snapshot.player2]
            .into_iter()
            .flatten()
            .find(|player| player.name == name)
        else {
            return;
        };
        let entity = PlayerEntity::from(player.clone());
        self.with_store("save_player", move |store| store.save_player(entity))
            .await;
    }

    /// Run one store call, logging failures instead of surfacing them.
    async fn with_store<T>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&dyn MatchStore) -> BoxFuture<'static, StorageResult<T>>,
    ) -> Option<T> {
        let Some(store) = self.store.get().await else {
            debug!(operation, "no storage installed; skipping");
            return None;
        };

        let result = timeout(STORE_CALL_TIMEOUT, call(store.as_ref()))
            .await
            .unwrap_or_else(|_| {
                Err(StorageError::Timeout {
                    millis: STORE_CALL_TIMEOUT.as_millis(),
                })
            });

        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(operation, error = %err, "storage call failed; in-memory state kept");
                None
            }
        }
    }
}

fn match_error(id: Uuid, err: MatchError) -> RegistryError {
    match err {
        MatchError::AlreadyFull => RegistryError::Full(id),
        MatchError::NotInMatch(player) => RegistryError::NotInMatch {
            player,
            match_id: id,
        },
        MatchError::WrongTurn(player) => RegistryError::WrongTurn {
            player,
            match_id: id,
        },
        MatchError::Board(BoardError::InvalidPosition { position }) => {
            RegistryError::CellNotFound { position }
        }
        MatchError::InvalidRecord(reason) => RegistryError::InvalidRecord(reason),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        dao::match_store::InMemoryMatchStore,
        state::{
            board::Mark,
            coin::FixedCoin,
            game::MatchPhase,
        },
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Notice {
        Updated(Uuid, Vec<String>),
        Deleted(Uuid, DeletionReason, Vec<String>),
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl RecordingNotifier {
        fn take(&self) -> Vec<Notice> {
            std::mem::take(&mut *self.notices.lock().unwrap())
        }
    }

    impl MatchNotifier for RecordingNotifier {
        fn match_updated(&self, snapshot: &MatchSnapshot, audience: &[String]) {
            self.notices
                .lock()
                .unwrap()
                .push(Notice::Updated(snapshot.id, audience.to_vec()));
        }

        fn match_deleted(&self, match_id: Uuid, reason: DeletionReason, audience: &[String]) {
            self.notices
                .lock()
                .unwrap()
                .push(Notice::Deleted(match_id, reason, audience.to_vec()));
        }
    }

    struct Fixture {
        registry: Arc<MatchRegistry>,
        store: InMemoryMatchStore,
        notifier: Arc<RecordingNotifier>,
    }

    async fn fixture(coin: FixedCoin) -> Fixture {
        let store = InMemoryMatchStore::new();
        let slot = StoreSlot::default();
        slot.install(Arc::new(store.clone())).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = Arc::new(MatchRegistry::new(
            Arc::new(coin),
            slot,
            notifier.clone(),
        ));
        Fixture {
            registry,
            store,
            notifier,
        }
    }

    /// Store whose every call fails.
    struct BrokenStore;

    fn broken<T: Send + 'static>() -> BoxFuture<'static, StorageResult<T>> {
        Box::pin(async { Err(StorageError::Timeout { millis: 1 }) })
    }

    impl MatchStore for BrokenStore {
        fn save_match(&self, _game: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
        fn find_match(&self, _id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
            broken()
        }
        fn remove_match(&self, _id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            broken()
        }
        fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
            broken()
        }
        fn find_player_by_name(
            &self,
            _name: String,
        ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
            broken()
        }
        fn save_player(&self, _player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            broken()
        }
    }

    async fn broken_store_registry() -> (MatchRegistry, Arc<RecordingNotifier>) {
        let slot = StoreSlot::default();
        slot.install(Arc::new(BrokenStore)).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = MatchRegistry::new(
            Arc::new(FixedCoin::always(true)),
            slot,
            notifier.clone(),
        );
        (registry, notifier)
    }

    async fn started(fx: &Fixture) -> Uuid {
        let id = fx.registry.create("A").await.unwrap().id;
        fx.registry.join(id, "B").await.unwrap();
        id
    }

    #[tokio::test]
    async fn create_seats_the_player_and_persists() {
        let fx = fixture(FixedCoin::always(true)).await;
        let snapshot = fx.registry.create("A").await.unwrap();

        assert_eq!(snapshot.player1.as_ref().unwrap().name, "A");
        assert_eq!(snapshot.phase, MatchPhase::WaitingForOpponent);
        assert_eq!(fx.registry.active_match_of("A"), Some(snapshot.id));

        let stored = fx.store.find_match(snapshot.id).await.unwrap().unwrap();
        assert_eq!(stored, MatchEntity::from(snapshot.clone()));
        let player = fx.store.find_player_by_name("A".into()).await.unwrap();
        assert!(player.is_some());
        assert_eq!(
            fx.notifier.take(),
            vec![Notice::Updated(snapshot.id, vec!["A".into()])]
        );
    }

    #[tokio::test]
    async fn second_create_for_the_same_player_fails_and_keeps_the_first() {
        let fx = fixture(FixedCoin::always(true)).await;
        let first = fx.registry.create("A").await.unwrap();

        let err = fx.registry.create("A").await.unwrap_err();
        assert_eq!(
            err,
            RegistryError::AlreadyInAMatch {
                player: "A".into(),
                match_id: first.id
            }
        );

        let current = fx.registry.get(first.id).await.unwrap();
        assert_eq!(current.participants(), vec!["A".to_owned()]);
        assert!(current.winner.is_none());
        assert_eq!(fx.registry.len(), 1);
    }

    #[tokio::test]
    async fn join_errors() {
        let fx = fixture(FixedCoin::always(true)).await;
        let unknown = Uuid::new_v4();
        assert_eq!(
            fx.registry.join(unknown, "B").await,
            Err(RegistryError::MatchNotFound(unknown))
        );

        let id = started(&fx).await;
        let other = fx.registry.create("C").await.unwrap().id;

        assert!(matches!(
            fx.registry.join(other, "A").await,
            Err(RegistryError::AlreadyInAMatch { .. })
        ));

        let before = fx.registry.get(id).await.unwrap();
        fx.registry.leave(other, "C").await.unwrap();
        assert_eq!(fx.registry.join(id, "C").await, Err(RegistryError::Full(id)));
        assert_eq!(fx.registry.get(id).await.unwrap(), before);
        assert_eq!(fx.registry.active_match_of("C"), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_by_one_player_admit_a_single_seat() {
        let fx = fixture(FixedCoin::new([true, false])).await;
        let mut ids = Vec::new();
        for host in ["h1", "h2", "h3", "h4", "h5", "h6"] {
            ids.push(fx.registry.create(host).await.unwrap().id);
        }

        let tasks: Vec<_> = ids
            .iter()
            .map(|id| {
                let registry = fx.registry.clone();
                let id = *id;
                tokio::spawn(async move { registry.join(id, "racer").await })
            })
            .collect();

        let mut seated = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => seated += 1,
                Err(RegistryError::AlreadyInAMatch { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(seated, 1);

        let mut occupied = 0;
        for snapshot in fx.registry.list().await {
            if snapshot.participants().contains(&"racer".to_owned()) {
                occupied += 1;
            }
        }
        assert_eq!(occupied, 1);
    }

    #[tokio::test]
    async fn leave_errors() {
        let fx = fixture(FixedCoin::always(true)).await;
        let id = started(&fx).await;
        let other = fx.registry.create("C").await.unwrap().id;

        assert_eq!(
            fx.registry.leave(id, "nobody").await,
            Err(RegistryError::NotAParticipant("nobody".into()))
        );
        assert_eq!(
            fx.registry.leave(id, "C").await,
            Err(RegistryError::NotInMatch {
                player: "C".into(),
                match_id: id
            })
        );
        let unknown = Uuid::new_v4();
        assert_eq!(
            fx.registry.leave(unknown, "A").await,
            Err(RegistryError::MatchNotFound(unknown))
        );
        assert!(fx.registry.get(other).await.is_ok());
    }

    #[tokio::test]
    async fn leaving_one_of_two_keeps_the_match() {
        let fx = fixture(FixedCoin::always(true)).await;
        let id = started(&fx).await;
        fx.registry.make_move(id, "A", 4).await.unwrap();
        fx.notifier.take();

        let outcome = fx.registry.leave(id, "A").await.unwrap();
        let LeaveOutcome::Updated(snapshot) = outcome else {
            panic!("match should survive");
        };
        assert_eq!(snapshot.player1.as_ref().unwrap().name, "B");
        assert!(snapshot.player_turn.is_none());
        assert!(snapshot.cells.iter().all(|cell| cell.mark == Mark::Empty));
        assert_eq!(fx.registry.active_match_of("A"), None);
        assert_eq!(
            fx.notifier.take(),
            vec![Notice::Updated(id, vec!["B".into(), "A".into()])]
        );

        // A is free to start elsewhere.
        assert!(fx.registry.create("A").await.is_ok());
    }

    #[tokio::test]
    async fn last_player_leaving_deletes_the_match() {
        let fx = fixture(FixedCoin::always(true)).await;
        let id = fx.registry.create("A").await.unwrap().id;
        fx.notifier.take();

        assert_eq!(
            fx.registry.leave(id, "A").await,
            Ok(LeaveOutcome::Deleted(id))
        );
        assert_eq!(
            fx.registry.get(id).await,
            Err(RegistryError::MatchNotFound(id))
        );
        assert!(fx.store.find_match(id).await.unwrap().is_none());
        assert_eq!(
            fx.notifier.take(),
            vec![Notice::Deleted(id, DeletionReason::Left, vec!["A".into()])]
        );
    }

    #[tokio::test]
    async fn move_errors() {
        let fx = fixture(FixedCoin::always(true)).await;
        let id = started(&fx).await;
        fx.registry.create("C").await.unwrap();
        let unknown = Uuid::new_v4();

        assert_eq!(
            fx.registry.make_move(unknown, "A", 0).await,
            Err(RegistryError::MatchNotFound(unknown))
        );
        assert_eq!(
            fx.registry.make_move(id, "A", 9).await,
            Err(RegistryError::CellNotFound { position: 9 })
        );
        assert_eq!(
            fx.registry.make_move(id, "C", 0).await,
            Err(RegistryError::Forbidden {
                player: "C".into(),
                match_id: id
            })
        );
        assert_eq!(
            fx.registry.make_move(id, "B", 0).await,
            Err(RegistryError::WrongTurn {
                player: "B".into(),
                match_id: id
            })
        );
        let snapshot = fx.registry.get(id).await.unwrap();
        assert!(snapshot.cells.iter().all(|cell| cell.mark == Mark::Empty));
    }

    #[tokio::test]
    async fn replaying_a_cell_changes_nothing() {
        let fx = fixture(FixedCoin::always(true)).await;
        let id = started(&fx).await;
        fx.registry.make_move(id, "A", 0).await.unwrap();
        let before = fx.registry.get(id).await.unwrap();
        let stored_before = fx.store.find_match(id).await.unwrap();
        fx.notifier.take();

        assert_eq!(
            fx.registry.make_move(id, "B", 0).await,
            Ok(MoveOutcome::CellTaken)
        );
        assert_eq!(fx.registry.get(id).await.unwrap(), before);
        assert_eq!(fx.store.find_match(id).await.unwrap(), stored_before);
        assert!(fx.notifier.take().is_empty());
    }

    #[tokio::test]
    async fn line_of_three_wins_the_match() {
        // A holds X, B moves first.
        let fx = fixture(FixedCoin::new([true, false])).await;
        let id = started(&fx).await;

        for (name, position) in [("B", 3), ("A", 0), ("B", 5), ("A", 1), ("B", 7), ("A", 2)] {
            let outcome = fx.registry.make_move(id, name, position).await.unwrap();
            assert!(matches!(outcome, MoveOutcome::Applied(_)));
        }

        let winner = fx.registry.winner(id).await.unwrap().unwrap();
        assert_eq!(winner.name, "A");
        let stored = fx.store.find_match(id).await.unwrap().unwrap();
        assert_eq!(stored.winner.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn sweep_removes_stale_matches_mid_game() {
        let fx = fixture(FixedCoin::always(true)).await;
        let id = started(&fx).await;
        fx.registry.make_move(id, "A", 4).await.unwrap();
        fx.notifier.take();

        let now = OffsetDateTime::now_utc();
        let ten_minutes = Duration::from_secs(600);
        assert!(
            fx.registry
                .sweep_at(now + Duration::from_secs(300), ten_minutes)
                .await
                .is_empty()
        );

        let removed = fx
            .registry
            .sweep_at(now + Duration::from_secs(660), ten_minutes)
            .await;
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, id);
        assert_eq!(removed[0].phase, MatchPhase::InProgress);

        assert!(fx.registry.is_empty());
        assert_eq!(fx.registry.active_match_of("A"), None);
        assert_eq!(fx.registry.active_match_of("B"), None);
        assert!(fx.store.find_match(id).await.unwrap().is_none());
        assert_eq!(
            fx.notifier.take(),
            vec![Notice::Deleted(
                id,
                DeletionReason::Expired,
                vec!["A".into(), "B".into()]
            )]
        );
    }

    #[tokio::test]
    async fn sweep_with_an_unrepresentable_window_removes_nothing() {
        let fx = fixture(FixedCoin::always(true)).await;
        let id = fx.registry.create("A").await.unwrap().id;

        assert!(
            fx.registry
                .sweep(Duration::from_secs(1_000_000_000_000))
                .await
                .is_empty()
        );
        assert!(fx.registry.sweep(Duration::MAX).await.is_empty());
        assert_eq!(fx.registry.active_match_of("A"), Some(id));
        assert_eq!(fx.registry.len(), 1);
    }

    #[tokio::test]
    async fn failing_store_calls_keep_committed_changes() {
        let (registry, notifier) = broken_store_registry().await;
        let id = registry.create("A").await.unwrap().id;
        registry.join(id, "B").await.unwrap();

        let MoveOutcome::Applied(snapshot) = registry.make_move(id, "A", 0).await.unwrap() else {
            panic!("cell 0 was free");
        };
        assert_eq!(snapshot.cells[0].mark, Mark::X);
        assert_eq!(registry.get(id).await.unwrap(), snapshot);
        assert_eq!(notifier.take().len(), 3);

        let LeaveOutcome::Updated(after_leave) = registry.leave(id, "A").await.unwrap() else {
            panic!("B is still seated");
        };
        assert_eq!(after_leave.participants(), vec!["B".to_owned()]);
        assert_eq!(registry.active_match_of("A"), None);
    }

    #[tokio::test]
    async fn failed_removals_do_not_stop_the_sweep() {
        let (registry, notifier) = broken_store_registry().await;
        let first = registry.create("A").await.unwrap().id;
        let second = registry.create("C").await.unwrap().id;
        notifier.take();

        let later = OffsetDateTime::now_utc() + Duration::from_secs(660);
        let removed = registry.sweep_at(later, Duration::from_secs(600)).await;

        let mut ids: Vec<Uuid> = removed.iter().map(|snapshot| snapshot.id).collect();
        ids.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(ids, expected);
        assert!(registry.is_empty());
        assert_eq!(registry.active_match_of("A"), None);
        assert_eq!(registry.active_match_of("C"), None);
        assert_eq!(notifier.take().len(), 2);
    }

    #[tokio::test]
    async fn listing_twice_without_changes_is_identical() {
        let fx = fixture(FixedCoin::always(true)).await;
        started(&fx).await;
        fx.registry.create("C").await.unwrap();

        let first = fx.registry.list().await;
        let second = fx.registry.list().await;
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn operations_work_without_a_store() {
        let registry = MatchRegistry::new(
            Arc::new(FixedCoin::always(true)),
            StoreSlot::default(),
            Arc::new(RecordingNotifier::default()),
        );
        let id = registry.create("A").await.unwrap().id;
        registry.join(id, "B").await.unwrap();
        assert!(matches!(
            registry.make_move(id, "A", 0).await,
            Ok(MoveOutcome::Applied(_))
        ));
    }

    #[tokio::test]
    async fn restore_rebuilds_matches_and_player_index() {
        let fx = fixture(FixedCoin::always(true)).await;
        let id = started(&fx).await;
        fx.registry.make_move(id, "A", 8).await.unwrap();
        let expected = fx.registry.get(id).await.unwrap();

        let fresh = fixture(FixedCoin::always(true)).await;
        let entities = fx.store.list_matches().await.unwrap();
        assert_eq!(fresh.registry.restore(entities.clone()), 1);
        assert_eq!(fresh.registry.restore(entities), 0);

        assert_eq!(fresh.registry.get(id).await.unwrap(), expected);
        assert_eq!(fresh.registry.active_match_of("B"), Some(id));
        assert!(matches!(
            fresh.registry.create("B").await,
            Err(RegistryError::AlreadyInAMatch { .. })
        ));
    }
}
