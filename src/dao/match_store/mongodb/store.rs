use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoMatchDocument, MongoPlayerDocument, doc_id},
};
use crate::dao::{
    match_store::MatchStore,
    models::{MatchEntity, PlayerEntity},
    storage::StorageResult,
};

const MATCH_COLLECTION_NAME: &str = "matches";
const PLAYER_COLLECTION_NAME: &str = "players";

/// MongoDB-backed [`MatchStore`].
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive alongside the database handle.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("match_created_at_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "created_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection(&self) -> Collection<MongoMatchDocument> {
        self.database()
            .await
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn player_collection(&self) -> Collection<MongoPlayerDocument> {
        self.database()
            .await
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn save_match(&self, game: MatchEntity) -> MongoResult<()> {
        let id = game.id;
        let document: MongoMatchDocument = game.into();
        self.collection()
            .await
            .replace_one(doc_id(id.to_string()), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;

        Ok(())
    }

    async fn find_match(&self, id: Uuid) -> MongoResult<Option<MatchEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc_id(id.to_string()))
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?;

        Ok(document.and_then(|document| match MatchEntity::try_from(document) {
            Ok(entity) => Some(entity),
            Err(err) => {
                warn!(match_id = %id, error = %err, "skipping malformed match document");
                None
            }
        }))
    }

    async fn remove_match(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(doc_id(id.to_string()))
            .await
            .map_err(|source| MongoDaoError::RemoveMatch { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_matches(&self) -> MongoResult<Vec<MatchEntity>> {
        let documents: Vec<MongoMatchDocument> = self
            .collection()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?;

        Ok(documents
            .into_iter()
            .filter_map(|document| match MatchEntity::try_from(document) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(error = %err, "skipping malformed match document");
                    None
                }
            })
            .collect())
    }

    async fn find_player(&self, name: String) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .player_collection()
            .await
            .find_one(doc_id(name.clone()))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { name, source })?;
        Ok(document.map(Into::into))
    }

    async fn save_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let name = player.name.clone();
        let document: MongoPlayerDocument = player.into();
        self.player_collection()
            .await
            .replace_one(doc_id(name.clone()), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer { name, source })?;
        Ok(())
    }
}

impl MatchStore for MongoMatchStore {
    fn save_match(&self, game: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_match(game).await.map_err(Into::into) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await.map_err(Into::into) })
    }

    fn remove_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.remove_match(id).await.map_err(Into::into) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches().await.map_err(Into::into) })
    }

    fn find_player_by_name(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(name).await.map_err(Into::into) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_player(player).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
