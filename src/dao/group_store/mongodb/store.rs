use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoGroupDocument, MongoGroupIdDocument, doc_id},
};
use crate::dao::{group_store::GroupStore, models::GroupEntity, storage::StorageResult};

const GROUP_COLLECTION_NAME: &str = "groups";

/// MongoDB-backed [`GroupStore`] keeping one document per chat group.
#[derive(Clone)]
pub struct MongoGroupStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
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

impl MongoGroupStore {
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
            .keys(doc! {"streak": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("group_streak_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GROUP_COLLECTION_NAME,
                index: "streak",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection(&self) -> Collection<MongoGroupDocument> {
        self.database()
            .await
            .collection::<MongoGroupDocument>(GROUP_COLLECTION_NAME)
    }

    async fn save_group(&self, group: GroupEntity) -> MongoResult<()> {
        let chat_id = group.chat_id;
        let document: MongoGroupDocument = group.into();
        let collection = self.collection().await;
        collection
            .replace_one(doc_id(chat_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGroup { chat_id, source })?;

        Ok(())
    }

    async fn load_group(&self, chat_id: i64) -> MongoResult<Option<GroupEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc_id(chat_id))
            .await
            .map_err(|source| MongoDaoError::LoadGroup { chat_id, source })?;

        Ok(document.map(Into::into))
    }

    async fn list_group_ids(&self) -> MongoResult<Vec<i64>> {
        let collection = self
            .database()
            .await
            .collection::<MongoGroupIdDocument>(GROUP_COLLECTION_NAME);

        let documents: Vec<MongoGroupIdDocument> = collection
            .find(doc! {})
            .projection(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListGroups { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGroups { source })?;

        Ok(documents.into_iter().map(|doc| doc.chat_id).collect())
    }
}

impl GroupStore for MongoGroupStore {
    fn load_group(&self, chat_id: i64) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_group(chat_id).await.map_err(Into::into) })
    }

    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_group(group).await.map_err(Into::into) })
    }

    fn list_group_ids(&self) -> BoxFuture<'static, StorageResult<Vec<i64>>> {
        let store = self.clone();
        Box::pin(async move { store.list_group_ids().await.map_err(Into::into) })
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
