use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::bson::{DateTime, Document, doc};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use tokio::sync::RwLock;

use super::config::MongoConfig;
use super::error::{MongoDaoError, MongoResult};
use super::models::{MongoPlayerDocument, MongoRaceDocument, MongoTextDocument, status_str};
use crate::dao::models::{PlayerEntity, RaceEntity, RaceStatus, TextEntity};
use crate::dao::row_store::{
    PlayerRepository, RaceRepository, RaceTransition, RowStore, StartTimeUpdate, TextRepository,
    TransitionOutcome,
};
use crate::dao::storage::StorageResult;

const PLAYER_COLLECTION_NAME: &str = "players";
const RACE_COLLECTION_NAME: &str = "races";
const TEXT_COLLECTION_NAME: &str = "texts";

/// MongoDB-backed row store. Roster appends use `$push`, place claims use
/// `$inc`, and lifecycle transitions are filtered `findOneAndUpdate` calls,
/// so every operation the traits describe as atomic is a single server-side
/// document update.
#[derive(Clone)]
pub struct MongoRowStore {
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
        let (client, database) = self.config.open().await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRowStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = config.open().await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Retention sweeps filter on created_at for both ephemeral tables.
        for collection_name in [PLAYER_COLLECTION_NAME, RACE_COLLECTION_NAME] {
            let collection = database.collection::<Document>(collection_name);
            let index = IndexModel::builder()
                .keys(doc! {"created_at": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some("created_at_idx".to_owned()))
                        .build(),
                )
                .build();

            collection
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: "created_at",
                    source,
                })?;
        }

        // Matchmaking scans public races by host/status/start_time.
        let races = database.collection::<Document>(RACE_COLLECTION_NAME);
        let index = IndexModel::builder()
            .keys(doc! {"host": 1, "status": 1, "start_time": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("open_race_idx".to_owned()))
                    .build(),
            )
            .build();

        races
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RACE_COLLECTION_NAME,
                index: "host,status,start_time",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn races(&self) -> Collection<MongoRaceDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRaceDocument>(RACE_COLLECTION_NAME)
    }

    async fn texts(&self) -> Collection<MongoTextDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoTextDocument>(TEXT_COLLECTION_NAME)
    }

    async fn update_player_row(
        &self,
        id: String,
        update: Document,
    ) -> MongoResult<Option<PlayerEntity>> {
        let collection = self.players().await;
        let updated = collection
            .find_one_and_update(doc! {"_id": &id}, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::WritePlayer { id, source })?;
        Ok(updated.map(Into::into))
    }

    async fn find_race_row(&self, id: String) -> MongoResult<Option<RaceEntity>> {
        let collection = self.races().await;
        let document = collection
            .find_one(doc! {"_id": &id})
            .await
            .map_err(|source| MongoDaoError::LoadRace { id, source })?;
        Ok(document.map(Into::into))
    }
}

impl PlayerRepository for MongoRowStore {
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = player.id.clone();
            let document: MongoPlayerDocument = player.into();
            let collection = store.players().await;
            collection
                .insert_one(&document)
                .await
                .map_err(|source| MongoDaoError::WritePlayer { id, source })?;
            Ok(())
        })
    }

    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.players().await;
            let document = collection
                .find_one(doc! {"_id": &id})
                .await
                .map_err(|source| MongoDaoError::LoadPlayer { id, source })?;
            Ok(document.map(Into::into))
        })
    }

    fn touch_player(
        &self,
        id: String,
        seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let update =
                doc! {"$set": {"last_seen": DateTime::from_system_time(seen_at)}};
            store.update_player_row(id, update).await.map_err(Into::into)
        })
    }

    fn set_player_race(
        &self,
        id: String,
        race_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let update = match race_id {
                Some(race_id) => doc! {"$set": {"race_id": race_id}},
                None => doc! {"$set": {"race_id": null}},
            };
            store.update_player_row(id, update).await.map_err(Into::into)
        })
    }

    fn update_player_stats(
        &self,
        id: String,
        wpm: u32,
        progress: f64,
        place: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut fields = doc! {"wpm": wpm as i64, "progress": progress};
            if let Some(place) = place {
                fields.insert("place", place as i64);
            }
            store
                .update_player_row(id, doc! {"$set": fields})
                .await
                .map_err(Into::into)
        })
    }

    fn delete_player(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.players().await;
            let result = collection
                .delete_one(doc! {"_id": &id})
                .await
                .map_err(|source| MongoDaoError::WritePlayer { id, source })?;
            Ok(result.deleted_count > 0)
        })
    }

    fn delete_players_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.players().await;
            let result = collection
                .delete_many(
                    doc! {"created_at": {"$lt": DateTime::from_system_time(cutoff)}},
                )
                .await
                .map_err(|source| MongoDaoError::Sweep {
                    collection: PLAYER_COLLECTION_NAME,
                    source,
                })?;
            Ok(result.deleted_count)
        })
    }
}

impl RaceRepository for MongoRowStore {
    fn insert_race(&self, race: RaceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = race.id.clone();
            let document: MongoRaceDocument = race.into();
            let collection = store.races().await;
            collection
                .insert_one(&document)
                .await
                .map_err(|source| MongoDaoError::WriteRace { id, source })?;
            Ok(())
        })
    }

    fn find_race(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_race_row(id).await.map_err(Into::into) })
    }

    fn find_open_public_race(
        &self,
        now: SystemTime,
        starting_soon: Duration,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let threshold = DateTime::from_system_time(now + starting_soon);
            let filter = doc! {
                "host": null,
                "$or": [
                    {"status": status_str(RaceStatus::Waiting)},
                    {
                        "status": status_str(RaceStatus::Starting),
                        "start_time": {"$gt": threshold},
                    },
                ],
            };

            let collection = store.races().await;
            let document = collection
                .find_one(filter)
                .sort(doc! {"created_at": 1})
                .await
                .map_err(|source| MongoDaoError::QueryOpenRaces { source })?;
            Ok(document.map(Into::into))
        })
    }

    fn append_player(
        &self,
        race_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.races().await;
            let updated = collection
                .find_one_and_update(
                    doc! {"_id": &race_id},
                    doc! {"$push": {"players": player_id}},
                )
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::WriteRace {
                    id: race_id,
                    source,
                })?;
            Ok(updated.map(Into::into))
        })
    }

    fn schedule_start(
        &self,
        race_id: String,
        to: RaceStatus,
        start_time: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let proposed = DateTime::from_system_time(start_time);
            let filter = doc! {
                "_id": &race_id,
                "status": {"$in": [
                    status_str(RaceStatus::Waiting),
                    status_str(RaceStatus::Starting),
                ]},
                "$or": [
                    {"start_time": null},
                    {"start_time": {"$gt": proposed}},
                ],
            };
            let update = doc! {"$set": {
                "status": status_str(to),
                "start_time": proposed,
            }};

            let collection = store.races().await;
            let updated = collection
                .find_one_and_update(filter, update)
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::WriteRace {
                    id: race_id.clone(),
                    source,
                })?;

            match updated {
                Some(document) => Ok(Some(document.into())),
                // Guard rejected the write: hand back the untouched row.
                None => store.find_race_row(race_id).await.map_err(Into::into),
            }
        })
    }

    fn transition_race(
        &self,
        race_id: String,
        transition: RaceTransition,
    ) -> BoxFuture<'static, StorageResult<TransitionOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let allowed: Vec<&str> = transition
                .allowed_from
                .iter()
                .copied()
                .map(status_str)
                .collect();
            let filter = doc! {"_id": &race_id, "status": {"$in": allowed}};

            let mut fields = doc! {"status": status_str(transition.to)};
            match transition.start_time {
                StartTimeUpdate::Keep => {}
                StartTimeUpdate::Set(start) => {
                    fields.insert("start_time", DateTime::from_system_time(start));
                }
                StartTimeUpdate::Clear => {
                    fields.insert("start_time", mongodb::bson::Bson::Null);
                }
            }
            if let Some(text_id) = transition.new_text_id {
                fields.insert("text_id", text_id);
            }
            if transition.reset_places {
                fields.insert("place_counter", 0_i64);
            }

            let collection = store.races().await;
            let updated = collection
                .find_one_and_update(filter, doc! {"$set": fields})
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::WriteRace {
                    id: race_id.clone(),
                    source,
                })?;

            if let Some(document) = updated {
                return Ok(TransitionOutcome::Applied(document.into()));
            }
            match store.find_race_row(race_id).await? {
                Some(race) => Ok(TransitionOutcome::Conflict(race.status)),
                None => Ok(TransitionOutcome::Missing),
            }
        })
    }

    fn claim_place(&self, race_id: String) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.races().await;
            let updated = collection
                .find_one_and_update(
                    doc! {"_id": &race_id},
                    doc! {"$inc": {"place_counter": 1}},
                )
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::WriteRace {
                    id: race_id,
                    source,
                })?;
            Ok(updated.map(|document| RaceEntity::from(document).place_counter))
        })
    }

    fn delete_races_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.races().await;
            let result = collection
                .delete_many(
                    doc! {"created_at": {"$lt": DateTime::from_system_time(cutoff)}},
                )
                .await
                .map_err(|source| MongoDaoError::Sweep {
                    collection: RACE_COLLECTION_NAME,
                    source,
                })?;
            Ok(result.deleted_count)
        })
    }
}

impl TextRepository for MongoRowStore {
    fn insert_text(&self, text: TextEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = text.id.clone();
            let document: MongoTextDocument = text.into();
            let collection = store.texts().await;
            collection
                .insert_one(&document)
                .await
                .map_err(|source| MongoDaoError::WriteText { id, source })?;
            Ok(())
        })
    }

    fn count_texts(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.texts().await;
            collection
                .count_documents(doc! {})
                .await
                .map_err(|source| MongoDaoError::ReadTexts { source }.into())
        })
    }

    fn text_at_offset(
        &self,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Option<TextEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.texts().await;
            let mut cursor = collection
                .find(doc! {})
                .skip(offset)
                .limit(1)
                .await
                .map_err(|source| MongoDaoError::ReadTexts { source })?;
            let document = cursor
                .try_next()
                .await
                .map_err(|source| MongoDaoError::ReadTexts { source })?;
            Ok(document.map(Into::into))
        })
    }

    fn find_text(&self, id: String) -> BoxFuture<'static, StorageResult<Option<TextEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.texts().await;
            let document = collection
                .find_one(doc! {"_id": &id})
                .await
                .map_err(|source| MongoDaoError::ReadTexts { source })?;
            Ok(document.map(Into::into))
        })
    }
}

impl RowStore for MongoRowStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
