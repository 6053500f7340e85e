//! In-memory row store used for tests and storage-less deployments.
//!
//! A single mutex guards all three tables, so every operation the traits
//! describe as atomic (roster append, guarded transition, place counter) is
//! trivially serialized here.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::dao::models::{PlayerEntity, RaceEntity, RaceStatus, TextEntity};
use crate::dao::row_store::{
    PlayerRepository, RaceRepository, RaceTransition, RowStore, StartTimeUpdate, TextRepository,
    TransitionOutcome,
};
use crate::dao::storage::StorageResult;

/// Always-available backend backed by insertion-ordered maps. The insertion
/// order makes the public-queue scan deterministic: the oldest open race wins.
#[derive(Clone, Default)]
pub struct MemoryRowStore {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    players: IndexMap<String, PlayerEntity>,
    races: IndexMap<String, RaceEntity>,
    texts: IndexMap<String, TextEntity>,
}

impl MemoryRowStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn race_is_open(race: &RaceEntity, now: SystemTime, starting_soon: Duration) -> bool {
    if race.host.is_some() {
        return false;
    }
    match race.status {
        RaceStatus::Waiting => true,
        RaceStatus::Starting => match race.start_time {
            // Matchable while the countdown still has more than the
            // starting-soon window left; late joiners are turned away.
            Some(start) => start > now + starting_soon,
            None => true,
        },
        RaceStatus::Active | RaceStatus::Finished => false,
    }
}

impl PlayerRepository for MemoryRowStore {
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.players.insert(player.id.clone(), player);
            Ok(())
        })
    }

    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            Ok(tables.players.get(&id).cloned())
        })
    }

    fn touch_player(
        &self,
        id: String,
        seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            Ok(tables.players.get_mut(&id).map(|player| {
                player.last_seen = seen_at;
                player.clone()
            }))
        })
    }

    fn set_player_race(
        &self,
        id: String,
        race_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            Ok(tables.players.get_mut(&id).map(|player| {
                player.race_id = race_id;
                player.clone()
            }))
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
            let mut tables = store.inner.lock().await;
            Ok(tables.players.get_mut(&id).map(|player| {
                player.wpm = wpm;
                player.progress = progress;
                if place.is_some() {
                    player.place = place;
                }
                player.clone()
            }))
        })
    }

    fn delete_player(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            Ok(tables.players.shift_remove(&id).is_some())
        })
    }

    fn delete_players_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let before = tables.players.len();
            tables.players.retain(|_, player| player.created_at >= cutoff);
            Ok((before - tables.players.len()) as u64)
        })
    }
}

impl RaceRepository for MemoryRowStore {
    fn insert_race(&self, race: RaceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.races.insert(race.id.clone(), race);
            Ok(())
        })
    }

    fn find_race(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            Ok(tables.races.get(&id).cloned())
        })
    }

    fn find_open_public_race(
        &self,
        now: SystemTime,
        starting_soon: Duration,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            Ok(tables
                .races
                .values()
                .find(|race| race_is_open(race, now, starting_soon))
                .cloned())
        })
    }

    fn append_player(
        &self,
        race_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            Ok(tables.races.get_mut(&race_id).map(|race| {
                race.players.push(player_id);
                race.clone()
            }))
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
            let mut tables = store.inner.lock().await;
            Ok(tables.races.get_mut(&race_id).map(|race| {
                let schedulable =
                    matches!(race.status, RaceStatus::Waiting | RaceStatus::Starting);
                let sooner = race.start_time.is_none_or(|current| start_time < current);
                if schedulable && sooner {
                    race.status = to;
                    race.start_time = Some(start_time);
                }
                race.clone()
            }))
        })
    }

    fn transition_race(
        &self,
        race_id: String,
        transition: RaceTransition,
    ) -> BoxFuture<'static, StorageResult<TransitionOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let Some(race) = tables.races.get_mut(&race_id) else {
                return Ok(TransitionOutcome::Missing);
            };
            if !transition.allowed_from.contains(&race.status) {
                return Ok(TransitionOutcome::Conflict(race.status));
            }
            race.status = transition.to;
            match transition.start_time {
                StartTimeUpdate::Keep => {}
                StartTimeUpdate::Set(start) => race.start_time = Some(start),
                StartTimeUpdate::Clear => race.start_time = None,
            }
            if let Some(text_id) = transition.new_text_id {
                race.text_id = text_id;
            }
            if transition.reset_places {
                race.place_counter = 0;
            }
            Ok(TransitionOutcome::Applied(race.clone()))
        })
    }

    fn claim_place(&self, race_id: String) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            Ok(tables.races.get_mut(&race_id).map(|race| {
                race.place_counter += 1;
                race.place_counter
            }))
        })
    }

    fn delete_races_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let before = tables.races.len();
            tables.races.retain(|_, race| race.created_at >= cutoff);
            Ok((before - tables.races.len()) as u64)
        })
    }
}

impl TextRepository for MemoryRowStore {
    fn insert_text(&self, text: TextEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.texts.insert(text.id.clone(), text);
            Ok(())
        })
    }

    fn count_texts(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            Ok(tables.texts.len() as u64)
        })
    }

    fn text_at_offset(
        &self,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Option<TextEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            Ok(tables
                .texts
                .get_index(offset as usize)
                .map(|(_, text)| text.clone()))
        })
    }

    fn find_text(&self, id: String) -> BoxFuture<'static, StorageResult<Option<TextEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            Ok(tables.texts.get(&id).cloned())
        })
    }
}

impl RowStore for MemoryRowStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race(id: &str, status: RaceStatus, host: Option<&str>) -> RaceEntity {
        let mut race = RaceEntity::new(
            id.to_string(),
            "text-1".to_string(),
            "p1".to_string(),
            host.map(str::to_string),
            SystemTime::now(),
        );
        race.status = status;
        race
    }

    #[tokio::test]
    async fn schedule_start_only_moves_the_start_earlier() {
        let store = MemoryRowStore::new();
        let now = SystemTime::now();
        store.insert_race(race("r1", RaceStatus::Waiting, None)).await.unwrap();

        let first = store
            .schedule_start("r1".into(), RaceStatus::Starting, now + Duration::from_secs(15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.status, RaceStatus::Starting);
        assert_eq!(first.start_time, Some(now + Duration::from_secs(15)));

        // A later proposal is rejected, an earlier one wins.
        let pushed_back = store
            .schedule_start("r1".into(), RaceStatus::Starting, now + Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pushed_back.start_time, Some(now + Duration::from_secs(15)));

        let shortened = store
            .schedule_start("r1".into(), RaceStatus::Starting, now + Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shortened.start_time, Some(now + Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn transition_guard_reports_conflicts_and_missing_rows() {
        let store = MemoryRowStore::new();
        store.insert_race(race("r1", RaceStatus::Finished, None)).await.unwrap();

        let transition = RaceTransition {
            allowed_from: &[RaceStatus::Waiting, RaceStatus::Starting],
            to: RaceStatus::Active,
            start_time: StartTimeUpdate::Keep,
            new_text_id: None,
            reset_places: false,
        };

        match store.transition_race("r1".into(), transition.clone()).await.unwrap() {
            TransitionOutcome::Conflict(status) => assert_eq!(status, RaceStatus::Finished),
            other => panic!("expected conflict, got {other:?}"),
        }
        match store.transition_race("ghost".into(), transition).await.unwrap() {
            TransitionOutcome::Missing => {}
            other => panic!("expected missing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_transition_clears_schedule_and_places() {
        let store = MemoryRowStore::new();
        let mut finished = race("r1", RaceStatus::Finished, None);
        finished.start_time = Some(SystemTime::now());
        finished.place_counter = 3;
        store.insert_race(finished).await.unwrap();

        let transition = RaceTransition {
            allowed_from: &[RaceStatus::Finished],
            to: RaceStatus::Waiting,
            start_time: StartTimeUpdate::Clear,
            new_text_id: Some("text-2".into()),
            reset_places: true,
        };

        match store.transition_race("r1".into(), transition).await.unwrap() {
            TransitionOutcome::Applied(race) => {
                assert_eq!(race.status, RaceStatus::Waiting);
                assert_eq!(race.start_time, None);
                assert_eq!(race.text_id, "text-2");
                assert_eq!(race.place_counter, 0);
            }
            other => panic!("expected applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn claim_place_counts_up_per_race() {
        let store = MemoryRowStore::new();
        store.insert_race(race("r1", RaceStatus::Active, None)).await.unwrap();
        store.insert_race(race("r2", RaceStatus::Active, None)).await.unwrap();

        assert_eq!(store.claim_place("r1".into()).await.unwrap(), Some(1));
        assert_eq!(store.claim_place("r1".into()).await.unwrap(), Some(2));
        assert_eq!(store.claim_place("r2".into()).await.unwrap(), Some(1));
        assert_eq!(store.claim_place("ghost".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn open_race_query_skips_private_and_imminent_races() {
        let store = MemoryRowStore::new();
        let now = SystemTime::now();
        let window = Duration::from_secs(5);

        store.insert_race(race("private", RaceStatus::Waiting, Some("host"))).await.unwrap();
        let mut imminent = race("imminent", RaceStatus::Starting, None);
        imminent.start_time = Some(now + Duration::from_secs(2));
        store.insert_race(imminent).await.unwrap();
        let mut distant = race("distant", RaceStatus::Starting, None);
        distant.start_time = Some(now + Duration::from_secs(20));
        store.insert_race(distant).await.unwrap();

        let open = store.find_open_public_race(now, window).await.unwrap().unwrap();
        assert_eq!(open.id, "distant");
    }

    #[tokio::test]
    async fn sweeps_remove_rows_older_than_the_cutoff() {
        let store = MemoryRowStore::new();
        let now = SystemTime::now();
        let old = now - Duration::from_secs(25 * 3600);

        store.insert_player(PlayerEntity::new("stale".into(), old)).await.unwrap();
        store.insert_player(PlayerEntity::new("fresh".into(), now)).await.unwrap();
        let mut stale_race = race("stale-race", RaceStatus::Finished, None);
        stale_race.created_at = old;
        store.insert_race(stale_race).await.unwrap();

        let cutoff = now - Duration::from_secs(24 * 3600);
        assert_eq!(store.delete_players_created_before(cutoff).await.unwrap(), 1);
        assert_eq!(store.delete_races_created_before(cutoff).await.unwrap(), 1);
        assert!(store.find_player("fresh".into()).await.unwrap().is_some());
        assert!(store.find_player("stale".into()).await.unwrap().is_none());
    }
}
