use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::{
    dao::row_store::{PlayerRepository, RaceRepository},
    error::ServiceError,
    state::SharedState,
};

/// Row counts removed by one retention sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepOutcome {
    pub players_removed: u64,
    pub races_removed: u64,
}

/// Delete player and race rows older than the retention cutoff.
///
/// Text rows are permanent and never swept.
pub async fn sweep(state: &SharedState) -> Result<SweepOutcome, ServiceError> {
    let store = state.require_row_store().await?;
    let cutoff = SystemTime::now()
        .checked_sub(state.config().retention)
        .unwrap_or(UNIX_EPOCH);

    let players_removed = store.delete_players_created_before(cutoff).await?;
    let races_removed = store.delete_races_created_before(cutoff).await?;

    info!(players_removed, races_removed, "retention sweep completed");
    Ok(SweepOutcome {
        players_removed,
        races_removed,
    })
}

/// Run the retention sweep on a fixed cadence.
///
/// A failed sweep is logged and retried on the next tick, not immediately.
pub async fn run_periodic(state: SharedState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(err) = sweep(&state).await {
            warn!(error = %err, "retention sweep failed; will retry on the next tick");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{PlayerEntity, RaceEntity},
            row_store::memory::MemoryRowStore,
        },
        state::AppState,
    };

    #[tokio::test]
    async fn sweep_removes_only_rows_past_the_retention_cutoff() {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryRowStore::new());
        let now = SystemTime::now();
        let stale = now - Duration::from_secs(25 * 3600);
        let fresh = now - Duration::from_secs(3600);

        store.insert_player(PlayerEntity::new("stale".into(), stale)).await.unwrap();
        store.insert_player(PlayerEntity::new("fresh".into(), fresh)).await.unwrap();
        store
            .insert_race(RaceEntity::new(
                "stale-race".into(),
                "text-0".into(),
                "stale".into(),
                None,
                stale,
            ))
            .await
            .unwrap();
        store
            .insert_race(RaceEntity::new(
                "fresh-race".into(),
                "text-0".into(),
                "fresh".into(),
                None,
                fresh,
            ))
            .await
            .unwrap();
        state.install_row_store(store.clone()).await;

        let outcome = sweep(&state).await.unwrap();
        assert_eq!(outcome.players_removed, 1);
        assert_eq!(outcome.races_removed, 1);
        assert!(store.find_player("fresh".into()).await.unwrap().is_some());
        assert!(store.find_race("fresh-race".into()).await.unwrap().is_some());
        assert!(store.find_race("stale-race".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_without_a_store_reports_degraded() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            sweep(&state).await.unwrap_err(),
            ServiceError::Degraded
        ));
    }
}
