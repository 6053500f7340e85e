use std::time::{Duration, SystemTime};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{RaceEntity, RaceStatus},
        row_store::{RaceRepository, RaceTransition, StartTimeUpdate, TransitionOutcome},
    },
    error::ServiceError,
    services::{row_events, text_service},
    state::{
        SharedState,
        state_machine::{InvalidTransition, RaceEvent, allowed_sources},
    },
};

/// Start a race immediately on behalf of its host.
///
/// The start time is pushed a short lead into the future so every roster
/// member sees the same typing-permitted instant.
pub async fn start_race(state: &SharedState, race_id: &str) -> Result<RaceEntity, ServiceError> {
    let store = state.require_row_store().await?;
    let start_time = SystemTime::now() + state.config().start_lead;
    let transition = RaceTransition {
        allowed_from: allowed_sources(RaceEvent::Start),
        to: RaceStatus::Active,
        start_time: StartTimeUpdate::Set(start_time),
        new_text_id: None,
        reset_places: false,
    };

    let outcome = store.transition_race(race_id.to_string(), transition).await?;
    let race = resolve_outcome(race_id, outcome, RaceEvent::Start)?;

    state.countdowns().stop(race_id);
    row_events::publish_race_update(state, &race);
    info!(race_id, "race started manually");
    Ok(race)
}

/// Mark a race as finished.
pub async fn end_race(state: &SharedState, race_id: &str) -> Result<RaceEntity, ServiceError> {
    let store = state.require_row_store().await?;
    let transition = RaceTransition {
        allowed_from: allowed_sources(RaceEvent::End),
        to: RaceStatus::Finished,
        start_time: StartTimeUpdate::Keep,
        new_text_id: None,
        reset_places: false,
    };

    let outcome = store.transition_race(race_id.to_string(), transition).await?;
    let race = resolve_outcome(race_id, outcome, RaceEvent::End)?;

    state.countdowns().stop(race_id);
    row_events::publish_race_update(state, &race);
    info!(race_id, "race ended");
    Ok(race)
}

/// Return a finished race to the waiting pool with a fresh passage.
pub async fn reset_race(state: &SharedState, race_id: &str) -> Result<RaceEntity, ServiceError> {
    let text = text_service::draw_random(state).await?;

    let store = state.require_row_store().await?;
    let transition = RaceTransition {
        allowed_from: allowed_sources(RaceEvent::Reset),
        to: RaceStatus::Waiting,
        start_time: StartTimeUpdate::Clear,
        new_text_id: Some(text.id),
        reset_places: true,
    };

    let outcome = store.transition_race(race_id.to_string(), transition).await?;
    let race = resolve_outcome(race_id, outcome, RaceEvent::Reset)?;

    row_events::publish_race_update(state, &race);
    info!(race_id, "race reset");
    Ok(race)
}

/// Schedule (or shorten) a race start and run its countdown.
///
/// The store only accepts the proposal when it is earlier than the stored
/// start, so a slower concurrent caller loses cleanly; the countdown task is
/// replaced only when this proposal won. Returns `None` when the race row no
/// longer exists.
pub(crate) async fn schedule_start(
    state: &SharedState,
    race_id: &str,
    start_time: SystemTime,
) -> Result<Option<RaceEntity>, ServiceError> {
    let store = state.require_row_store().await?;
    let Some(race) = store
        .schedule_start(race_id.to_string(), RaceStatus::Starting, start_time)
        .await?
    else {
        return Ok(None);
    };

    if race.start_time == Some(start_time) {
        spawn_countdown(state, race_id, start_time);
        info!(race_id, "race start scheduled");
    }

    row_events::publish_race_update(state, &race);
    Ok(Some(race))
}

/// Spawn the 1 Hz countdown task for a scheduled start, replacing any
/// countdown already running for this race.
pub(crate) fn spawn_countdown(state: &SharedState, race_id: &str, start_time: SystemTime) {
    let token = Uuid::new_v4();
    let task = tokio::spawn(run_countdown(
        state.clone(),
        race_id.to_string(),
        start_time,
        token,
    ));
    state.countdowns().register(race_id.to_string(), token, task);
}

async fn run_countdown(state: SharedState, race_id: String, start_time: SystemTime, token: Uuid) {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let remaining = start_time
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        row_events::publish_countdown_tick(&state, &race_id, remaining.as_secs());
        if remaining.is_zero() {
            break;
        }
    }

    if let Err(err) = activate_scheduled(&state, &race_id).await {
        warn!(race_id, error = %err, "failed to activate race after countdown");
    }
    state.countdowns().deregister(&race_id, token);
}

/// Flip a starting race to active once its countdown reaches zero.
///
/// Losing the guard is not an error here: the race may have been started
/// manually or ended while the countdown was running.
async fn activate_scheduled(state: &SharedState, race_id: &str) -> Result<(), ServiceError> {
    let store = state.require_row_store().await?;
    let transition = RaceTransition {
        allowed_from: &[RaceStatus::Starting],
        to: RaceStatus::Active,
        start_time: StartTimeUpdate::Keep,
        new_text_id: None,
        reset_places: false,
    };

    match store.transition_race(race_id.to_string(), transition).await? {
        TransitionOutcome::Applied(race) => {
            row_events::publish_race_update(state, &race);
            info!(race_id, "race activated by countdown");
        }
        TransitionOutcome::Conflict(status) => {
            debug!(race_id, ?status, "countdown expired but race had moved on");
        }
        TransitionOutcome::Missing => {
            debug!(race_id, "countdown expired for a deleted race");
        }
    }

    Ok(())
}

fn resolve_outcome(
    race_id: &str,
    outcome: TransitionOutcome,
    event: RaceEvent,
) -> Result<RaceEntity, ServiceError> {
    match outcome {
        TransitionOutcome::Applied(race) => Ok(race),
        TransitionOutcome::Conflict(status) => {
            Err(InvalidTransition {
                from: status,
                event,
            }
            .into())
        }
        TransitionOutcome::Missing => Err(ServiceError::NotFound(format!(
            "race '{race_id}' does not exist"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::TextEntity,
            row_store::{TextRepository, memory::MemoryRowStore},
        },
        dto::command::RegisterPlayerRequest,
        services::{matchmaking_service, player_service},
        state::AppState,
    };

    async fn setup_private_race(state: &SharedState) -> String {
        player_service::register(
            state,
            RegisterPlayerRequest {
                player_id: Some("host".into()),
            },
        )
        .await
        .unwrap();
        matchmaking_service::create_private_race(state, "host").await.unwrap().id
    }

    async fn setup() -> SharedState {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryRowStore::new());
        for index in 0..2 {
            store
                .insert_text(TextEntity {
                    id: format!("text-{index}"),
                    content: "a passage long enough for a race".into(),
                    origin: "test".into(),
                    author: "test".into(),
                    uploader: "test".into(),
                    kind: "type".into(),
                })
                .await
                .unwrap();
        }
        state.install_row_store(store).await;
        state
    }

    #[tokio::test]
    async fn manual_start_activates_with_a_lead() {
        let state = setup().await;
        let race_id = setup_private_race(&state).await;

        let before = SystemTime::now();
        let race = start_race(&state, &race_id).await.unwrap();
        assert_eq!(race.status, RaceStatus::Active);
        let start = race.start_time.expect("start time set");
        assert!(start > before);
    }

    #[tokio::test]
    async fn lifecycle_violations_are_rejected() {
        let state = setup().await;
        let race_id = setup_private_race(&state).await;

        end_race(&state, &race_id).await.unwrap();
        assert!(matches!(
            end_race(&state, &race_id).await.unwrap_err(),
            ServiceError::InvalidTransition(_)
        ));
        assert!(matches!(
            start_race(&state, &race_id).await.unwrap_err(),
            ServiceError::InvalidTransition(_)
        ));
    }

    #[tokio::test]
    async fn reset_revives_a_finished_race_with_a_clean_slate() {
        let state = setup().await;
        let race_id = setup_private_race(&state).await;

        start_race(&state, &race_id).await.unwrap();
        end_race(&state, &race_id).await.unwrap();
        let race = reset_race(&state, &race_id).await.unwrap();

        assert_eq!(race.status, RaceStatus::Waiting);
        assert_eq!(race.start_time, None);
        assert_eq!(race.place_counter, 0);
    }

    #[tokio::test]
    async fn reset_requires_a_finished_race() {
        let state = setup().await;
        let race_id = setup_private_race(&state).await;

        assert!(matches!(
            reset_race(&state, &race_id).await.unwrap_err(),
            ServiceError::InvalidTransition(_)
        ));
    }

    #[tokio::test]
    async fn countdown_ticks_then_activates_the_race() {
        let state = setup().await;
        let race_id = setup_private_race(&state).await;
        let mut events = state.hub().subscribe("races", &race_id);

        let start = SystemTime::now() + Duration::from_millis(1_500);
        schedule_start(&state, &race_id, start).await.unwrap().unwrap();
        assert!(state.countdowns().is_running(&race_id));

        let mut saw_tick = false;
        let mut activated = false;
        while !activated {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("countdown stalled")
                .unwrap();
            match event.event.as_str() {
                "tick" => saw_tick = true,
                "update" => {
                    let race: serde_json::Value = serde_json::from_str(&event.data).unwrap();
                    activated = race["status"] == "active";
                }
                _ => {}
            }
        }
        assert!(saw_tick);

        let store = state.require_row_store().await.unwrap();
        let race = store.find_race(race_id.clone()).await.unwrap().unwrap();
        assert_eq!(race.status, RaceStatus::Active);

        // The expired task removes its own registry entry.
        tokio::time::timeout(Duration::from_secs(1), async {
            while state.countdowns().is_running(&race_id) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("countdown task still registered after activation");
    }

    #[tokio::test]
    async fn operations_on_unknown_races_are_not_found() {
        let state = setup().await;
        assert!(matches!(
            start_race(&state, "ghost").await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
