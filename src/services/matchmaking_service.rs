use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        models::{RaceEntity, RaceStatus},
        row_store::{PlayerRepository, RaceRepository},
    },
    error::ServiceError,
    services::{race_service, row_events, text_service},
    state::SharedState,
};

/// Place a player into the public queue: join the open race if one exists,
/// otherwise open a fresh waiting race around the player.
pub async fn join_public_race(
    state: &SharedState,
    player_id: &str,
) -> Result<RaceEntity, ServiceError> {
    let store = state.require_row_store().await?;
    ensure_player_exists(state, player_id).await?;

    let now = SystemTime::now();
    let open = store
        .find_open_public_race(now, state.config().starting_soon_window)
        .await?;

    let race = match open {
        Some(open) => {
            match store
                .append_player(open.id.clone(), player_id.to_string())
                .await?
            {
                Some(race) => apply_capacity_policy(state, race, now).await?,
                // The row was swept between the lookup and the append.
                None => create_race(state, player_id, None, now).await?,
            }
        }
        None => create_race(state, player_id, None, now).await?,
    };

    attach_player(state, player_id, &race.id).await?;
    row_events::publish_race_update(state, &race);
    Ok(race)
}

/// Join a specific race by id, typically a private room shared out of band.
pub async fn join_race_by_id(
    state: &SharedState,
    player_id: &str,
    race_id: &str,
) -> Result<RaceEntity, ServiceError> {
    let store = state.require_row_store().await?;
    ensure_player_exists(state, player_id).await?;

    let now = SystemTime::now();
    let race = store
        .find_race(race_id.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("race '{race_id}' does not exist")))?;
    ensure_joinable(state, &race, now)?;

    let race = store
        .append_player(race_id.to_string(), player_id.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("race '{race_id}' does not exist")))?;

    // Private rooms start on the host's command, never on roster size.
    let race = if race.host.is_none() {
        apply_capacity_policy(state, race, now).await?
    } else {
        race
    };

    attach_player(state, player_id, &race.id).await?;
    row_events::publish_race_update(state, &race);
    Ok(race)
}

/// Open a private room owned by the player.
pub async fn create_private_race(
    state: &SharedState,
    player_id: &str,
) -> Result<RaceEntity, ServiceError> {
    ensure_player_exists(state, player_id).await?;

    let race = create_race(state, player_id, Some(player_id.to_string()), SystemTime::now()).await?;
    attach_player(state, player_id, &race.id).await?;
    row_events::publish_race_update(state, &race);
    Ok(race)
}

/// Apply the roster-size start policy after a join landed on a public race.
///
/// Reaching the join trigger schedules the start; reaching the shorten
/// trigger pulls a distant start closer. The countdown is only ever moved
/// earlier.
async fn apply_capacity_policy(
    state: &SharedState,
    race: RaceEntity,
    now: SystemTime,
) -> Result<RaceEntity, ServiceError> {
    let config = state.config();
    let roster = race.players.len();

    let proposal = match race.status {
        RaceStatus::Waiting if roster >= config.shorten_trigger => Some(config.shorten_delay),
        RaceStatus::Waiting if roster >= config.join_trigger => Some(config.start_delay),
        RaceStatus::Starting if roster >= config.shorten_trigger => {
            let remaining = race
                .start_time
                .and_then(|start| start.duration_since(now).ok());
            match remaining {
                Some(remaining) if remaining > config.shorten_floor => Some(config.shorten_delay),
                _ => None,
            }
        }
        _ => None,
    };

    let Some(delay) = proposal else {
        return Ok(race);
    };

    match race_service::schedule_start(state, &race.id, now + delay).await? {
        Some(updated) => Ok(updated),
        None => Ok(race),
    }
}

async fn create_race(
    state: &SharedState,
    player_id: &str,
    host: Option<String>,
    now: SystemTime,
) -> Result<RaceEntity, ServiceError> {
    let text = text_service::draw_random(state).await?;
    let race = RaceEntity::new(
        Uuid::new_v4().simple().to_string(),
        text.id,
        player_id.to_string(),
        host,
        now,
    );

    let store = state.require_row_store().await?;
    store.insert_race(race.clone()).await?;
    info!(race_id = race.id, player_id, "race created");
    Ok(race)
}

async fn attach_player(
    state: &SharedState,
    player_id: &str,
    race_id: &str,
) -> Result<(), ServiceError> {
    let store = state.require_row_store().await?;
    let updated = store
        .set_player_race(player_id.to_string(), Some(race_id.to_string()))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player '{player_id}' does not exist")))?;

    row_events::publish_player_update(state, &updated);
    Ok(())
}

async fn ensure_player_exists(state: &SharedState, player_id: &str) -> Result<(), ServiceError> {
    let store = state.require_row_store().await?;
    store
        .find_player(player_id.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player '{player_id}' does not exist")))?;
    Ok(())
}

fn ensure_joinable(
    state: &SharedState,
    race: &RaceEntity,
    now: SystemTime,
) -> Result<(), ServiceError> {
    match race.status {
        RaceStatus::Waiting => Ok(()),
        RaceStatus::Starting => {
            let window = state.config().starting_soon_window;
            let far_enough = race
                .start_time
                .and_then(|start| start.duration_since(now).ok())
                .is_some_and(|remaining| remaining > window);
            if far_enough {
                Ok(())
            } else {
                Err(ServiceError::InvalidInput(format!(
                    "race '{}' is about to start",
                    race.id
                )))
            }
        }
        RaceStatus::Active | RaceStatus::Finished => Err(ServiceError::InvalidInput(format!(
            "race '{}' has already started",
            race.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::TextEntity,
            row_store::{TextRepository, memory::MemoryRowStore},
        },
        dto::command::RegisterPlayerRequest,
        services::{player_service, race_service},
        state::AppState,
    };

    async fn setup(texts: usize) -> SharedState {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryRowStore::new());
        for index in 0..texts {
            store
                .insert_text(TextEntity {
                    id: format!("text-{index}"),
                    content: "the quick brown fox jumps over the lazy dog".into(),
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

    async fn register(state: &SharedState, id: &str) {
        player_service::register(
            state,
            RegisterPlayerRequest {
                player_id: Some(id.to_string()),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn first_join_opens_a_waiting_race() {
        let state = setup(1).await;
        register(&state, "p1").await;

        let race = join_public_race(&state, "p1").await.unwrap();
        assert_eq!(race.status, RaceStatus::Waiting);
        assert_eq!(race.players, vec!["p1"]);
        assert_eq!(race.start_time, None);

        let store = state.require_row_store().await.unwrap();
        let player = store.find_player("p1".into()).await.unwrap().unwrap();
        assert_eq!(player.race_id, Some(race.id));
    }

    #[tokio::test]
    async fn second_join_schedules_the_start_and_fifth_shortens_it() {
        let state = setup(1).await;
        for id in ["p1", "p2", "p3", "p4", "p5"] {
            register(&state, id).await;
        }

        let opened = join_public_race(&state, "p1").await.unwrap();
        let before_second = SystemTime::now();
        let scheduled = join_public_race(&state, "p2").await.unwrap();
        assert_eq!(scheduled.id, opened.id);
        assert_eq!(scheduled.status, RaceStatus::Starting);
        let first_start = scheduled.start_time.expect("start scheduled");
        let delay = first_start.duration_since(before_second).unwrap();
        assert!(delay > Duration::from_secs(13) && delay <= Duration::from_secs(16));

        let third = join_public_race(&state, "p3").await.unwrap();
        assert_eq!(third.start_time, Some(first_start));
        join_public_race(&state, "p4").await.unwrap();

        let fifth = join_public_race(&state, "p5").await.unwrap();
        assert_eq!(fifth.id, opened.id);
        assert_eq!(fifth.players.len(), 5);
        let shortened = fifth.start_time.expect("start still scheduled");
        // The start only ever moves earlier.
        assert!(shortened < first_start);
        let remaining = shortened.duration_since(SystemTime::now()).unwrap();
        assert!(remaining <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn private_races_never_match_the_public_queue() {
        let state = setup(1).await;
        register(&state, "host").await;
        register(&state, "joiner").await;

        let private = create_private_race(&state, "host").await.unwrap();
        assert_eq!(private.host.as_deref(), Some("host"));

        let public = join_public_race(&state, "joiner").await.unwrap();
        assert_ne!(public.id, private.id);
    }

    #[tokio::test]
    async fn join_by_id_rejects_started_races() {
        let state = setup(1).await;
        register(&state, "host").await;
        register(&state, "late").await;

        let private = create_private_race(&state, "host").await.unwrap();
        race_service::start_race(&state, &private.id).await.unwrap();

        let err = join_race_by_id(&state, "late", &private.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn join_by_id_admits_into_waiting_private_rooms() {
        let state = setup(1).await;
        register(&state, "host").await;
        register(&state, "friend").await;

        let private = create_private_race(&state, "host").await.unwrap();
        let joined = join_race_by_id(&state, "friend", &private.id).await.unwrap();
        assert_eq!(joined.players, vec!["host", "friend"]);
        // Roster growth never schedules a start for a hosted room.
        assert_eq!(joined.status, RaceStatus::Waiting);
        assert_eq!(joined.start_time, None);
    }

    #[tokio::test]
    async fn joining_without_a_player_row_is_not_found() {
        let state = setup(1).await;
        let err = join_public_race(&state, "ghost").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
