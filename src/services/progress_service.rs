use tracing::warn;

use crate::{
    dao::row_store::{PlayerRepository, RaceRepository},
    dto::command::{StatsUpdatedResponse, UpdateStatsRequest},
    error::ServiceError,
    services::row_events,
    state::SharedState,
};

/// Persist a player's live stats and assign a finishing place the first time
/// progress reaches the end of the passage.
///
/// Stats are last-write-wins; the place is claimed exactly once through the
/// race-scoped counter, so a duplicate completion report keeps the rank the
/// player already holds.
pub async fn update_stats(
    state: &SharedState,
    request: UpdateStatsRequest,
) -> Result<StatsUpdatedResponse, ServiceError> {
    let store = state.require_row_store().await?;
    let player = store
        .find_player(request.player_id.clone())
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("player '{}' does not exist", request.player_id))
        })?;

    let race_id = request.race_id.or_else(|| player.race_id.clone());
    let mut place = player.place;
    if place.is_none() && request.progress >= 1.0 {
        if let Some(race_id) = &race_id {
            match store.claim_place(race_id.clone()).await? {
                Some(rank) => place = Some(rank),
                None => warn!(
                    race_id,
                    player_id = request.player_id,
                    "race disappeared before a place could be claimed"
                ),
            }
        }
    }

    let updated = store
        .update_player_stats(request.player_id.clone(), request.wpm, request.progress, place)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("player '{}' does not exist", request.player_id))
        })?;

    row_events::publish_player_update(state, &updated);
    Ok(StatsUpdatedResponse {
        place: updated.place,
    })
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
        state::{AppState, SharedState},
    };

    async fn setup_two_player_race(state: &SharedState) -> String {
        for id in ["alice", "bob"] {
            player_service::register(
                state,
                RegisterPlayerRequest {
                    player_id: Some(id.to_string()),
                },
            )
            .await
            .unwrap();
        }
        matchmaking_service::join_public_race(state, "alice").await.unwrap();
        matchmaking_service::join_public_race(state, "bob").await.unwrap().id
    }

    async fn setup() -> SharedState {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryRowStore::new());
        store
            .insert_text(TextEntity {
                id: "text-0".into(),
                content: "a passage long enough to race on".into(),
                origin: "test".into(),
                author: "test".into(),
                uploader: "test".into(),
                kind: "type".into(),
            })
            .await
            .unwrap();
        state.install_row_store(store).await;
        state
    }

    fn stats(player_id: &str, wpm: u32, progress: f64) -> UpdateStatsRequest {
        UpdateStatsRequest {
            player_id: player_id.to_string(),
            wpm,
            progress,
            race_id: None,
        }
    }

    #[tokio::test]
    async fn places_are_assigned_in_completion_order() {
        let state = setup().await;
        setup_two_player_race(&state).await;

        update_stats(&state, stats("alice", 80, 0.5)).await.unwrap();
        let first = update_stats(&state, stats("alice", 82, 1.0)).await.unwrap();
        assert_eq!(first.place, Some(1));

        let second = update_stats(&state, stats("bob", 70, 1.0)).await.unwrap();
        assert_eq!(second.place, Some(2));
    }

    #[tokio::test]
    async fn duplicate_completion_reports_keep_the_original_place() {
        let state = setup().await;
        let race_id = setup_two_player_race(&state).await;

        let first = update_stats(&state, stats("alice", 82, 1.0)).await.unwrap();
        assert_eq!(first.place, Some(1));
        let again = update_stats(&state, stats("alice", 85, 1.0)).await.unwrap();
        assert_eq!(again.place, Some(1));

        // The counter was bumped once, so the next finisher is second.
        let store = state.require_row_store().await.unwrap();
        let race = store.find_race(race_id).await.unwrap().unwrap();
        assert_eq!(race.place_counter, 1);
    }

    #[tokio::test]
    async fn partial_progress_never_claims_a_place() {
        let state = setup().await;
        setup_two_player_race(&state).await;

        let partial = update_stats(&state, stats("alice", 90, 0.99)).await.unwrap();
        assert_eq!(partial.place, None);
    }

    #[tokio::test]
    async fn stats_for_unknown_players_are_rejected() {
        let state = setup().await;
        let err = update_stats(&state, stats("ghost", 50, 0.2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
