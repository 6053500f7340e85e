use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{models::PlayerEntity, row_store::PlayerRepository},
    dto::command::{PlayerRegisteredResponse, RegisterPlayerRequest},
    error::ServiceError,
    services::row_events,
    state::SharedState,
};

/// Create a player row, generating an identifier when the client did not
/// bring its own.
pub async fn register(
    state: &SharedState,
    request: RegisterPlayerRequest,
) -> Result<PlayerRegisteredResponse, ServiceError> {
    let store = state.require_row_store().await?;
    let player_id = request
        .player_id
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    if store.find_player(player_id.clone()).await?.is_some() {
        return Err(ServiceError::InvalidInput(format!(
            "player '{player_id}' is already registered"
        )));
    }

    let player = PlayerEntity::new(player_id.clone(), SystemTime::now());
    store.insert_player(player).await?;
    info!(player_id, "player registered");

    Ok(PlayerRegisteredResponse { player_id })
}

/// Remove a player row entirely.
///
/// Idempotent: clients fire this on page unload and may race each other, so a
/// row that is already gone counts as success.
pub async fn deregister(state: &SharedState, player_id: &str) -> Result<(), ServiceError> {
    let store = state.require_row_store().await?;
    if store.delete_player(player_id.to_string()).await? {
        row_events::publish_player_deleted(state, player_id);
        info!(player_id, "player deregistered");
    }
    Ok(())
}

/// Refresh a player's `last_seen` timestamp so the janitor keeps the row.
pub async fn heartbeat(state: &SharedState, player_id: &str) -> Result<(), ServiceError> {
    let store = state.require_row_store().await?;
    let updated = store
        .touch_player(player_id.to_string(), SystemTime::now())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player '{player_id}' does not exist")))?;

    row_events::publish_player_update(state, &updated);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::row_store::memory::MemoryRowStore,
        state::{AppState, SharedState},
    };

    async fn setup() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_row_store(Arc::new(MemoryRowStore::new())).await;
        state
    }

    #[tokio::test]
    async fn register_then_deregister_leaves_no_row() {
        let state = setup().await;
        let response = register(&state, RegisterPlayerRequest { player_id: None })
            .await
            .unwrap();

        deregister(&state, &response.player_id).await.unwrap();

        let store = state.require_row_store().await.unwrap();
        assert!(store.find_player(response.player_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let state = setup().await;
        let request = RegisterPlayerRequest {
            player_id: Some("twice".into()),
        };
        register(&state, request).await.unwrap();

        let err = register(
            &state,
            RegisterPlayerRequest {
                player_id: Some("twice".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn heartbeat_advances_last_seen() {
        let state = setup().await;
        register(
            &state,
            RegisterPlayerRequest {
                player_id: Some("p1".into()),
            },
        )
        .await
        .unwrap();

        let store = state.require_row_store().await.unwrap();
        let before = store.find_player("p1".into()).await.unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        heartbeat(&state, "p1").await.unwrap();
        let after = store.find_player("p1".into()).await.unwrap().unwrap();
        assert!(after.last_seen > before.last_seen);
    }

    #[tokio::test]
    async fn deregistering_a_missing_player_is_a_no_op() {
        let state = setup().await;
        assert!(deregister(&state, "ghost").await.is_ok());
    }

    #[tokio::test]
    async fn heartbeat_for_a_missing_player_is_not_found() {
        let state = setup().await;
        assert!(matches!(
            heartbeat(&state, "ghost").await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn registration_requires_a_store() {
        let state = AppState::new(AppConfig::default());
        let err = register(&state, RegisterPlayerRequest { player_id: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
