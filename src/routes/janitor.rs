use axum::{Router, extract::State, http::StatusCode, routing::post};

use crate::{error::AppError, services::janitor_service, state::SharedState};

#[utoipa::path(
    post,
    path = "/janitor",
    responses(
        (status = 200, description = "Sweep completed; removal counts are logged"),
        (status = 503, description = "Storage unavailable (degraded mode)"),
    )
)]
/// Trigger a retention sweep over stale player and race rows.
///
/// The body is empty; external schedulers only care about the status code.
pub async fn run_janitor(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    janitor_service::sweep(&state).await?;
    Ok(StatusCode::OK)
}

/// Configure the janitor trigger route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/janitor", post(run_janitor))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::row_store::memory::MemoryRowStore, state::AppState};

    #[tokio::test]
    async fn sweep_trigger_answers_with_a_bare_ok() {
        let state = AppState::new(AppConfig::default());
        state.install_row_store(Arc::new(MemoryRowStore::new())).await;

        let status = run_janitor(State(state)).await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
}
