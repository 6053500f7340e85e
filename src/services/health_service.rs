use tracing::warn;

use crate::{dao::row_store::RowStore, dto::health::HealthResponse, state::SharedState};

/// Probe the installed row store and fold the result into the health payload.
///
/// A store that is installed but failing its ping is reported as degraded,
/// matching what command handlers will see on their next query.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Ok(store) = state.require_row_store().await else {
        warn!("health probe: no row store installed");
        return HealthResponse::degraded();
    };

    match store.health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "health probe: row store ping failed");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::row_store::memory::MemoryRowStore, dto::health::HealthStatus,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_a_store_and_ok_with_one() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);

        state.install_row_store(Arc::new(MemoryRowStore::new())).await;
        assert_eq!(health_status(&state).await.status, HealthStatus::Ok);
    }
}
