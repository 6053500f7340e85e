//! TypeRush Back binary entrypoint wiring the command API, SSE streams and the storage layer.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use typerush_back::{
    config::AppConfig,
    dao::row_store::memory::MemoryRowStore,
    routes,
    services::janitor_service,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let janitor_interval = config.janitor_interval;
    let state = AppState::new(config);

    install_storage(state.clone()).await;

    if let Some(period) = janitor_interval {
        info!(period_secs = period.as_secs(), "starting in-process janitor");
        tokio::spawn(janitor_service::run_periodic(state.clone(), period));
    }

    let app = build_router(state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the MongoDB-backed store when `MONGO_URI` is set, falling back to
/// the in-memory store otherwise.
#[cfg(feature = "mongo-store")]
async fn install_storage(state: SharedState) {
    use typerush_back::{
        dao::{
            row_store::{
                RowStore,
                mongodb::{MongoConfig, MongoRowStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let Ok(uri) = env::var("MONGO_URI") else {
        info!("MONGO_URI not set; using the in-memory row store");
        state.install_row_store(Arc::new(MemoryRowStore::new())).await;
        return;
    };
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoRowStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn RowStore>)
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
async fn install_storage(state: SharedState) {
    info!("built without mongo-store; using the in-memory row store");
    state.install_row_store(Arc::new(MemoryRowStore::new())).await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
