pub mod countdown;
mod sse;
pub mod state_machine;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::row_store::RowStore, error::ServiceError};

pub use self::sse::RowChangeHub;
use self::countdown::CountdownRegistry;

pub type SharedState = Arc<AppState>;

/// Central application state holding the storage handle, the row-change hub
/// and the countdown task registry.
pub struct AppState {
    config: AppConfig,
    row_store: RwLock<Option<Arc<dyn RowStore>>>,
    hub: RowChangeHub,
    countdowns: CountdownRegistry,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let hub = RowChangeHub::new(config.subscription_capacity);
        Arc::new(Self {
            config,
            row_store: RwLock::new(None),
            hub,
            countdowns: CountdownRegistry::new(),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current row store, if one is installed.
    pub async fn row_store(&self) -> Option<Arc<dyn RowStore>> {
        let guard = self.row_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current row store or fail with a degraded-mode error.
    pub async fn require_row_store(&self) -> Result<Arc<dyn RowStore>, ServiceError> {
        self.row_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new row store implementation and leave degraded mode.
    pub async fn install_row_store(&self, store: Arc<dyn RowStore>) {
        {
            let mut guard = self.row_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current row store and enter degraded mode.
    pub async fn clear_row_store(&self) {
        {
            let mut guard = self.row_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Hub fanning out per-row change notifications to SSE subscribers.
    pub fn hub(&self) -> &RowChangeHub {
        &self.hub
    }

    /// Registry of running countdown tasks keyed by race id.
    pub fn countdowns(&self) -> &CountdownRegistry {
        &self.countdowns
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }
}
