//! # System Lifecycle
//!
//! [`AppSystem`] is the composition root of the sample: it starts the store actor, builds
//! the cache and the resource types on top of it, and tears everything down again.
//!
//! ## Startup
//!
//! 1. **Store** - spawn a [`StoreActor`] over an empty [`AppState`] with the configured
//!    channel capacity
//! 2. **Cache** - wrap the store client in a [`ResourceCache`] that reads
//!    [`AppState::resources`] (validating the config)
//! 3. **Resources** - build `ProjectList`, `Project` and `Task` against the [`MockApi`]
//!
//! ## Graceful Shutdown
//!
//! The store actor stops once every [`StoreClient`] is gone. A store client is held by the
//! cache and its clones, by the effect task of every live subscription, by batches still
//! waiting in the scheduler and by transactions still running. Drop every subscription
//! before calling [`AppSystem::shutdown`]; otherwise their effect tasks keep the store
//! alive and the shutdown does not return. Pending batches and transactions finish on
//! their own.
//!
//! ```rust,ignore
//! let system = AppSystem::new(MockApi::seeded(latency), &CacheConfig::from_env())?;
//! let mut projects = system.cache.subscribe(system.resources.project_list.reference(ALL_PROJECTS));
//! projects.settled().await?;
//! drop(projects);
//! system.shutdown().await?;
//! ```

use crate::api::MockApi;
use crate::app_state::{AppState, UiAction, UiState};
use crate::resources::Resources;
use resource_kit::{CacheConfig, KitError, ResourceCache, StateStore, StoreActor, StoreClient};
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use resource_kit::tracing::setup_tracing;

pub struct AppSystem {
    pub cache: ResourceCache<StoreClient<AppState>>,
    pub resources: Resources,
    pub api: MockApi,
    store_handle: JoinHandle<()>,
}

impl AppSystem {
    pub fn new(api: MockApi, config: &CacheConfig) -> Result<Self, KitError> {
        config.validate()?;
        let (store_actor, store_client) =
            StoreActor::with_state(AppState::default(), config.store_buffer);
        let store_handle = tokio::spawn(store_actor.run());
        let cache = ResourceCache::with_selector(store_client, AppState::resources, config)?;
        let resources = Resources::new(api.clone())?;
        info!(
            batch_window_ms = config.batch_window_ms,
            store_buffer = config.store_buffer,
            "System started"
        );

        Ok(Self {
            cache,
            resources,
            api,
            store_handle,
        })
    }

    /// Applies a UI action to the store, next to the cached resources.
    pub async fn dispatch_ui(&self, action: UiAction) -> Result<(), KitError> {
        self.cache.store().dispatch_host(action).await
    }

    pub fn ui(&self) -> UiState {
        self.cache.store().get_state().ui.clone()
    }

    /// Drops the cache and waits for the store actor to finish.
    ///
    /// Every subscription must be dropped first: their effect tasks hold clones of the
    /// cache, and the store actor only stops once the last one is gone. Returns an error
    /// if the store task panicked.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");
        drop(self.cache);

        if let Err(e) = self.store_handle.await {
            error!(error = %e, "Store task failed");
            return Err(format!("Store task failed: {e}"));
        }
        info!("System shutdown complete");
        Ok(())
    }
}
