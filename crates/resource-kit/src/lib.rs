//! # Resource Kit
//!
//! A client-side resource cache. Remote data (projects, tasks, anything addressable by a
//! string key) is held in one central state store, keyed by *resource reference*. Consumers
//! subscribe to references; stale references are coalesced into batched load calls; the
//! results of each load are committed to the store as one atomic action.
//!
//! ## Architecture Overview
//!
//! The crate separates concerns into four layers:
//!
//! 1. **Model** ([`ResourceType`], [`ResourceReference`], [`ResourceEntry`]) - what is cached
//!    and how fresh it is
//! 2. **Store** ([`StoreActor`], [`StoreClient`], [`reduce`]) - the single owner of
//!    [`ResourcesState`], applying actions sequentially and publishing snapshots. The
//!    resource state can also sit inside a larger application state ([`HostState`])
//! 3. **Loading** ([`BatchScheduler`], [`LoadTransaction`], [`ResourceLoader`]) - deciding
//!    what to fetch, when, and committing what came back
//! 4. **Integration** ([`ResourceCache`], [`ResourceSubscription`]) - the API consumers use
//!
//! ## Entry Lifecycle
//!
//! Every reference maps to an entry with two flags, `loading` and `outdated`:
//!
//! | State | loading | outdated | Meaning |
//! |-------|---------|----------|---------|
//! | NULL | false | true | never seen; needs a fetch |
//! | in flight | true | false | a transaction has claimed it |
//! | FRESH | false | false | last load committed (with data or error) |
//!
//! [`should_fetch`] is true only for entries that are outdated and not loading. That single
//! predicate, evaluated against live state, keeps concurrent consumers from fetching the
//! same reference twice.
//!
//! ## Quick Start
//!
//! ```rust
//! use resource_kit::{CacheConfig, ResourceCache, ResourceType, StoreActor};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Task { title: String }
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. Start the store
//!     let (actor, store) = StoreActor::new(32);
//!     let handle = tokio::spawn(actor.run());
//!
//!     // 2. Declare a resource type with a batched loader
//!     let tasks = ResourceType::<Task>::builder("Task")
//!         .load_fn(|_tasks, ids, _tx| async move {
//!             Ok(ids.into_iter().map(|id| Task { title: format!("Task {id}") }).collect())
//!         })
//!         .max_batch_size(10)
//!         .build()
//!         .unwrap();
//!
//!     // 3. Subscribe and wait for the load to commit
//!     let cache = ResourceCache::new(store, &CacheConfig::default()).unwrap();
//!     let mut t1 = cache.subscribe(tasks.reference("t1"));
//!     let view = t1.settled().await.unwrap();
//!     assert_eq!(view.data.as_ref().map(|t| t.title.as_str()), Some("Task t1"));
//!
//!     // 4. Shut down: drop every store handle, then await the actor
//!     drop(t1);
//!     drop(cache);
//!     handle.await.unwrap();
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - The store actor runs in its own Tokio task and applies actions **sequentially**
//! - Reads go to the latest published snapshot and never block on the actor
//! - Loaders run concurrently with each other and with the store
//! - A per-cache gate makes "check staleness, then mark loading" atomic across transactions
//!
//! ## Testing
//!
//! The [`mock`] module provides [`RecordingStore`](mock::RecordingStore) for counting
//! dispatches and [`ScriptedLoader`](mock::ScriptedLoader) for counting load calls without a
//! backend.

pub mod actor;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod loader;
pub mod message;
pub mod mock;
pub mod model;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod subscription;
pub mod tracing;
pub mod transaction;

// Re-export core types for convenience
pub use actor::StoreActor;
pub use cache::ResourceCache;
pub use client::StoreClient;
pub use config::CacheConfig;
pub use error::{KitError, ResourceError};
pub use loader::{LoaderFn, ResourceLoader};
pub use message::{FetchResult, ResourceAction, Response, ResultEntry, StoreRequest};
pub use model::{
    should_fetch, AnyData, AnyReference, BatchPolicy, ErasedEntry, ResourceEntry,
    ResourceReference, ResourceType, ResourceTypeBuilder, ResourceTypeId,
};
pub use scheduler::BatchScheduler;
pub use state::{reduce, HostState, ResourcesState, Selector};
pub use store::StateStore;
pub use subscription::{ResourceSubscription, ResourceView};
pub use transaction::LoadTransaction;
