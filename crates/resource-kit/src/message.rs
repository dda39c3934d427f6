//! # Store Actions & Messages
//!
//! [`ResourceAction`] is the whole vocabulary between the cache and the state store: every
//! change to an entry is one of these two actions, applied by
//! [`reduce`](crate::state::reduce).
//!
//! [`StoreRequest`] is the envelope the [`StoreClient`](crate::StoreClient) sends to the
//! [`StoreActor`](crate::StoreActor).

use crate::error::{KitError, ResourceError};
use crate::model::{AnyData, AnyReference};
use chrono::{DateTime, Utc};
use std::convert::Infallible;
use std::fmt;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the store actor.
pub type Response<T> = oneshot::Sender<Result<T, KitError>>;

/// The outcome recorded for one reference inside a load transaction.
#[derive(Clone)]
pub enum FetchResult {
    Completed(AnyData),
    Error(ResourceError),
}

impl FetchResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, FetchResult::Completed(_))
    }
}

impl fmt::Debug for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchResult::Completed(_) => f.write_str("Completed(..)"),
            FetchResult::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultEntry {
    pub reference: AnyReference,
    pub result: FetchResult,
}

/// Actions understood by the resource reducer.
#[derive(Debug, Clone)]
pub enum ResourceAction {
    /// For each reference: `loading = true`, `outdated = false`; data and error are kept.
    LoadingStarted {
        start_time: DateTime<Utc>,
        references: Vec<AnyReference>,
    },
    /// For each entry: `loading = false`; `Completed` sets data and clears error, `Error`
    /// sets error and keeps data. Entries with no prior state start from FRESH.
    Received {
        start_time: DateTime<Utc>,
        finish_time: DateTime<Utc>,
        result_entries: Vec<ResultEntry>,
    },
}

impl ResourceAction {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceAction::LoadingStarted { .. } => "Resource loading started",
            ResourceAction::Received { .. } => "Resource received",
        }
    }

    /// Number of references the action touches.
    pub fn len(&self) -> usize {
        match self {
            ResourceAction::LoadingStarted { references, .. } => references.len(),
            ResourceAction::Received { result_entries, .. } => result_entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn touches(&self, reference: &AnyReference) -> bool {
        match self {
            ResourceAction::LoadingStarted { references, .. } => references.contains(reference),
            ResourceAction::Received { result_entries, .. } => {
                result_entries.iter().any(|e| &e.reference == reference)
            }
        }
    }
}

/// Internal message type sent to the store actor.
///
/// `A` is the host application's action type, see [`HostState`](crate::state::HostState).
#[derive(Debug)]
pub enum StoreRequest<A = Infallible> {
    Dispatch {
        action: ResourceAction,
        respond_to: Response<()>,
    },
    Host {
        action: A,
        respond_to: Response<()>,
    },
}
