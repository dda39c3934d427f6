//! # Load Transactions
//!
//! A load transaction lets one asynchronous operation populate many entries and commit them
//! together. The protocol, driven by [`execute`]:
//!
//! 1. Keep only the requested references that still need fetching against live state. If
//!    none survive, nothing is dispatched.
//! 2. Dispatch `LoadingStarted` for the survivors before any I/O begins.
//! 3. Run the handler with a [`LoadTransaction`]. `receive` / `error` may be called for any
//!    reference, any number of times; the last call per reference wins.
//! 4. After the handler settles, every requested reference without a result gets one: the
//!    handler's error if it failed, otherwise [`ResourceError::MissingResult`].
//! 5. Dispatch exactly one `Received` action with every recorded result. That dispatch is
//!    the commit point.
//!
//! Step 5 runs whether or not the handler failed. A handler failure is also returned to the
//! caller as [`KitError::Load`]; a handler panic counts as a failure.
//!
//! Steps 1 to 5 run in a task of their own. Once a reference is claimed, its `Received`
//! commit happens even if the caller stops waiting (a timeout, a dropped future).

use crate::error::{KitError, ResourceError};
use crate::message::{FetchResult, ResourceAction, ResultEntry};
use crate::model::{should_fetch, AnyReference, ResourceReference};
use crate::state::Selector;
use crate::store::StateStore;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinError;
use tracing::{debug, info, warn, Instrument};

#[derive(Default)]
struct ResultLog {
    entries: Vec<ResultEntry>,
    index: HashMap<AnyReference, usize>,
    sealed: bool,
}

impl ResultLog {
    fn put(&mut self, reference: AnyReference, result: FetchResult) {
        if self.sealed {
            warn!(%reference, "Result supplied after commit, ignored");
            return;
        }
        match self.index.get(&reference) {
            Some(&slot) => self.entries[slot].result = result,
            None => {
                self.index.insert(reference.clone(), self.entries.len());
                self.entries.push(ResultEntry { reference, result });
            }
        }
    }
}

/// The handle a loader uses to record results.
///
/// Cheap to clone; every clone records into the same transaction.
#[derive(Clone, Default)]
pub struct LoadTransaction {
    log: Arc<Mutex<ResultLog>>,
}

impl LoadTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful result for any reference.
    pub fn receive<T: Send + Sync + 'static>(&self, reference: &ResourceReference<T>, value: T) {
        self.put(reference.erase(), FetchResult::Completed(Arc::new(value)));
    }

    /// Records a failed result for any reference.
    pub fn error<T: Send + Sync + 'static>(
        &self,
        reference: &ResourceReference<T>,
        error: impl Into<ResourceError>,
    ) {
        self.put(reference.erase(), FetchResult::Error(error.into()));
    }

    /// True if a result is already recorded for `reference`.
    pub fn has_result(&self, reference: &AnyReference) -> bool {
        self.lock().index.contains_key(reference)
    }

    pub(crate) fn put(&self, reference: AnyReference, result: FetchResult) {
        self.lock().put(reference, result);
    }

    /// Records `result` only if nothing is recorded for `reference` yet.
    pub(crate) fn put_if_absent(&self, reference: AnyReference, result: FetchResult) {
        let mut log = self.lock();
        if !log.index.contains_key(&reference) {
            log.put(reference, result);
        }
    }

    /// Fills the gaps for `requested`, closes the transaction, and hands back its entries.
    fn seal(&self, requested: &[AnyReference], fallback: Option<&ResourceError>) -> Vec<ResultEntry> {
        let mut log = self.lock();
        for reference in requested {
            if log.index.contains_key(reference) {
                continue;
            }
            let error = match fallback {
                Some(error) => error.clone(),
                None => ResourceError::MissingResult {
                    reference: reference.to_string(),
                },
            };
            log.put(reference.clone(), FetchResult::Error(error));
        }
        log.sealed = true;
        log.index.clear();
        std::mem::take(&mut log.entries)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResultLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs the transaction protocol against `store`, reading resources through `select`.
///
/// `gate` serializes the re-filter and the `LoadingStarted` dispatch of concurrent
/// transactions, so a reference can only be claimed by one of them. `handler` receives the
/// surviving references in request order.
pub async fn execute<S, F, Fut>(
    store: &S,
    select: Selector<S::State>,
    gate: &Arc<AsyncMutex<()>>,
    references: Vec<AnyReference>,
    handler: F,
) -> Result<(), KitError>
where
    S: StateStore,
    F: FnOnce(Vec<AnyReference>, LoadTransaction) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ResourceError>> + Send + 'static,
{
    let transaction = run(store.clone(), select, Arc::clone(gate), references, handler);
    tokio::spawn(transaction.in_current_span())
        .await
        .map_err(|e| KitError::TransactionAborted(e.to_string()))?
}

async fn run<S, F, Fut>(
    store: S,
    select: Selector<S::State>,
    gate: Arc<AsyncMutex<()>>,
    references: Vec<AnyReference>,
    handler: F,
) -> Result<(), KitError>
where
    S: StateStore,
    F: FnOnce(Vec<AnyReference>, LoadTransaction) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ResourceError>> + Send + 'static,
{
    let start_time = Utc::now();
    let requested = {
        let _claim = gate.lock().await;
        let snapshot = store.get_state();
        let state = select(&snapshot);
        let mut seen = HashSet::new();
        let requested: Vec<AnyReference> = references
            .into_iter()
            .filter(|reference| seen.insert(reference.clone()))
            .filter(|reference| should_fetch(&state.get_erased(reference)))
            .collect();
        if requested.is_empty() {
            debug!("Nothing stale, transaction skipped");
            return Ok(());
        }
        store
            .dispatch(ResourceAction::LoadingStarted {
                start_time,
                references: requested.clone(),
            })
            .await?;
        requested
    };

    let tx = LoadTransaction::new();
    let handler_task = {
        let (requested, tx) = (requested.clone(), tx.clone());
        tokio::spawn(async move { handler(requested, tx).await }.in_current_span())
    };
    let outcome = handler_task
        .await
        .unwrap_or_else(|e| Err(handler_failure(e)));
    if let Err(e) = &outcome {
        warn!(error = %e, requested = requested.len(), "Load failed");
    }

    let result_entries = tx.seal(&requested, outcome.as_ref().err());
    let errors = result_entries
        .iter()
        .filter(|entry| !entry.result.is_completed())
        .count();
    let received = result_entries.len();
    store
        .dispatch(ResourceAction::Received {
            start_time,
            finish_time: Utc::now(),
            result_entries,
        })
        .await
        .inspect_err(|e| warn!(error = %e, "Commit failed"))?;
    info!(requested = requested.len(), received, errors, "Transaction committed");

    outcome.map_err(KitError::Load)
}

/// Turns a handler task that did not finish normally into the error stored on its entries.
fn handler_failure(error: JoinError) -> ResourceError {
    if !error.is_panic() {
        return ResourceError::message("Loader cancelled");
    }
    let payload = error.into_panic();
    let reason = payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string payload".to_string());
    ResourceError::message(format!("Loader panicked: {reason}"))
}
