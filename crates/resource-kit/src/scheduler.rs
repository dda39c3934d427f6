//! # Batching Scheduler
//!
//! Coalesces stale keys of the same resource type that show up within a short window into
//! one load call.
//!
//! For each resource type there is at most one *open* batch. A key joins the open batch if
//! it has room (fewer than `max_batch_size` keys); otherwise a new batch is opened and the
//! full one is left to its own timer. Every batch flushes once, `window` after it was
//! opened, handing its keys to the flush callback supplied when it was opened.
//!
//! With batching disabled for a type, each key is flushed on its own right away.

use crate::model::{BatchPolicy, ResourceTypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

struct PendingBatch {
    generation: u64,
    keys: Arc<Mutex<Vec<String>>>,
}

#[derive(Default)]
struct Pending {
    open: HashMap<ResourceTypeId, PendingBatch>,
    next_generation: u64,
}

struct SchedulerInner {
    window: Duration,
    pending: Mutex<Pending>,
}

/// Per-cache batch accumulator. Clones share the same pending batches.
#[derive(Clone)]
pub struct BatchScheduler {
    inner: Arc<SchedulerInner>,
}

impl BatchScheduler {
    /// `window` is how long a batch stays open after its first key.
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                window,
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Adds a stale key for `type_id`.
    ///
    /// `flush` is only used if this key opens a new batch (or batching is disabled); it is
    /// spawned on the Tokio runtime with the batch's keys once the batch is due.
    pub fn schedule<F, Fut>(&self, type_id: ResourceTypeId, policy: BatchPolicy, key: String, flush: F)
    where
        F: FnOnce(Vec<String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !policy.enabled {
            debug!(%type_id, %key, "Batching disabled, flushing immediately");
            tokio::spawn(flush(vec![key]));
            return;
        }

        let (generation, keys) = {
            let mut pending = self.lock();
            if let Some(batch) = pending.open.get(&type_id) {
                let mut keys = batch.keys.lock().unwrap_or_else(PoisonError::into_inner);
                if keys.contains(&key) {
                    return;
                }
                let has_room = policy
                    .max_batch_size
                    .map_or(true, |max| keys.len() < max.get());
                if has_room {
                    keys.push(key);
                    debug!(%type_id, size = keys.len(), "Key joined batch");
                    return;
                }
            }

            let generation = pending.next_generation;
            pending.next_generation += 1;
            let keys = Arc::new(Mutex::new(vec![key]));
            pending.open.insert(
                type_id,
                PendingBatch {
                    generation,
                    keys: Arc::clone(&keys),
                },
            );
            debug!(%type_id, generation, "Batch opened");
            (generation, keys)
        };

        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(scheduler.inner.window).await;
            scheduler.close(type_id, generation);
            let keys = std::mem::take(&mut *keys.lock().unwrap_or_else(PoisonError::into_inner));
            debug!(%type_id, generation, size = keys.len(), "Batch flushed");
            flush(keys).await;
        });
    }

    /// Keys waiting in the open batch for `type_id`.
    pub fn pending_keys(&self, type_id: ResourceTypeId) -> Vec<String> {
        self.lock()
            .open
            .get(&type_id)
            .map(|batch| batch.keys.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Removes the open batch for `type_id`, unless it has already been superseded by a
    /// newer one.
    fn close(&self, type_id: ResourceTypeId, generation: u64) {
        let mut pending = self.lock();
        if pending
            .open
            .get(&type_id)
            .is_some_and(|batch| batch.generation == generation)
        {
            pending.open.remove(&type_id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceType;
    use std::num::NonZeroUsize;
    use tokio::sync::mpsc;

    fn policy(max: Option<usize>) -> BatchPolicy {
        BatchPolicy {
            enabled: true,
            max_batch_size: max.and_then(NonZeroUsize::new),
        }
    }

    fn schedule_into(
        scheduler: &BatchScheduler,
        type_id: ResourceTypeId,
        policy: BatchPolicy,
        key: &str,
        flushed: &mpsc::UnboundedSender<Vec<String>>,
    ) {
        let flushed = flushed.clone();
        scheduler.schedule(type_id, policy, key.to_string(), move |keys| async move {
            let _ = flushed.send(keys);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_within_window_share_one_batch() {
        let scheduler = BatchScheduler::new(Duration::from_millis(16));
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let (sender, mut flushed) = mpsc::unbounded_channel();

        for key in ["t1", "t2", "t1", "t3"] {
            schedule_into(&scheduler, tasks.id(), policy(None), key, &sender);
        }
        assert_eq!(scheduler.pending_keys(tasks.id()), vec!["t1", "t2", "t3"]);

        let batch = flushed.recv().await.unwrap();
        assert_eq!(batch, vec!["t1", "t2", "t3"]);
        assert!(scheduler.pending_keys(tasks.id()).is_empty());
        assert!(flushed.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_batch_size_splits_batches() {
        let scheduler = BatchScheduler::new(Duration::from_millis(16));
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let (sender, mut flushed) = mpsc::unbounded_channel();

        for key in ["t1", "t2", "t3"] {
            schedule_into(&scheduler, tasks.id(), policy(Some(2)), key, &sender);
        }

        let mut batches = vec![flushed.recv().await.unwrap(), flushed.recv().await.unwrap()];
        batches.sort_by_key(|b| std::cmp::Reverse(b.len()));
        assert_eq!(batches, vec![vec!["t1", "t2"], vec!["t3"]]);
        assert!(flushed.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_types_batch_independently() {
        let scheduler = BatchScheduler::new(Duration::from_millis(16));
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let projects: ResourceType<String> = ResourceType::new("Project").unwrap();
        let (sender, mut flushed) = mpsc::unbounded_channel();

        schedule_into(&scheduler, tasks.id(), policy(None), "x", &sender);
        schedule_into(&scheduler, projects.id(), policy(None), "x", &sender);

        assert_eq!(flushed.recv().await.unwrap(), vec!["x"]);
        assert_eq!(flushed.recv().await.unwrap(), vec!["x"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_batching_flushes_each_key() {
        let scheduler = BatchScheduler::new(Duration::from_secs(60));
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let (sender, mut flushed) = mpsc::unbounded_channel();
        let unbatched = BatchPolicy {
            enabled: false,
            max_batch_size: None,
        };

        schedule_into(&scheduler, tasks.id(), unbatched, "t1", &sender);
        schedule_into(&scheduler, tasks.id(), unbatched, "t2", &sender);

        assert_eq!(flushed.recv().await.unwrap(), vec!["t1"]);
        assert_eq!(flushed.recv().await.unwrap(), vec!["t2"]);
        assert!(scheduler.pending_keys(tasks.id()).is_empty());
    }
}
