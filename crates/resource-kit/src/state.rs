//! # Resource State
//!
//! The store's view of every resource: a two-level map `resource type -> key -> entry`.
//!
//! [`ResourcesState`] is a persistent value. [`reduce`] never mutates its input; it returns
//! a new state that shares every untouched per-type table with the old one (`Arc` +
//! copy-on-write), so snapshots handed out to readers stay valid while later actions are
//! applied.
//!
//! ## Embedding in a larger state
//!
//! The store does not have to hold a bare `ResourcesState`. An application can keep it as
//! one field of its own state type by implementing [`HostState`]: the store then calls
//! [`HostState::reduce_resources`] for resource actions and [`HostState::reduce_host`] for
//! the application's own actions, and the cache reads the resource part back through a
//! [`Selector`].

use crate::message::{FetchResult, ResourceAction};
use crate::model::{AnyReference, ErasedEntry, ResourceEntry, ResourceReference, ResourceTypeId};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// Locates the resource state inside a host state.
pub type Selector<H> = fn(&H) -> &ResourcesState;

/// A state type the store actor can own, with the resource state embedded somewhere in it.
pub trait HostState: Send + Sync + 'static {
    /// The application's own actions. [`Infallible`] if it has none.
    type Action: fmt::Debug + Send + 'static;

    /// Applies a resource action to the embedded [`ResourcesState`], usually by running
    /// [`reduce`] on that field and carrying every other field over.
    fn reduce_resources(&self, action: &ResourceAction) -> Self;

    /// Applies an application action.
    fn reduce_host(&self, action: &Self::Action) -> Self;
}

impl HostState for ResourcesState {
    type Action = Infallible;

    fn reduce_resources(&self, action: &ResourceAction) -> Self {
        reduce(self, action)
    }

    fn reduce_host(&self, action: &Infallible) -> Self {
        match *action {}
    }
}

/// The selector for a store that holds nothing but resources.
pub fn whole(state: &ResourcesState) -> &ResourcesState {
    state
}

#[derive(Clone)]
struct TypeTable {
    name: Arc<str>,
    entries: HashMap<String, ErasedEntry>,
}

/// Snapshot of all resource entries.
#[derive(Clone, Default)]
pub struct ResourcesState {
    types: HashMap<ResourceTypeId, Arc<TypeTable>>,
}

impl ResourcesState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `reference`, or NULL if the store has never seen it.
    pub fn get<T: Send + Sync + 'static>(&self, reference: &ResourceReference<T>) -> ResourceEntry<T> {
        self.lookup(reference.resource_type().id(), reference.key())
            .map(|entry| entry.downcast::<T>())
            .unwrap_or_default()
    }

    /// Type-erased variant of [`get`](Self::get).
    pub fn get_erased(&self, reference: &AnyReference) -> ErasedEntry {
        self.lookup(reference.type_id(), reference.key())
            .cloned()
            .unwrap_or_default()
    }

    /// True if an entry was ever created for `reference`.
    pub fn contains(&self, reference: &AnyReference) -> bool {
        self.lookup(reference.type_id(), reference.key()).is_some()
    }

    /// Number of stored entries across all types.
    pub fn len(&self) -> usize {
        self.types.values().map(|table| table.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys stored for one type, sorted.
    pub fn keys(&self, type_id: ResourceTypeId) -> Vec<String> {
        let mut keys: Vec<String> = self
            .types
            .get(&type_id)
            .map(|table| table.entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn type_name(&self, type_id: ResourceTypeId) -> Option<&str> {
        self.types.get(&type_id).map(|table| &*table.name)
    }

    fn lookup(&self, type_id: ResourceTypeId, key: &str) -> Option<&ErasedEntry> {
        self.types.get(&type_id)?.entries.get(key)
    }

    fn entry_mut(
        &mut self,
        reference: &AnyReference,
        base: fn() -> ErasedEntry,
    ) -> &mut ErasedEntry {
        let table = self
            .types
            .entry(reference.type_id())
            .or_insert_with(|| {
                Arc::new(TypeTable {
                    name: reference.shared_type_name(),
                    entries: HashMap::new(),
                })
            });
        Arc::make_mut(table)
            .entries
            .entry(reference.key().to_string())
            .or_insert_with(base)
    }
}

/// Applies one action to a state, producing the next state.
///
/// Pure: the result depends only on `(state, action)`, and entries the action does not
/// name are carried over unchanged.
pub fn reduce(state: &ResourcesState, action: &ResourceAction) -> ResourcesState {
    let mut next = state.clone();
    match action {
        ResourceAction::LoadingStarted { references, .. } => {
            for reference in references {
                let entry = next.entry_mut(reference, ResourceEntry::null);
                entry.outdated = false;
                entry.loading = true;
            }
        }
        ResourceAction::Received { result_entries, .. } => {
            for result_entry in result_entries {
                let entry = next.entry_mut(&result_entry.reference, ResourceEntry::fresh);
                entry.loading = false;
                match &result_entry.result {
                    FetchResult::Completed(data) => {
                        entry.error = None;
                        entry.data = Some(Arc::clone(data));
                    }
                    FetchResult::Error(error) => {
                        entry.error = Some(error.clone());
                    }
                }
            }
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceError;
    use crate::message::ResultEntry;
    use crate::model::ResourceType;
    use chrono::Utc;

    fn started(references: Vec<AnyReference>) -> ResourceAction {
        ResourceAction::LoadingStarted {
            start_time: Utc::now(),
            references,
        }
    }

    fn received(entries: Vec<(AnyReference, FetchResult)>) -> ResourceAction {
        ResourceAction::Received {
            start_time: Utc::now(),
            finish_time: Utc::now(),
            result_entries: entries
                .into_iter()
                .map(|(reference, result)| ResultEntry { reference, result })
                .collect(),
        }
    }

    fn completed(value: &str) -> FetchResult {
        FetchResult::Completed(Arc::new(value.to_string()))
    }

    #[test]
    fn test_unknown_reference_reads_null() {
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let state = ResourcesState::new();
        let entry = state.get(&tasks.reference("t1"));
        assert!(entry.outdated && !entry.loading);
        assert!(entry.data.is_none() && entry.error.is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_loading_started_then_completed() {
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let t1 = tasks.reference("t1");

        let state = reduce(&ResourcesState::new(), &started(vec![t1.erase()]));
        let entry = state.get(&t1);
        assert!(entry.loading && !entry.outdated);

        let state = reduce(&state, &received(vec![(t1.erase(), completed("write docs"))]));
        let entry = state.get(&t1);
        assert!(!entry.loading && !entry.outdated);
        assert!(entry.error.is_none());
        assert_eq!(entry.data.as_deref().map(String::as_str), Some("write docs"));
    }

    #[test]
    fn test_error_keeps_previous_data() {
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let t1 = tasks.reference("t1");

        let state = reduce(&ResourcesState::new(), &received(vec![(t1.erase(), completed("v1"))]));
        let state = reduce(&state, &started(vec![t1.erase()]));
        let state = reduce(
            &state,
            &received(vec![(
                t1.erase(),
                FetchResult::Error(ResourceError::message("timeout")),
            )]),
        );

        let entry = state.get(&t1);
        assert!(!entry.loading);
        assert_eq!(entry.data.as_deref().map(String::as_str), Some("v1"));
        assert_eq!(entry.error.map(|e| e.to_string()).as_deref(), Some("timeout"));

        // A later success clears the error.
        let state = reduce(&state, &received(vec![(t1.erase(), completed("v2"))]));
        let entry = state.get(&t1);
        assert!(entry.error.is_none());
        assert_eq!(entry.data.as_deref().map(String::as_str), Some("v2"));
    }

    #[test]
    fn test_side_data_starts_from_fresh() {
        let projects: ResourceType<String> = ResourceType::new("Project").unwrap();
        let a = projects.reference("a");

        let state = reduce(&ResourcesState::new(), &received(vec![(a.erase(), completed("Alpha"))]));
        let entry = state.get(&a);
        assert!(!entry.outdated && !entry.loading);
        assert!(!entry.should_fetch());
    }

    #[test]
    fn test_reduce_keeps_unrelated_entries_and_input() {
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let projects: ResourceType<String> = ResourceType::new("Project").unwrap();

        let before = reduce(
            &ResourcesState::new(),
            &received(vec![
                (tasks.reference("t1").erase(), completed("one")),
                (projects.reference("p1").erase(), completed("project")),
            ]),
        );
        let after = reduce(&before, &started(vec![tasks.reference("t2").erase()]));

        assert_eq!(after.len(), 3);
        assert_eq!(after.keys(tasks.id()), vec!["t1", "t2"]);
        assert_eq!(
            after.get(&projects.reference("p1")).data.as_deref().map(String::as_str),
            Some("project")
        );
        // The previous snapshot is untouched.
        assert_eq!(before.len(), 2);
        assert!(!before.contains(&tasks.reference("t2").erase()));
        assert_eq!(before.type_name(projects.id()), Some("Project"));
    }
}
