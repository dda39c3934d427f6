//! # Resource Model
//!
//! Resource types, references, and the per-reference entry the store keeps.
//!
//! A [`ResourceType`] is created once per kind of resource (e.g. `Task`) and held for the
//! lifetime of the process. Its identity is a [`ResourceTypeId`] allocated at construction,
//! not its name, so two types that happen to share a name never alias each other's entries.
//!
//! A [`ResourceReference`] is `(type, key)`. References are recreated on every read, so
//! equality and hashing are structural over `(type id, key)`.
//!
//! ```rust
//! use resource_kit::ResourceType;
//!
//! let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
//! assert_eq!(tasks.reference("t1"), tasks.reference("t1"));
//! assert_eq!(tasks.reference("t1").to_string(), "Task:t1");
//! ```

use crate::error::{KitError, ResourceError};
use crate::loader::{LoaderFn, ResourceLoader};
use crate::transaction::LoadTransaction;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Type-erased resource payload as held by the store.
pub type AnyData = Arc<dyn Any + Send + Sync>;

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`ResourceType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceTypeId(u64);

impl ResourceTypeId {
    fn next() -> Self {
        Self(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type_{}", self.0)
    }
}

/// How stale keys of one type are grouped into load calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// When false every stale key gets its own transaction immediately.
    pub enabled: bool,
    /// `None` means unbounded.
    pub max_batch_size: Option<NonZeroUsize>,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_batch_size: None,
        }
    }
}

struct TypeInner<T> {
    id: ResourceTypeId,
    name: Arc<str>,
    loader: Option<Arc<dyn ResourceLoader<T>>>,
    batch: BatchPolicy,
}

/// A category of resource together with its load configuration.
///
/// Cloning is cheap and keeps the identity: clones compare equal and address the same
/// entries in the store.
pub struct ResourceType<T> {
    inner: Arc<TypeInner<T>>,
}

impl<T> Clone for ResourceType<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for ResourceType<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for ResourceType<T> {}

impl<T> fmt::Debug for ResourceType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("has_loader", &self.inner.loader.is_some())
            .field("batch", &self.inner.batch)
            .finish()
    }
}

impl<T: Send + Sync + 'static> ResourceType<T> {
    /// A resource type without a loader. Its entries can only be populated as side data
    /// of other transactions or through [`ResourceCache::receive`](crate::ResourceCache::receive).
    ///
    /// Validated like [`ResourceTypeBuilder::build`]: an empty name is rejected.
    pub fn new(name: impl Into<String>) -> Result<Self, KitError> {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> ResourceTypeBuilder<T> {
        ResourceTypeBuilder {
            name: name.into(),
            loader: None,
            batch: true,
            max_batch_size: None,
        }
    }

    /// The only way to build a reference. Any string is a valid key.
    pub fn reference(&self, key: impl Into<String>) -> ResourceReference<T> {
        ResourceReference {
            resource_type: self.clone(),
            key: key.into(),
        }
    }

    pub fn id(&self) -> ResourceTypeId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn loader(&self) -> Option<&Arc<dyn ResourceLoader<T>>> {
        self.inner.loader.as_ref()
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        self.inner.batch
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }
}

/// Builder for [`ResourceType`], validating the configuration once in [`build`](Self::build).
pub struct ResourceTypeBuilder<T> {
    name: String,
    loader: Option<Arc<dyn ResourceLoader<T>>>,
    batch: bool,
    max_batch_size: Option<usize>,
}

impl<T: Send + Sync + 'static> ResourceTypeBuilder<T> {
    pub fn loader(mut self, loader: impl ResourceLoader<T>) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Uses an async closure as the loader.
    ///
    /// ```rust
    /// use resource_kit::ResourceType;
    ///
    /// let numbers = ResourceType::<u32>::builder("Number")
    ///     .load_fn(|_numbers, keys, _tx| async move {
    ///         Ok(keys.iter().map(|k| k.len() as u32).collect())
    ///     })
    ///     .build()
    ///     .unwrap();
    /// assert!(numbers.loader().is_some());
    /// ```
    pub fn load_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(ResourceType<T>, Vec<String>, LoadTransaction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, ResourceError>> + Send + 'static,
    {
        self.loader(LoaderFn::new(f))
    }

    /// Defaults to `true`.
    pub fn batch(mut self, enabled: bool) -> Self {
        self.batch = enabled;
        self
    }

    /// Defaults to unbounded. Zero is rejected by [`build`](Self::build).
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    pub fn build(self) -> Result<ResourceType<T>, KitError> {
        if self.name.is_empty() {
            return Err(KitError::InvalidConfig(
                "resource type name must not be empty".to_string(),
            ));
        }
        if self.max_batch_size == Some(0) {
            return Err(KitError::InvalidConfig(format!(
                "max_batch_size for {} must be at least 1",
                self.name
            )));
        }
        Ok(ResourceType {
            inner: Arc::new(TypeInner {
                id: ResourceTypeId::next(),
                name: Arc::from(self.name),
                loader: self.loader,
                batch: BatchPolicy {
                    enabled: self.batch,
                    max_batch_size: self.max_batch_size.and_then(NonZeroUsize::new),
                },
            }),
        })
    }
}

/// One instance of a resource type: `(type, key)`.
pub struct ResourceReference<T> {
    resource_type: ResourceType<T>,
    key: String,
}

impl<T: Send + Sync + 'static> ResourceReference<T> {
    pub fn resource_type(&self) -> &ResourceType<T> {
        &self.resource_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Drops the payload type, keeping identity.
    pub fn erase(&self) -> AnyReference {
        AnyReference {
            type_id: self.resource_type.id(),
            type_name: self.resource_type.shared_name(),
            key: self.key.clone(),
        }
    }
}

impl<T> Clone for ResourceReference<T> {
    fn clone(&self) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            key: self.key.clone(),
        }
    }
}

impl<T> PartialEq for ResourceReference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.resource_type == other.resource_type && self.key == other.key
    }
}

impl<T> Eq for ResourceReference<T> {}

impl<T> Hash for ResourceReference<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource_type.inner.id.hash(state);
        self.key.hash(state);
    }
}

impl<T> fmt::Display for ResourceReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type.inner.name, self.key)
    }
}

impl<T> fmt::Debug for ResourceReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceReference({self})")
    }
}

/// A reference with its payload type erased. This is what travels inside store actions.
#[derive(Clone)]
pub struct AnyReference {
    type_id: ResourceTypeId,
    type_name: Arc<str>,
    key: String,
}

impl AnyReference {
    pub fn type_id(&self) -> ResourceTypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn shared_type_name(&self) -> Arc<str> {
        Arc::clone(&self.type_name)
    }
}

impl PartialEq for AnyReference {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.key == other.key
    }
}

impl Eq for AnyReference {}

impl Hash for AnyReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.key.hash(state);
    }
}

impl fmt::Display for AnyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.key)
    }
}

impl fmt::Debug for AnyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl<T: Send + Sync + 'static> From<&ResourceReference<T>> for AnyReference {
    fn from(reference: &ResourceReference<T>) -> Self {
        reference.erase()
    }
}

/// The cached state of one reference.
///
/// `error` and `data` are independent: a failed fetch keeps the previous `data` and only
/// sets `error`; a successful one replaces `data` and clears `error`.
pub struct ResourceEntry<T: ?Sized> {
    /// A fetch is in flight for this exact reference.
    pub loading: bool,
    /// The held data (if any) should not be trusted as current.
    pub outdated: bool,
    pub error: Option<ResourceError>,
    pub data: Option<Arc<T>>,
}

/// An entry as stored, with the payload type erased.
pub type ErasedEntry = ResourceEntry<dyn Any + Send + Sync>;

impl<T: ?Sized> ResourceEntry<T> {
    /// Never fetched: outdated, idle, empty.
    pub fn null() -> Self {
        Self {
            loading: false,
            outdated: true,
            error: None,
            data: None,
        }
    }

    /// Received without having been fetched first (e.g. as side data).
    pub fn fresh() -> Self {
        Self {
            loading: false,
            outdated: false,
            error: None,
            data: None,
        }
    }

    pub fn should_fetch(&self) -> bool {
        should_fetch(self)
    }
}

impl ErasedEntry {
    /// Recovers the typed view. A payload of a different type reads as absent.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> ResourceEntry<T> {
        ResourceEntry {
            loading: self.loading,
            outdated: self.outdated,
            error: self.error.clone(),
            data: self
                .data
                .as_ref()
                .and_then(|data| Arc::clone(data).downcast::<T>().ok()),
        }
    }
}

impl<T: ?Sized> Clone for ResourceEntry<T> {
    fn clone(&self) -> Self {
        Self {
            loading: self.loading,
            outdated: self.outdated,
            error: self.error.clone(),
            data: self.data.clone(),
        }
    }
}

impl<T: ?Sized> Default for ResourceEntry<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> fmt::Debug for ResourceEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("loading", &self.loading)
            .field("outdated", &self.outdated)
            .field("error", &self.error)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

/// The single gate for triggering any load.
pub fn should_fetch<T: ?Sized>(entry: &ResourceEntry<T>) -> bool {
    entry.outdated && !entry.loading
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn entry(loading: bool, outdated: bool) -> ResourceEntry<u32> {
        ResourceEntry {
            loading,
            outdated,
            error: None,
            data: None,
        }
    }

    #[test]
    fn test_should_fetch_table() {
        assert!(!should_fetch(&entry(false, false)));
        assert!(should_fetch(&entry(false, true)));
        assert!(!should_fetch(&entry(true, false)));
        assert!(!should_fetch(&entry(true, true)));
    }

    #[test]
    fn test_null_and_fresh_defaults() {
        let null = ResourceEntry::<u32>::null();
        assert!(null.outdated && !null.loading && null.data.is_none() && null.error.is_none());
        assert!(null.should_fetch());

        let fresh = ResourceEntry::<u32>::fresh();
        assert!(!fresh.outdated && !fresh.loading);
        assert!(!fresh.should_fetch());
    }

    #[test]
    fn test_references_compare_by_type_and_key() {
        let tasks: ResourceType<String> = ResourceType::new("Task").unwrap();
        let other_tasks: ResourceType<String> = ResourceType::new("Task").unwrap();

        assert_eq!(tasks.reference("t1"), tasks.clone().reference("t1"));
        assert_ne!(tasks.reference("t1"), tasks.reference("t2"));
        // Same name, different type instance.
        assert_ne!(tasks.reference("t1"), other_tasks.reference("t1"));

        let set: HashSet<_> = [tasks.reference("t1"), tasks.reference("t1")].into();
        assert_eq!(set.len(), 1);

        let erased: HashSet<AnyReference> =
            [tasks.reference("t1").erase(), other_tasks.reference("t1").erase()].into();
        assert_eq!(erased.len(), 2);
    }

    #[test]
    fn test_builder_defaults_and_validation() {
        let projects: ResourceType<String> = ResourceType::builder("Project").build().unwrap();
        assert_eq!(projects.batch_policy(), BatchPolicy::default());
        assert!(projects.loader().is_none());

        let bounded: ResourceType<String> = ResourceType::builder("Task")
            .batch(false)
            .max_batch_size(5)
            .build()
            .unwrap();
        assert!(!bounded.batch_policy().enabled);
        assert_eq!(
            bounded.batch_policy().max_batch_size,
            NonZeroUsize::new(5)
        );

        let zero = ResourceType::<String>::builder("Task").max_batch_size(0).build();
        assert!(matches!(zero, Err(KitError::InvalidConfig(_))));

        let unnamed = ResourceType::<String>::builder("").build();
        assert!(matches!(unnamed, Err(KitError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_empty_name() {
        assert!(matches!(
            ResourceType::<String>::new(""),
            Err(KitError::InvalidConfig(_))
        ));
        let plain = ResourceType::<String>::new("Tag").unwrap();
        assert_eq!(plain.name(), "Tag");
        assert!(plain.loader().is_none());
    }

    #[test]
    fn test_downcast_recovers_payload() {
        let stored = ErasedEntry {
            loading: false,
            outdated: false,
            error: None,
            data: Some(Arc::new(7u32)),
        };
        assert_eq!(stored.downcast::<u32>().data.as_deref(), Some(&7));
        assert!(stored.downcast::<String>().data.is_none());
    }
}
