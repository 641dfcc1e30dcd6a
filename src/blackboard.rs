//! Hierarchical, thread-safe key/value store shared between nodes.
//!
//! Every entry sits behind its own mutex. The map of entries is only locked
//! long enough to find or insert an entry, so readers and writers of different
//! keys never wait for each other.
//!
//! A child blackboard (one per subtree) looks keys up locally first. A key that
//! is missing locally is delegated to the parent when it was remapped with
//! [`Blackboard::add_subtree_remapping`], or when auto remapping is enabled and
//! the key is not private (does not start with `_`). Keys starting with `@` are
//! always resolved in the root blackboard.

use crate::{
    any::{AnyValue, TypeInfo},
    cast_registry::PolymorphicCastRegistry,
    error::{BlackboardError, CastError},
};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};
use std::time::Instant;
use tracing::{debug, warn};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A single slot of the blackboard.
pub struct Entry {
    value: Option<AnyValue>,
    info: TypeInfo,
    sequence_id: u64,
    stamp: Instant,
}

impl Entry {
    fn new(info: TypeInfo) -> Self {
        Self {
            value: None,
            info,
            sequence_id: 0,
            stamp: Instant::now(),
        }
    }

    pub fn value(&self) -> Option<&AnyValue> {
        self.value.as_ref()
    }

    pub fn info(&self) -> &TypeInfo {
        &self.info
    }

    /// Incremented on every successful write.
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// Time of the last successful write.
    pub fn stamp(&self) -> Instant {
        self.stamp
    }

    fn store(&mut self, value: AnyValue) {
        self.value = Some(value);
        self.sequence_id += 1;
        self.stamp = Instant::now();
    }
}

/// A value read together with its freshness metadata.
#[derive(Debug, Clone)]
pub struct StampedValue<T> {
    pub value: T,
    pub sequence_id: u64,
    pub stamp: Instant,
}

pub type EntryRef = Arc<Mutex<Entry>>;

pub struct Blackboard {
    storage: Mutex<HashMap<String, EntryRef>>,
    parent: Option<Arc<Blackboard>>,
    /// Internal key to the key used in the parent blackboard.
    internal_to_external: RwLock<HashMap<String, String>>,
    auto_remapping: AtomicBool,
    cast_registry: Arc<PolymorphicCastRegistry>,
}

impl Blackboard {
    /// A root blackboard with its own, empty cast registry.
    pub fn create() -> Arc<Self> {
        Self::with_cast_registry(Arc::new(PolymorphicCastRegistry::new()))
    }

    /// A root blackboard that resolves polymorphic conversions with `cast_registry`.
    pub fn with_cast_registry(cast_registry: Arc<PolymorphicCastRegistry>) -> Arc<Self> {
        Arc::new(Self {
            storage: Mutex::new(HashMap::new()),
            parent: None,
            internal_to_external: RwLock::new(HashMap::new()),
            auto_remapping: AtomicBool::new(false),
            cast_registry,
        })
    }

    /// A child scope sharing the parent's cast registry.
    pub fn new_child(parent: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            storage: Mutex::new(HashMap::new()),
            parent: Some(parent.clone()),
            internal_to_external: RwLock::new(HashMap::new()),
            auto_remapping: AtomicBool::new(false),
            cast_registry: parent.cast_registry.clone(),
        })
    }

    pub fn parent(&self) -> Option<&Arc<Blackboard>> {
        self.parent.as_ref()
    }

    /// The top of the hierarchy, which is `self` for a root blackboard.
    pub fn root(&self) -> &Blackboard {
        let mut current = self;
        while let Some(parent) = &current.parent {
            current = parent;
        }
        current
    }

    pub fn cast_registry(&self) -> &Arc<PolymorphicCastRegistry> {
        &self.cast_registry
    }

    /// Makes `internal` in this scope an alias of `external` in the parent scope.
    pub fn add_subtree_remapping(&self, internal: impl Into<String>, external: impl Into<String>) {
        self.internal_to_external
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(internal.into(), external.into());
    }

    /// With auto remapping, every non-private key missing in this scope is
    /// looked up and created in the parent scope under the same name.
    pub fn enable_auto_remapping(&self, enable: bool) {
        self.auto_remapping.store(enable, Ordering::Relaxed);
    }

    fn remapped(&self, key: &str) -> Option<String> {
        self.internal_to_external
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// The key under which `key` should be resolved in the parent scope, if any.
    fn delegated(&self, key: &str) -> Option<(&Arc<Blackboard>, String)> {
        let parent = self.parent.as_ref()?;
        if let Some(external) = self.remapped(key) {
            return Some((parent, external));
        }
        if self.auto_remapping.load(Ordering::Relaxed) && !is_private_key(key) {
            return Some((parent, key.to_owned()));
        }
        None
    }

    /// Finds an entry, following `@` and parent delegation.
    pub fn get_entry(&self, key: &str) -> Option<EntryRef> {
        if let Some(global) = key.strip_prefix('@') {
            return self.root().get_entry(global);
        }
        if let Some(entry) = lock(&self.storage).get(key) {
            return Some(entry.clone());
        }
        let (parent, external) = self.delegated(key)?;
        parent.get_entry(&external)
    }

    pub fn entry_info(&self, key: &str) -> Option<TypeInfo> {
        self.get_entry(key).map(|entry| lock(&entry).info)
    }

    /// Runs `f` with the entry locked. Returns `None` if the key does not exist.
    pub fn with_entry<R>(&self, key: &str, f: impl FnOnce(&mut Entry) -> R) -> Option<R> {
        let entry = self.get_entry(key)?;
        let mut guard = lock(&entry);
        Some(f(&mut guard))
    }

    pub fn get_any(&self, key: &str) -> Option<AnyValue> {
        self.get_entry(key)
            .and_then(|entry| lock(&entry).value.clone())
    }

    pub fn get<T>(&self, key: &str) -> Result<T, BlackboardError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_stamped(key).map(|stamped| stamped.value)
    }

    /// Like [`Self::get`], but absent keys and failed conversions yield `None`.
    pub fn try_get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get(key).ok()
    }

    pub fn get_stamped<T>(&self, key: &str) -> Result<StampedValue<T>, BlackboardError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = self
            .get_entry(key)
            .ok_or_else(|| BlackboardError::NotFound(key.to_owned()))?;
        let entry = lock(&entry);
        let value = entry
            .value
            .as_ref()
            .ok_or_else(|| BlackboardError::Empty(key.to_owned()))?;
        let value = value
            .cast::<T>(&self.cast_registry)
            .map_err(|source| cast_error(key, source))?;
        Ok(StampedValue {
            value,
            sequence_id: entry.sequence_id,
            stamp: entry.stamp,
        })
    }

    pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T) -> Result<(), BlackboardError> {
        self.set_any(key, AnyValue::new(value))
    }

    /// Writes a type-erased value.
    ///
    /// A new key takes the type of `value`, except that a `String` leaves the
    /// entry untyped. An untyped entry gets fixed by its first non-string write.
    /// A typed entry only accepts values that convert losslessly into its type.
    pub fn set_any(&self, key: &str, value: AnyValue) -> Result<(), BlackboardError> {
        let entry = match self.get_entry(key) {
            Some(entry) => entry,
            None => {
                let info = if value.is::<String>() {
                    TypeInfo::any()
                } else {
                    TypeInfo::of_value(&value)
                };
                self.insert_entry(key, info)
            }
        };

        let mut entry = lock(&entry);
        if !entry.info.is_strongly_typed() {
            if !value.is::<String>() {
                entry.info = TypeInfo::of_value(&value);
            }
            entry.store(value);
            return Ok(());
        }

        match value.convert_to(&entry.info, &self.cast_registry) {
            Ok(converted) => {
                entry.store(converted);
                Ok(())
            }
            Err(source) => {
                warn!(
                    "rejected write of {} to blackboard entry {:?} of type {}",
                    value.type_name(),
                    key,
                    entry.info.type_name()
                );
                Err(match source {
                    CastError::NoConversion { .. } => BlackboardError::TypeMismatch {
                        key: key.to_owned(),
                        declared: entry.info.type_name(),
                        requested: value.type_name(),
                    },
                    source => BlackboardError::Cast {
                        key: key.to_owned(),
                        source,
                    },
                })
            }
        }
    }

    /// Declares an empty entry of the given type.
    ///
    /// Declaring an existing key succeeds if either side is untyped, the types
    /// are equal, or the cast registry relates them. Declaring a type on an
    /// untyped entry converts its current value, if any.
    pub fn create_entry(&self, key: &str, info: TypeInfo) -> Result<(), BlackboardError> {
        let Some(entry) = self.get_entry(key) else {
            self.insert_entry(key, info);
            return Ok(());
        };

        let mut entry = lock(&entry);
        if !info.is_strongly_typed() {
            return Ok(());
        }
        let mismatch = |declared: &TypeInfo| BlackboardError::TypeMismatch {
            key: key.to_owned(),
            declared: declared.type_name(),
            requested: info.type_name(),
        };

        match (entry.info.type_id(), info.type_id()) {
            (None, _) => {
                if let Some(value) = entry.value.take() {
                    match value.convert_to(&info, &self.cast_registry) {
                        Ok(converted) => entry.value = Some(converted),
                        Err(_) => {
                            let error = mismatch(&TypeInfo::of_value(&value));
                            entry.value = Some(value);
                            return Err(error);
                        }
                    }
                }
                entry.info = info;
                Ok(())
            }
            (Some(current), Some(requested)) if current == requested => {
                if entry.info.converter().is_none() {
                    entry.info = info;
                }
                Ok(())
            }
            (Some(current), Some(requested))
                if self.cast_registry.is_convertible(current, requested) =>
            {
                Ok(())
            }
            _ => Err(mismatch(&entry.info)),
        }
    }

    /// Inserts a new entry in the scope that owns `key`, or returns the one
    /// that is already there.
    fn insert_entry(&self, key: &str, info: TypeInfo) -> EntryRef {
        if let Some(global) = key.strip_prefix('@') {
            return self.root().insert_entry(global, info);
        }
        if let Some((parent, external)) = self.delegated(key) {
            return parent.insert_entry(&external, info);
        }
        let mut storage = lock(&self.storage);
        storage
            .entry(key.to_owned())
            .or_insert_with(|| {
                debug!("creating blackboard entry {:?} of type {}", key, info.type_name());
                Arc::new(Mutex::new(Entry::new(info)))
            })
            .clone()
    }

    /// Removes a key from this scope. Returns whether it existed.
    pub fn unset(&self, key: &str) -> bool {
        if let Some(global) = key.strip_prefix('@') {
            return self.root().unset(global);
        }
        lock(&self.storage).remove(key).is_some()
    }

    /// Keys stored in this scope, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = lock(&self.storage).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) {
        lock(&self.storage).clear();
    }
}

impl Debug for Blackboard {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        let storage = lock(&self.storage);
        let mut map = fmt.debug_map();
        for (key, entry) in storage.iter() {
            map.entry(key, &lock(entry).info.type_name());
        }
        map.finish()
    }
}

/// Private keys stay in their own scope even with auto remapping.
pub fn is_private_key(key: &str) -> bool {
    key.starts_with('_')
}

pub(crate) fn cast_error(key: &str, source: CastError) -> BlackboardError {
    match source {
        CastError::NoConversion { from, to } => BlackboardError::TypeMismatch {
            key: key.to_owned(),
            declared: from,
            requested: to,
        },
        source => BlackboardError::Cast {
            key: key.to_owned(),
            source,
        },
    }
}
