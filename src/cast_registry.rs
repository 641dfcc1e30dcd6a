use crate::{any::AnyValue, error::CastError};
use std::any::TypeId;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

type CastFn = Arc<dyn Fn(&AnyValue) -> Option<AnyValue> + Send + Sync>;

#[derive(Default)]
struct CastTables {
    upcasts: HashMap<(TypeId, TypeId), CastFn>,
    downcasts: HashMap<(TypeId, TypeId), CastFn>,
    /// Derived type to its directly registered base types.
    base_types: HashMap<TypeId, BTreeSet<TypeId>>,
}

impl CastTables {
    /// Breadth-first search for a chain of upcasts `from -> ... -> to`.
    fn upcast_path(&self, from: TypeId, to: TypeId) -> Option<Vec<TypeId>> {
        let mut came_from: HashMap<TypeId, TypeId> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut node = to;
                while let Some(prev) = came_from.get(&node) {
                    path.push(*prev);
                    node = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for base in self.base_types.get(&current).into_iter().flatten() {
                if *base != from && !came_from.contains_key(base) {
                    came_from.insert(*base, current);
                    queue.push_back(*base);
                }
            }
        }
        None
    }
}

/// Registered "derived -> base" relationships between value types.
///
/// Rust has no inheritance, so "derived" and "base" are whatever pair of types
/// the user registers, typically `Arc<Concrete>` and `Arc<dyn Trait>`.
/// The upcast is infallible; the downcast is checked against the runtime
/// payload and may fail.
///
/// ```
/// # use behavior_tree_engine::PolymorphicCastRegistry;
/// # use std::{any::Any, sync::Arc};
/// trait Animal: Send + Sync {
///     fn name(&self) -> String;
///     fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
/// }
///
/// struct Cat;
///
/// impl Animal for Cat {
///     fn name(&self) -> String { "Cat".into() }
///     fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
/// }
///
/// let registry = PolymorphicCastRegistry::default();
/// registry.register_cast::<Arc<Cat>, Arc<dyn Animal>>(
///     |cat| cat as Arc<dyn Animal>,
///     |animal| animal.into_any().downcast::<Cat>().ok(),
/// );
/// ```
#[derive(Default)]
pub struct PolymorphicCastRegistry {
    tables: RwLock<CastTables>,
}

impl PolymorphicCastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_cast<D, B>(
        &self,
        upcast: impl Fn(D) -> B + Send + Sync + 'static,
        downcast: impl Fn(B) -> Option<D> + Send + Sync + 'static,
    ) where
        D: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
    {
        let derived = TypeId::of::<D>();
        let base = TypeId::of::<B>();
        let upcast_fn: CastFn = Arc::new(move |value: &AnyValue| {
            value
                .downcast_ref::<D>()
                .cloned()
                .map(|v| AnyValue::new(upcast(v)))
        });
        let downcast_fn: CastFn = Arc::new(move |value: &AnyValue| {
            value
                .downcast_ref::<B>()
                .cloned()
                .and_then(|v| downcast(v))
                .map(AnyValue::new)
        });

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.upcasts.insert((derived, base), upcast_fn);
        tables.downcasts.insert((base, derived), downcast_fn);
        tables.base_types.entry(derived).or_default().insert(base);
        tracing::debug!(
            "registered polymorphic cast {} -> {}",
            std::any::type_name::<D>(),
            std::any::type_name::<B>()
        );
    }

    /// True if `from` equals `to`, or there is a registered upcast or downcast
    /// chain between them.
    pub fn is_convertible(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.upcast_path(from, to).is_some() || tables.upcast_path(to, from).is_some()
    }

    /// Stricter than [`Self::is_convertible`]: only derived to base.
    pub fn can_upcast(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.upcast_path(from, to).is_some()
    }

    /// Directly registered base types of `ty`.
    pub fn base_types(&self, ty: TypeId) -> Vec<TypeId> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .base_types
            .get(&ty)
            .map(|bases| bases.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn try_cast(
        &self,
        value: &AnyValue,
        to: TypeId,
        to_name: &'static str,
    ) -> Result<AnyValue, CastError> {
        let from = value.held_type();
        if from == to {
            return Ok(value.clone());
        }

        let error = |reason| CastError::Polymorphic {
            from: value.type_name(),
            to: to_name,
            reason,
        };

        // Resolve the chain under the lock, run the user closures without it.
        let (steps, reason) = {
            let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(path) = tables.upcast_path(from, to) {
                let steps: Option<Vec<CastFn>> = path
                    .windows(2)
                    .map(|pair| tables.upcasts.get(&(pair[0], pair[1])).cloned())
                    .collect();
                (steps, "upcast failed")
            } else if let Some(mut path) = tables.upcast_path(to, from) {
                path.reverse();
                let steps: Option<Vec<CastFn>> = path
                    .windows(2)
                    .map(|pair| tables.downcasts.get(&(pair[0], pair[1])).cloned())
                    .collect();
                (steps, "runtime type does not match the requested type")
            } else {
                return Err(error("no registered polymorphic conversion available"));
            }
        };

        let steps = steps.ok_or_else(|| error("incomplete cast chain"))?;
        steps
            .iter()
            .try_fold(value.clone(), |current, step| step(&current))
            .ok_or_else(|| error(reason))
    }
}

#[cfg(test)]
mod test;
