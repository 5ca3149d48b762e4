use std::{
    hash::BuildHasherDefault,
    sync::{Arc, PoisonError, RwLock},
};

use hashbrown::{hash_map::RawEntryMut, HashMap};
use once_cell::sync::OnceCell;
use tracing::debug;

use super::{LabelValidator, MetricData};
use crate::{
    key::{hash_label_values, LabelHasher, LabelValues},
    LabelError,
};

/// The place a tuple's child lives in, reserved before the child exists.
///
/// Creation happens inside `child`, outside of any shard lock, so only callers asking for this
/// same tuple ever wait on it.
struct Slot<T> {
    label_values: Arc<[String]>,
    child: OnceCell<Arc<MetricData<T>>>,
}

type ShardMap<T> = HashMap<LabelValues, Arc<Slot<T>>, BuildHasherDefault<LabelHasher>>;

enum CreateError {
    Rejected(LabelError),
    // The slot was removed by a caller whose tuple was rejected; look the tuple up again.
    Detached,
}

/// The children of a metric that has labels.
///
/// Children are kept in a set of shards, each a map from label values to a slot guarded by its
/// own reader-writer lock.  The shard for a tuple is picked from the tuple's hash, so there is no
/// lock covering the whole repo.
///
/// ## Performance
///
/// `LabeledChildrenRepo` is optimized for the case where the child already exists: the caller's
/// label values are hashed and compared in place, without allocating, under a shared read guard of
/// a single shard.  Exclusive access to a shard is only ever taken to insert or remove a slot,
/// never while user code runs: the validator and the factory run outside of every shard lock, so a
/// slow validator, or one that resolves other tuples of the same metric, never holds up callers
/// asking for other tuples.
///
/// Children are never removed, so callers are responsible for keeping the number of distinct
/// label values bounded.
pub struct LabeledChildrenRepo<T> {
    shards: Box<[RwLock<ShardMap<T>>]>,
    shard_mask: usize,
    label_count: usize,
    validator: Option<LabelValidator>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> LabeledChildrenRepo<T> {
    /// Creates a new `LabeledChildrenRepo` for `label_count` label names.
    ///
    /// `factory` is called to create the child for every new tuple of label values, after
    /// `validator`, if any, has accepted the tuple.
    pub fn new<F>(label_count: usize, validator: Option<LabelValidator>, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let shard_count = std::cmp::max(1, num_cpus::get()).next_power_of_two();
        Self::with_shard_count(shard_count, label_count, validator, factory)
    }

    fn with_shard_count<F>(
        shard_count: usize,
        label_count: usize,
        validator: Option<LabelValidator>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        debug_assert!(shard_count.is_power_of_two());
        let shards = (0..shard_count).map(|_| RwLock::new(ShardMap::default())).collect();

        Self {
            shards,
            shard_mask: shard_count - 1,
            label_count,
            validator,
            factory: Box::new(factory),
        }
    }

    /// Gets the number of label names every tuple must match.
    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// Gets the number of children.
    ///
    /// Tuples whose child is still being created are not counted.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let shard = shard.read().unwrap_or_else(PoisonError::into_inner);
                shard.values().filter(|slot| slot.child.get().is_some()).count()
            })
            .sum()
    }

    /// Returns `true` if no child has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn shard_for(&self, hash: u64) -> &RwLock<ShardMap<T>> {
        // The shard count is a power of two and `shard_mask` is one less than it, so the masked
        // hash is always in bounds.
        &self.shards[hash as usize & self.shard_mask]
    }

    /// Gets the child for the given label values, creating it if it does not yet exist.
    ///
    /// When several callers race to create the same child, exactly one of them validates the
    /// label values and creates the child, and all of them get that child back.  Callers asking
    /// for other tuples are not held up while that happens.
    ///
    /// The validator may resolve other tuples of the same repo, but must not resolve the tuple it
    /// is validating.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::ArityMismatch`] if the number of label values is not the number of
    /// label names, before doing any lookup.  Returns the validator's error if the child did not
    /// exist and the validator rejected the label values.  No child is created on error.
    pub fn metric_for_labels(
        &self,
        label_values: &[&str],
    ) -> Result<Arc<MetricData<T>>, LabelError> {
        if label_values.len() != self.label_count {
            return Err(LabelError::ArityMismatch {
                expected: self.label_count,
                actual: label_values.len(),
            });
        }

        let hash = hash_label_values(label_values);
        let shard = self.shard_for(hash);

        loop {
            // Try and get the child if it exists.
            let pending = {
                let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
                match shard_read.raw_entry().from_hash(hash, |key| key.matches(label_values)) {
                    Some((_, slot)) => match slot.child.get() {
                        Some(data) => return Ok(Arc::clone(data)),
                        None => Some(Arc::clone(slot)),
                    },
                    None => None,
                }
            };

            // The shard guard is released by now: only callers for this tuple wait on the slot.
            let slot = match pending {
                Some(slot) => slot,
                None => self.reserve_slot(shard, hash, label_values),
            };

            match slot.child.get_or_try_init(|| self.create(shard, hash, label_values, &slot)) {
                Ok(data) => return Ok(Arc::clone(data)),
                Err(CreateError::Rejected(e)) => return Err(e),
                Err(CreateError::Detached) => continue,
            }
        }
    }

    /// Gets the slot for the given label values, inserting an empty one if there is none.
    fn reserve_slot(
        &self,
        shard: &RwLock<ShardMap<T>>,
        hash: u64,
        label_values: &[&str],
    ) -> Arc<Slot<T>> {
        let mut shard_write = shard.write().unwrap_or_else(PoisonError::into_inner);
        match shard_write.raw_entry_mut().from_hash(hash, |key| key.matches(label_values)) {
            RawEntryMut::Occupied(entry) => Arc::clone(entry.get()),
            RawEntryMut::Vacant(entry) => {
                let key = LabelValues::new(label_values, hash);
                let slot = Arc::new(Slot { label_values: key.shared(), child: OnceCell::new() });
                entry.insert_hashed_nocheck(hash, key, Arc::clone(&slot));
                slot
            }
        }
    }

    /// Validates the label values and creates the child for `slot`.
    ///
    /// Runs at most once at a time per slot, and never with a shard lock held.
    fn create(
        &self,
        shard: &RwLock<ShardMap<T>>,
        hash: u64,
        label_values: &[&str],
        slot: &Arc<Slot<T>>,
    ) -> Result<Arc<MetricData<T>>, CreateError> {
        // A rejected caller may have removed the slot while we were waiting on it.
        let attached = shard
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .raw_entry()
            .from_hash(hash, |key| key.matches(label_values))
            .is_some_and(|(_, current)| Arc::ptr_eq(current, slot));
        if !attached {
            return Err(CreateError::Detached);
        }

        if let Some(validator) = &self.validator {
            if let Err(e) = validator(label_values) {
                debug!(?label_values, error = %e, "rejected label values");
                self.remove_slot(shard, hash, label_values, slot);
                return Err(CreateError::Rejected(e));
            }
        }

        let data = Arc::new(MetricData::new((self.factory)(), Arc::clone(&slot.label_values)));
        debug!(?label_values, "created child metric");
        Ok(data)
    }

    fn remove_slot(
        &self,
        shard: &RwLock<ShardMap<T>>,
        hash: u64,
        label_values: &[&str],
        slot: &Arc<Slot<T>>,
    ) {
        let mut shard_write = shard.write().unwrap_or_else(PoisonError::into_inner);
        if let RawEntryMut::Occupied(entry) =
            shard_write.raw_entry_mut().from_hash(hash, |key| key.matches(label_values))
        {
            if Arc::ptr_eq(entry.get(), slot) {
                entry.remove();
            }
        }
    }

    /// Visits every child.
    ///
    /// This does not lock the entire repo, but proceeds shard by shard.  A child created after the
    /// visit starts may or may not be visited.  `f` runs without any shard locked, so it may
    /// itself resolve children.
    pub fn for_each_metric_data<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<MetricData<T>>),
    {
        for shard in self.shards.iter() {
            let children = shard
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .filter_map(|slot| slot.child.get().cloned())
                .collect::<Vec<_>>();

            for data in &children {
                f(data);
            }
        }
    }
}
