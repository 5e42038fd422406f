//! Lock-free, fixed capacity, open addressing hash table for aggregation
//!
//! The table never grows. It is sized once from the expected number of keys, every slot
//! starts as `(K::SENTINEL, identity)`. A slot is claimed for a key with a single
//! compare-and-swap on the key field; once claimed, it belongs to that key for the
//! lifetime of the table and the value field is only ever updated with the
//! [`AggregationOperator`].

use std::collections::TryReserveError;
use std::fmt::Debug;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};

use snafu::{ResultExt, Snafu, ensure};
use strength_reduce::StrengthReducedU64;

use super::aggregate::AggregationOperator;
use super::atomic::{AtomicPrimitive, GroupKey};
use crate::common::utils::hash::hash_one;
use crate::common::utils::memory::try_vec_with;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HashTableError {
    #[snafu(display("Failed to allocate the hash table with `{capacity}` slots"))]
    Allocate {
        capacity: usize,
        source: TryReserveError,
    },
    #[snafu(display(
        "Key `{key}` is the sentinel of the empty slot, it can not be inserted into the hash table"
    ))]
    SentinelKey { key: String },
    #[snafu(display(
        "Probed all of the `{capacity}` slots without finding a free slot for key `{key}`. The number of distinct keys exceeds the capacity of the hash table"
    ))]
    CapacityExceeded { key: String, capacity: usize },
}

type Result<T> = std::result::Result<T, HashTableError>;

/// Strategy that determines the sequence of slots probed for a key
pub trait Probing: Debug + Default + Send + Sync {
    /// Adjust the requested capacity to the capacity this probing scheme works with
    #[inline]
    fn adjust_capacity(&self, capacity: usize) -> usize {
        capacity
    }

    /// Index of the slot visited by the `step`-th probe, starting from the `home` slot.
    /// For `step` in `0..capacity`, every slot must be visited exactly once
    fn probe(&self, home: usize, step: usize, capacity: usize) -> usize;
}

/// Scan forward from the home slot, wrap around at the end of the table
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearProbing;

impl Probing for LinearProbing {
    #[inline]
    fn probe(&self, home: usize, step: usize, capacity: usize) -> usize {
        let index = home + step;
        if index >= capacity {
            index - capacity
        } else {
            index
        }
    }
}

/// Quadratic probing with triangular numbers: `home + step * (step + 1) / 2`. It visits
/// every slot when the capacity is power of two, the capacity is rounded up to the
/// next power of two
#[derive(Debug, Default, Clone, Copy)]
pub struct TriangularProbing;

impl Probing for TriangularProbing {
    #[inline]
    fn adjust_capacity(&self, capacity: usize) -> usize {
        capacity.next_power_of_two()
    }

    #[inline]
    fn probe(&self, home: usize, step: usize, capacity: usize) -> usize {
        debug_assert!(capacity.is_power_of_two());
        // Halve the even factor first, the product is exact modulo 2^64
        let triangular = if step % 2 == 0 {
            (step / 2).wrapping_mul(step + 1)
        } else {
            step.wrapping_mul((step + 1) / 2)
        };
        home.wrapping_add(triangular) & (capacity - 1)
    }
}

/// Slot of the hash table
pub struct Slot<K: GroupKey, V: AtomicPrimitive> {
    key: K::Atomic,
    value: V::Atomic,
}

impl<K: GroupKey, V: AtomicPrimitive> Slot<K, V> {
    #[inline]
    fn empty(identity: V) -> Self {
        Self {
            key: K::new_atomic(K::SENTINEL),
            value: V::new_atomic(identity),
        }
    }

    /// Load the key and value of the slot. The slot is empty iff the key is
    /// [`GroupKey::SENTINEL`]
    #[inline]
    pub fn load(&self) -> (K, V) {
        (K::load(&self.key, Relaxed), V::load(&self.value, Relaxed))
    }
}

impl<K: GroupKey, V: AtomicPrimitive> Debug for Slot<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (key, value) = self.load();
        write!(f, "({:?}, {:?})", key, value)
    }
}

/// Concurrent hash table that maps the groupby keys to the running aggregates
///
/// # Generics
///
/// - `K`: Type of the groupby key
/// - `V`: Type of the aggregated value
/// - `P`: Probing scheme
pub struct ConcurrentHashTable<K: GroupKey, V: AtomicPrimitive, P: Probing = LinearProbing> {
    slots: Box<[Slot<K, V>]>,
    /// `hash % capacity` is computed for every inserted row
    capacity_reducer: StrengthReducedU64,
    identity: V,
    probing: P,
}

impl<K: GroupKey, V: AtomicPrimitive, P: Probing> Debug for ConcurrentHashTable<K, V, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConcurrentHashTable {{ capacity: {}, probing: {:?}, data: ",
            self.size(),
            self.probing
        )?;
        f.debug_list().entries(self.iter_live()).finish()?;
        write!(f, " }}")
    }
}

impl<K: GroupKey, V: AtomicPrimitive, P: Probing> ConcurrentHashTable<K, V, P> {
    /// Try to allocate a table with at least `capacity` slots, every slot is initialized
    /// to `(K::SENTINEL, identity)`. The probing scheme may round the capacity up
    pub fn try_new(capacity: usize, identity: V, probing: P) -> Result<Self> {
        let capacity = probing.adjust_capacity(capacity.max(1));
        let slots = try_vec_with(capacity, || Slot::empty(identity))
            .context(AllocateSnafu { capacity })?
            .into_boxed_slice();

        Ok(Self {
            slots,
            capacity_reducer: StrengthReducedU64::new(capacity as u64),
            identity,
            probing,
        })
    }

    /// Total number of slots. It is **not** the number of live entries
    #[inline]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Value of the empty slot
    #[inline]
    pub fn identity(&self) -> V {
        self.identity
    }

    #[inline]
    fn home_slot(&self, key: K) -> usize {
        (hash_one(key) % self.capacity_reducer) as usize
    }

    /// Insert the `key` if it is not in the table, then combine `value` into the slot's
    /// value with `op`. Many threads can call this function at the same time.
    ///
    /// Claiming a slot races on the key field: exactly one thread moves the key from
    /// sentinel to its key, the losers read the winner's key and either match or keep
    /// probing. Probing visits every slot at most once, if none of them is free or holds
    /// `key`, [`HashTableError::CapacityExceeded`] is returned
    #[inline]
    pub fn insert_or_update<Op>(&self, key: K, value: V, op: &Op) -> Result<()>
    where
        Op: AggregationOperator<V>,
    {
        ensure!(
            !key.bit_eq(K::SENTINEL),
            SentinelKeySnafu {
                key: format!("{:?}", key)
            }
        );

        let capacity = self.size();
        let home = self.home_slot(key);
        for step in 0..capacity {
            let slot = &self.slots[self.probing.probe(home, step, capacity)];

            let mut owner = K::load(&slot.key, Acquire);
            if owner.bit_eq(K::SENTINEL) {
                owner = match K::compare_exchange(&slot.key, K::SENTINEL, key, AcqRel, Acquire)
                {
                    Ok(_) => key,
                    Err(winner) => winner,
                };
            }

            if owner == key {
                op.atomic_combine(&slot.value, value);
                return Ok(());
            }
        }

        CapacityExceededSnafu {
            key: format!("{:?}", key),
            capacity,
        }
        .fail()
    }

    /// Find the aggregated value of the `key`
    pub fn find(&self, key: K) -> Option<V> {
        if key.bit_eq(K::SENTINEL) {
            return None;
        }

        let capacity = self.size();
        let home = self.home_slot(key);
        for step in 0..capacity {
            let (slot_key, value) = self.slots[self.probing.probe(home, step, capacity)].load();
            if slot_key.bit_eq(K::SENTINEL) {
                return None;
            }
            if slot_key == key {
                return Some(value);
            }
        }
        None
    }

    /// Read access to all of the slots, including the empty ones
    #[inline]
    pub fn iter_slots(&self) -> std::slice::Iter<'_, Slot<K, V>> {
        self.slots.iter()
    }

    /// Iterate the `(key, value)` of the live slots
    pub fn iter_live(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.iter_slots()
            .map(Slot::load)
            .filter(|(key, _)| !key.bit_eq(K::SENTINEL))
    }
}
