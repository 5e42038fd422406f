//! Fixed width primitives that can be stored in the slots of the hash table
//!
//! Each primitive is bound to the atomic type of the same bit width. Floats are stored
//! as their bit patterns, compare-and-swap on floats compares the bits.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::Ordering;
use std::sync::atomic::{
    AtomicI8, AtomicI16, AtomicI32, AtomicI64, AtomicU8, AtomicU16, AtomicU32, AtomicU64,
    AtomicUsize,
};

use crate::private::Sealed;

/// Primitive type that has an atomic counterpart with the same bit width
pub trait AtomicPrimitive: Sealed + Copy + Debug + Send + Sync + 'static {
    /// The atomic cell that stores `Self`
    type Atomic: Debug + Send + Sync;

    /// Create a new atomic cell
    fn new_atomic(value: Self) -> Self::Atomic;

    /// Returns true if two values have the same bit pattern
    fn bit_eq(self, other: Self) -> bool;

    /// Load the value in the cell
    fn load(cell: &Self::Atomic, order: Ordering) -> Self;

    /// Stores `new` into the cell if the cell holds `current`. The returned value is the
    /// previous value of the cell, `Ok` if the exchange happened
    fn compare_exchange(
        cell: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;

    /// Same as [`compare_exchange`](Self::compare_exchange) but allowed to fail spuriously
    fn compare_exchange_weak(
        cell: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
}

macro_rules! impl_atomic_primitive {
    ($($ty:ty => $atomic:ty),+ $(,)?) => {
        $(
            impl Sealed for $ty {}

            impl AtomicPrimitive for $ty {
                type Atomic = $atomic;

                #[inline]
                fn new_atomic(value: Self) -> Self::Atomic {
                    <$atomic>::new(value)
                }

                #[inline]
                fn bit_eq(self, other: Self) -> bool {
                    self == other
                }

                #[inline]
                fn load(cell: &Self::Atomic, order: Ordering) -> Self {
                    cell.load(order)
                }

                #[inline]
                fn compare_exchange(
                    cell: &Self::Atomic,
                    current: Self,
                    new: Self,
                    success: Ordering,
                    failure: Ordering,
                ) -> Result<Self, Self> {
                    cell.compare_exchange(current, new, success, failure)
                }

                #[inline]
                fn compare_exchange_weak(
                    cell: &Self::Atomic,
                    current: Self,
                    new: Self,
                    success: Ordering,
                    failure: Ordering,
                ) -> Result<Self, Self> {
                    cell.compare_exchange_weak(current, new, success, failure)
                }
            }
        )+
    };
}

impl_atomic_primitive!(
    u8 => AtomicU8,
    u16 => AtomicU16,
    u32 => AtomicU32,
    u64 => AtomicU64,
    usize => AtomicUsize,
    i8 => AtomicI8,
    i16 => AtomicI16,
    i32 => AtomicI32,
    i64 => AtomicI64,
);

macro_rules! impl_atomic_float {
    ($($ty:ty => $atomic:ty),+ $(,)?) => {
        $(
            impl Sealed for $ty {}

            impl AtomicPrimitive for $ty {
                type Atomic = $atomic;

                #[inline]
                fn new_atomic(value: Self) -> Self::Atomic {
                    <$atomic>::new(value.to_bits())
                }

                #[inline]
                fn bit_eq(self, other: Self) -> bool {
                    self.to_bits() == other.to_bits()
                }

                #[inline]
                fn load(cell: &Self::Atomic, order: Ordering) -> Self {
                    <$ty>::from_bits(cell.load(order))
                }

                #[inline]
                fn compare_exchange(
                    cell: &Self::Atomic,
                    current: Self,
                    new: Self,
                    success: Ordering,
                    failure: Ordering,
                ) -> Result<Self, Self> {
                    cell.compare_exchange(current.to_bits(), new.to_bits(), success, failure)
                        .map(<$ty>::from_bits)
                        .map_err(<$ty>::from_bits)
                }

                #[inline]
                fn compare_exchange_weak(
                    cell: &Self::Atomic,
                    current: Self,
                    new: Self,
                    success: Ordering,
                    failure: Ordering,
                ) -> Result<Self, Self> {
                    cell.compare_exchange_weak(current.to_bits(), new.to_bits(), success, failure)
                        .map(<$ty>::from_bits)
                        .map_err(<$ty>::from_bits)
                }
            }
        )+
    };
}

impl_atomic_float!(f32 => AtomicU32, f64 => AtomicU64);

/// Key of the hash table. An entry is empty iff its key is [`SENTINEL`](Self::SENTINEL),
/// the maximum value of the type. The sentinel can not be used as a groupby key
pub trait GroupKey: AtomicPrimitive + Eq + Ord + Hash {
    /// Reserved key of the empty slot
    const SENTINEL: Self;

    /// Number of bytes the radix sort needs to visit
    const RADIX_BYTES: usize;

    /// Map the key to an unsigned integer with the same order. Signed keys flip the
    /// sign bit
    fn to_radix_bits(self) -> u64;
}

macro_rules! impl_unsigned_group_key {
    ($($ty:ty),+) => {
        $(
            impl GroupKey for $ty {
                const SENTINEL: Self = <$ty>::MAX;
                const RADIX_BYTES: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn to_radix_bits(self) -> u64 {
                    self as u64
                }
            }
        )+
    };
}

macro_rules! impl_signed_group_key {
    ($($ty:ty => $unsigned:ty),+) => {
        $(
            impl GroupKey for $ty {
                const SENTINEL: Self = <$ty>::MAX;
                const RADIX_BYTES: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn to_radix_bits(self) -> u64 {
                    ((self as $unsigned) ^ (1 << (<$unsigned>::BITS - 1))) as u64
                }
            }
        )+
    };
}

impl_unsigned_group_key!(u8, u16, u32, u64, usize);
impl_signed_group_key!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);
