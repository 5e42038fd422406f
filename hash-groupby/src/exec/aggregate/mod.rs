//! Aggregation operators
//!
//! An aggregation operator is a pure, associative and commutative binary function over
//! the value type with an identity element. The hash table combines the values of
//! the same key with it, from many threads at the same time, therefore the operator
//! must not have side effects.

pub mod count;
pub mod min_max;
pub mod sum;

use std::fmt::Debug;
use std::sync::atomic::Ordering::Relaxed;

use super::atomic::AtomicPrimitive;

/// Value type that can be aggregated by the built-in operators
pub trait AggregationValue: AtomicPrimitive + PartialOrd {
    /// Zero of the type
    const ZERO: Self;
    /// The smallest value of the type, `-inf` for floats
    const LOWER_BOUND: Self;
    /// The largest value of the type, `+inf` for floats
    const UPPER_BOUND: Self;

    /// Add two values. Integers wrap around on overflow such that the addition stays
    /// associative
    fn add(self, rhs: Self) -> Self;
}

macro_rules! impl_integer_aggregation_value {
    ($($ty:ty),+) => {
        $(
            impl AggregationValue for $ty {
                const ZERO: Self = 0;
                const LOWER_BOUND: Self = <$ty>::MIN;
                const UPPER_BOUND: Self = <$ty>::MAX;

                #[inline]
                fn add(self, rhs: Self) -> Self {
                    num_traits::WrappingAdd::wrapping_add(&self, &rhs)
                }
            }
        )+
    };
}

macro_rules! impl_float_aggregation_value {
    ($($ty:ty),+) => {
        $(
            impl AggregationValue for $ty {
                const ZERO: Self = 0.0;
                const LOWER_BOUND: Self = <$ty>::NEG_INFINITY;
                const UPPER_BOUND: Self = <$ty>::INFINITY;

                #[inline]
                fn add(self, rhs: Self) -> Self {
                    self + rhs
                }
            }
        )+
    };
}

impl_integer_aggregation_value!(u8, u16, u32, u64, usize, i8, i16, i32, i64);
impl_float_aggregation_value!(f32, f64);

/// Associative and commutative binary operator with an identity element, such that
/// `combine(IDENTITY, x) == x` for all `x`
pub trait AggregationOperator<V: AtomicPrimitive>: Debug + Send + Sync {
    /// Identity element, the value of the empty slots
    const IDENTITY: V;

    /// Name of the operator
    fn name(&self) -> &'static str;

    /// Combine two values
    fn combine(&self, lhs: V, rhs: V) -> V;

    /// Combine `value` into the atomic `cell`. Concurrent writers never lose updates:
    /// the combined value is published with compare-and-swap and recomputed when another
    /// writer wins the race.
    ///
    /// Only atomicity is required here, the stage barrier publishes the values to the
    /// readers
    #[inline]
    fn atomic_combine(&self, cell: &V::Atomic, value: V) {
        let mut current = V::load(cell, Relaxed);
        loop {
            // Combining does not change the cell, skip the write
            let combined = self.combine(current, value);
            if combined.bit_eq(current) {
                return;
            }
            match V::compare_exchange_weak(cell, current, combined, Relaxed, Relaxed) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}
