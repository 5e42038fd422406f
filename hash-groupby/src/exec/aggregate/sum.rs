//! Sum the values of each group

use super::{AggregationOperator, AggregationValue};

/// Aggregation operator that sums the values. Integers wrap around on overflow
#[derive(Debug, Default, Clone, Copy)]
pub struct Sum;

impl<V: AggregationValue> AggregationOperator<V> for Sum {
    const IDENTITY: V = V::ZERO;

    fn name(&self) -> &'static str {
        "Sum"
    }

    #[inline]
    fn combine(&self, lhs: V, rhs: V) -> V {
        lhs.add(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_identity() {
        assert_eq!(Sum.combine(<Sum as AggregationOperator<i16>>::IDENTITY, -9), -9);
        assert_eq!(Sum.combine(0.0_f64, 2.5), 2.5);
    }

    #[test]
    fn test_sum_wraps() {
        assert_eq!(Sum.combine(u8::MAX, 2), 1);
        assert_eq!(Sum.combine(Sum.combine(i8::MAX, 1), -1), i8::MAX);
    }
}
