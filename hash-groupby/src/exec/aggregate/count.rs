//! Count the rows of each group

use super::{AggregationOperator, AggregationValue};

/// Aggregation operator that counts the rows of each group. The aggregation column
/// fed to the groupby should be a column of ones: counting is summing the ones
#[derive(Debug, Default, Clone, Copy)]
pub struct Count;

impl<V: AggregationValue> AggregationOperator<V> for Count {
    const IDENTITY: V = V::ZERO;

    fn name(&self) -> &'static str {
        "Count"
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
    fn test_count_ones() {
        let count = [1_u32; 7]
            .into_iter()
            .fold(<Count as AggregationOperator<u32>>::IDENTITY, |acc, one| {
                Count.combine(acc, one)
            });
        assert_eq!(count, 7);
        assert_eq!(<Count as AggregationOperator<i64>>::IDENTITY, 0);
        assert_eq!(<Count as AggregationOperator<u8>>::name(&Count), "Count");
    }

    #[test]
    fn test_count_combines_partial_counts() {
        assert_eq!(Count.combine(3_u64, 4), 7);
        assert_eq!(Count.combine(<Count as AggregationOperator<f64>>::IDENTITY, 1.0), 1.0);
    }
}
