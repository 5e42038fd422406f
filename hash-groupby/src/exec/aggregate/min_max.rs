//! Min/Max aggregation operator

use super::{AggregationOperator, AggregationValue};

/// Min/Max aggregation operator
///
/// FIXME: If we compute the min/max for the float values that contains `NaN`, the result
/// depends on the arrival order
///
/// # Generic
///
/// - `IS_MIN`: If it is true, it will be min aggregation operator
#[derive(Debug, Default, Clone, Copy)]
pub struct MinMax<const IS_MIN: bool>;

/// Min aggregation operator
pub type Min = MinMax<true>;
/// Max aggregation operator
pub type Max = MinMax<false>;

impl<const IS_MIN: bool, V: AggregationValue> AggregationOperator<V> for MinMax<IS_MIN> {
    const IDENTITY: V = if IS_MIN {
        V::UPPER_BOUND
    } else {
        V::LOWER_BOUND
    };

    fn name(&self) -> &'static str {
        if IS_MIN { "Min" } else { "Max" }
    }

    #[inline]
    fn combine(&self, lhs: V, rhs: V) -> V {
        if IS_MIN {
            if rhs < lhs { rhs } else { lhs }
        } else if rhs > lhs {
            rhs
        } else {
            lhs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_identity() {
        assert_eq!(<Min as AggregationOperator<u32>>::IDENTITY, u32::MAX);
        assert_eq!(<Max as AggregationOperator<i64>>::IDENTITY, i64::MIN);
        assert_eq!(
            <Max as AggregationOperator<f32>>::IDENTITY,
            f32::NEG_INFINITY
        );
        assert_eq!(Min {}.combine(<Min as AggregationOperator<f64>>::IDENTITY, -1e300), -1e300);
    }

    #[test]
    fn test_min_max_combine() {
        assert_eq!(Min {}.combine(3_i8, -4), -4);
        assert_eq!(Max {}.combine(3_i8, -4), 3);
        assert_eq!(Max {}.combine(3_u16, 3), 3);
        assert_eq!(<Min as AggregationOperator<u8>>::name(&Min {}), "Min");
        assert_eq!(<Max as AggregationOperator<u8>>::name(&Max {}), "Max");
    }
}
