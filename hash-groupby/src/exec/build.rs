//! Build stage: populate the [`ConcurrentHashTable`] with one logical worker per row

use super::aggregate::AggregationOperator;
use super::atomic::{AtomicPrimitive, GroupKey};
use super::device::{Device, DeviceError};
use super::hash_table::{ConcurrentHashTable, HashTableError, Probing};

/// Name of the kernel that builds the aggregation table
pub const BUILD_KERNEL: &str = "build_aggregation_table";

/// Inserts `(groupby_column[i], aggregation_column[i])` into the table for every row `i`.
/// When a given key already exists in the table, the aggregation operation is computed
/// between the new and existing value, and the result is stored back.
///
/// Caller should guarantee the two columns have same length
pub fn build_aggregation_table<K, V, Op, P>(
    device: &Device,
    table: &ConcurrentHashTable<K, V, P>,
    groupby_column: &[K],
    aggregation_column: &[V],
    aggregation_op: &Op,
) -> Result<Result<(), HashTableError>, DeviceError>
where
    K: GroupKey,
    V: AtomicPrimitive,
    Op: AggregationOperator<V>,
    P: Probing,
{
    debug_assert_eq!(groupby_column.len(), aggregation_column.len());

    device.launch(BUILD_KERNEL, groupby_column.len(), |row| {
        table.insert_or_update(groupby_column[row], aggregation_column[row], aggregation_op)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::exec_args::tests::mock_exec_args;
    use crate::exec::aggregate::count::Count;
    use crate::exec::hash_table::LinearProbing;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    #[test]
    fn test_build_matches_sequential_reduction() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let keys = (0..10_000).map(|_| rng.gen_range(0..500_u32)).collect::<Vec<_>>();
        let ones = vec![1_u64; keys.len()];

        let device = Device::try_new(&mock_exec_args()).unwrap();
        let table =
            ConcurrentHashTable::<u32, u64>::try_new(keys.len() * 2, 0, LinearProbing).unwrap();
        build_aggregation_table(&device, &table, &keys, &ones, &Count)
            .unwrap()
            .unwrap();

        let mut expected = HashMap::new();
        keys.iter().for_each(|&key| *expected.entry(key).or_insert(0_u64) += 1);

        let actual = table.iter_live().collect::<HashMap<_, _>>();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_build_sentinel_key_aborts() {
        let device = Device::try_new(&mock_exec_args()).unwrap();
        let table = ConcurrentHashTable::<i16, i16>::try_new(8, 0, LinearProbing).unwrap();
        let keys = [1_i16, i16::MAX, 2];
        let values = [1_i16; 3];
        let outcome = build_aggregation_table(&device, &table, &keys, &values, &Count).unwrap();
        assert!(matches!(outcome, Err(HashTableError::SentinelKey { .. })));
    }
}
