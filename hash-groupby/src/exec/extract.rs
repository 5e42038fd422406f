//! Extraction stage: compact the live slots of the [`ConcurrentHashTable`] into the
//! output columns
//!
//! Every worker owns a single slot. A worker that finds a live slot fetches a unique
//! destination index from the write cursor and writes its `(key, value)` there. The
//! destination indexes form `0..live_count` without collisions and gaps, however the
//! order is not related to the order of the slots.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;

use crossbeam_utils::CachePadded;
use snafu::{Snafu, ensure};

use super::atomic::{AtomicPrimitive, GroupKey};
use super::device::{Device, DeviceError};
use super::hash_table::{ConcurrentHashTable, Probing};
use super::shared_output::SharedOutput;
use crate::shared_output_write_safety;

/// Name of the kernel that extracts the groupby result
pub const EXTRACT_KERNEL: &str = "extract_groupby_result";

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExtractError {
    #[snafu(display(
        "Live slot is assigned to index `{index}`, however the groupby output has `{out_groupby_len}` elements and the aggregation output has `{out_aggregation_len}` elements"
    ))]
    OutputTooSmall {
        index: usize,
        out_groupby_len: usize,
        out_aggregation_len: usize,
    },
}

/// Counter shared by all of the extraction workers. Its final value is the number of
/// live slots
#[derive(Debug, Default)]
pub struct WriteCursor(CachePadded<AtomicUsize>);

impl WriteCursor {
    /// Create a cursor that starts from zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a unique destination index
    #[inline]
    fn fetch_next(&self) -> usize {
        self.0.fetch_add(1, Relaxed)
    }

    /// Number of indexes handed out. Only meaningful after the stage barrier
    #[inline]
    pub fn position(&self) -> usize {
        self.0.load(Relaxed)
    }
}

/// Extract every live key and value of the table into the output columns, returns
/// the number of groups written into the front of the output columns.
///
/// The cursor has to be zero. Output columns with as many elements as the rows inserted
/// into the table always hold all of the live slots. A live slot whose index falls out
/// of the output columns is not written, the inner result reports
/// [`ExtractError::OutputTooSmall`] and the content of the output columns is unspecified
pub fn extract_groupby_result<K, V, P>(
    device: &Device,
    table: &ConcurrentHashTable<K, V, P>,
    out_groupby_column: &mut [K],
    out_aggregation_column: &mut [V],
    write_cursor: &WriteCursor,
) -> Result<Result<usize, ExtractError>, DeviceError>
where
    K: GroupKey,
    V: AtomicPrimitive,
    P: Probing,
{
    debug_assert_eq!(write_cursor.position(), 0);

    let slots = table.iter_slots().as_slice();
    let out_groupby = SharedOutput::new(out_groupby_column);
    let out_aggregation = SharedOutput::new(out_aggregation_column);
    let out_len = std::cmp::min(out_groupby.len(), out_aggregation.len());

    let outcome = device.launch(EXTRACT_KERNEL, table.size(), |index| {
        let (key, value) = slots[index].load();
        if !key.bit_eq(K::SENTINEL) {
            let write_index = write_cursor.fetch_next();
            ensure!(
                write_index < out_len,
                OutputTooSmallSnafu {
                    index: write_index,
                    out_groupby_len: out_groupby.len(),
                    out_aggregation_len: out_aggregation.len(),
                }
            );
            shared_output_write_safety!();
            unsafe {
                out_groupby.write(write_index, key);
                out_aggregation.write(write_index, value);
            }
        }
        Ok::<_, ExtractError>(())
    })?;

    // The launch returns after all of the workers finished, the cursor is final
    Ok(outcome.map(|()| write_cursor.position()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::exec_args::tests::mock_exec_args;
    use crate::exec::aggregate::min_max::Min;
    use crate::exec::aggregate::sum::Sum;
    use crate::exec::hash_table::{LinearProbing, TriangularProbing};
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_extract_compacts_live_slots() {
        let device = Device::try_new(&mock_exec_args()).unwrap();
        let table = ConcurrentHashTable::<i64, f32, _>::try_new(
            200,
            <Min as crate::exec::aggregate::AggregationOperator<f32>>::IDENTITY,
            TriangularProbing,
        )
        .unwrap();
        (0..100_i64).for_each(|key| {
            table.insert_or_update(key * 3 - 50, key as f32, &Min {}).unwrap();
            table.insert_or_update(key * 3 - 50, -(key as f32), &Min {}).unwrap();
        });

        let mut out_keys = vec![0_i64; 100];
        let mut out_values = vec![0_f32; 100];
        let cursor = WriteCursor::new();
        let out_size =
            extract_groupby_result(&device, &table, &mut out_keys, &mut out_values, &cursor)
                .unwrap()
                .unwrap();
        assert_eq!(out_size, 100);

        let actual = out_keys.into_iter().zip(out_values).collect::<HashMap<_, _>>();
        assert_eq!(actual.len(), 100);
        (0..100_i64).for_each(|key| assert_eq!(actual[&(key * 3 - 50)], -(key as f32)));
    }

    #[test]
    fn test_extract_empty_table() {
        let device = Device::try_new(&mock_exec_args()).unwrap();
        let table = ConcurrentHashTable::<u8, u8>::try_new(10, 0, LinearProbing).unwrap();
        let mut out_keys = [7_u8; 3];
        let mut out_values = [7_u8; 3];
        let out_size = extract_groupby_result(
            &device,
            &table,
            &mut out_keys,
            &mut out_values,
            &WriteCursor::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(out_size, 0);
        assert_eq!(out_keys, [7; 3]);
    }

    #[test]
    fn test_extract_into_undersized_output() {
        let device = Device::try_new(&mock_exec_args()).unwrap();
        let table = ConcurrentHashTable::<u32, u64>::try_new(128, 0, LinearProbing).unwrap();
        (0..64_u32).for_each(|key| table.insert_or_update(key, 1, &Sum).unwrap());

        let mut out_keys = vec![0_u32; 1];
        let mut out_values = vec![0_u64; 1];
        let err = extract_groupby_result(
            &device,
            &table,
            &mut out_keys,
            &mut out_values,
            &WriteCursor::new(),
        )
        .unwrap()
        .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::OutputTooSmall {
                out_groupby_len: 1,
                out_aggregation_len: 1,
                ..
            }
        ));
        assert_eq!(out_keys.len(), 1);

        // Only one of the columns is too small
        let mut out_keys = vec![0_u32; 64];
        let mut out_values = vec![0_u64; 10];
        let err = extract_groupby_result(
            &device,
            &table,
            &mut out_keys,
            &mut out_values,
            &WriteCursor::new(),
        )
        .unwrap()
        .unwrap_err();
        let ExtractError::OutputTooSmall { index, .. } = err;
        assert!(index >= 10);

        // Exactly the live count is enough
        let mut out_values = vec![0_u64; 64];
        let out_size = extract_groupby_result(
            &device,
            &table,
            &mut out_keys,
            &mut out_values,
            &WriteCursor::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(out_size, 64);
    }

    #[test]
    fn test_write_cursor_indexes_are_dense() {
        let num_keys = 20_000_u64;
        let device = Device::try_new(&mock_exec_args()).unwrap();
        let table =
            ConcurrentHashTable::<u64, u64>::try_new(num_keys as usize * 2, 0, LinearProbing)
                .unwrap();
        (0..num_keys).for_each(|key| table.insert_or_update(key * 7, key, &Sum).unwrap());

        // One extra element that must never be written
        let mut out_keys = vec![u64::SENTINEL; num_keys as usize + 1];
        let mut out_values = vec![u64::MAX; num_keys as usize + 1];
        let cursor = WriteCursor::new();
        let out_size =
            extract_groupby_result(&device, &table, &mut out_keys, &mut out_values, &cursor)
                .unwrap()
                .unwrap();
        assert_eq!(out_size, num_keys as usize);
        assert_eq!(cursor.position(), out_size);

        assert_eq!(out_keys[out_size], u64::SENTINEL);
        assert_eq!(out_values[out_size], u64::MAX);
        let keys = out_keys[..out_size].iter().copied().collect::<HashSet<_>>();
        assert_eq!(keys.len(), out_size);
        assert_eq!(keys, (0..num_keys).map(|key| key * 7).collect::<HashSet<_>>());
        assert!(
            out_keys[..out_size]
                .iter()
                .zip(&out_values)
                .all(|(&key, &value)| value == key / 7)
        );
    }
}
