//! Groupby a single column with a single aggregation column
//!
//! # Concepts
//!
//! - `Groupby column`: the keys, rows with same key form a group
//! - `Aggregation column`: the values, values of the same group are combined with the
//! [`AggregationOperator`] into a single value
//!
//! The caller owns the output columns, they should hold at least as many elements as the
//! input columns because the number of groups is unknown before the execution. Only the
//! first `out_size` elements are written.

use std::time::Duration;

use snafu::{ResultExt, ensure};

use super::aggregate::AggregationOperator;
use super::atomic::{AtomicPrimitive, GroupKey};
use super::build::build_aggregation_table;
use super::device::Device;
use super::extract::{WriteCursor, extract_groupby_result};
use super::hash_table::{ConcurrentHashTable, LinearProbing, Probing};
use super::sort::sort_groupby_result;
use crate::common::exec_args::ExecArgs;
use crate::common::timer::StageTimer;
use crate::error::{
    AllocateHashTableSnafu, BuildSnafu, ColumnLengthMismatchSnafu, CreateDeviceSnafu,
    ExtractSnafu, InvalidOccupancySnafu, NonPositiveSizeSnafu, NullInputSnafu, NullOutputSnafu,
    OutputTooSmallSnafu, Result, SortSnafu, SynchronizeSnafu,
};

/// Metrics of a single groupby execution
#[derive(Debug, Default, Clone)]
pub struct GroupbyMetrics {
    /// The number of rows in the input columns
    pub num_rows: usize,
    /// The number of slots in the hash table
    pub capacity: usize,
    /// The number of groups written to the output columns
    pub num_groups: usize,
    /// Time spent in building the hash table
    pub build_time: Duration,
    /// Time spent in extracting the live slots
    pub extract_time: Duration,
    /// Time spent in sorting the result, zero if the result is not sorted
    pub sort_time: Duration,
}

/// Result of the [`GroupbyHash::execute`]
#[derive(Debug, Clone)]
pub struct GroupbyOutput {
    /// The number of groups, the first `out_size` elements of the output columns are
    /// the result
    pub out_size: usize,
    /// Metrics of the execution
    pub metrics: GroupbyMetrics,
}

/// Groupby based on the [`ConcurrentHashTable`]
///
/// # Generics
///
/// - `Op`: The aggregation operator
/// - `P`: Probing scheme of the hash table
#[derive(Debug)]
pub struct GroupbyHash<Op, P = LinearProbing> {
    aggregation_op: Op,
    probing: P,
    exec_args: ExecArgs,
    sort_result: bool,
    device: Device,
}

impl<Op> GroupbyHash<Op> {
    /// Try to create a new [`GroupbyHash`] with linear probing
    pub fn try_new(aggregation_op: Op, exec_args: ExecArgs, sort_result: bool) -> Result<Self> {
        Self::try_new_with_probing(aggregation_op, LinearProbing, exec_args, sort_result)
    }
}

impl<Op, P: Probing + Clone> GroupbyHash<Op, P> {
    /// Try to create a new [`GroupbyHash`] with the given probing scheme
    pub fn try_new_with_probing(
        aggregation_op: Op,
        probing: P,
        exec_args: ExecArgs,
        sort_result: bool,
    ) -> Result<Self> {
        ensure!(
            (1..=100).contains(&exec_args.occupancy),
            InvalidOccupancySnafu {
                occupancy: exec_args.occupancy
            }
        );
        let device = Device::try_new(&exec_args).context(CreateDeviceSnafu)?;

        Ok(Self {
            aggregation_op,
            probing,
            exec_args,
            sort_result,
            device,
        })
    }

    /// Args used by the execution
    pub fn exec_args(&self) -> &ExecArgs {
        &self.exec_args
    }

    /// Perform the groupby. Returns the number of groups written into the front of the
    /// output columns and the metrics.
    ///
    /// The hash table is sized from the number of rows, it can always hold all of the
    /// groups. Keys equal to [`GroupKey::SENTINEL`] are rejected
    #[tracing::instrument(
        skip_all,
        name = "GroupbyHash::execute",
        fields(num_rows = in_groupby_column.len(), sort_result = self.sort_result)
    )]
    pub fn execute<K, V>(
        &self,
        in_groupby_column: &[K],
        in_aggregation_column: &[V],
        out_groupby_column: &mut [K],
        out_aggregation_column: &mut [V],
    ) -> Result<GroupbyOutput>
    where
        K: GroupKey,
        V: AtomicPrimitive,
        Op: AggregationOperator<V>,
    {
        let num_rows = in_groupby_column.len();
        ensure!(
            num_rows == in_aggregation_column.len(),
            ColumnLengthMismatchSnafu {
                groupby_len: num_rows,
                aggregation_len: in_aggregation_column.len(),
            }
        );
        ensure!(num_rows > 0, NonPositiveSizeSnafu { size: 0_i64 });
        ensure!(
            out_groupby_column.len() >= num_rows && out_aggregation_column.len() >= num_rows,
            OutputTooSmallSnafu {
                input_size: num_rows,
                out_groupby_len: out_groupby_column.len(),
                out_aggregation_len: out_aggregation_column.len(),
            }
        );

        let mut metrics = GroupbyMetrics {
            num_rows,
            capacity: self.exec_args.hash_table_capacity(num_rows),
            ..Default::default()
        };

        // Initialize the hash table with the aggregation operator's identity value
        let table = ConcurrentHashTable::try_new(
            metrics.capacity,
            <Op as AggregationOperator<V>>::IDENTITY,
            self.probing.clone(),
        )
        .context(AllocateHashTableSnafu)?;
        metrics.capacity = table.size();

        {
            let _guard = StageTimer::start(&mut metrics.build_time);
            build_aggregation_table(
                &self.device,
                &table,
                in_groupby_column,
                in_aggregation_column,
                &self.aggregation_op,
            )
            .context(SynchronizeSnafu { stage: "build" })?
            .context(BuildSnafu)?;
        }

        {
            let _guard = StageTimer::start(&mut metrics.extract_time);
            let write_cursor = WriteCursor::new();
            metrics.num_groups = extract_groupby_result(
                &self.device,
                &table,
                out_groupby_column,
                out_aggregation_column,
                &write_cursor,
            )
            .context(SynchronizeSnafu { stage: "extract" })?
            .context(ExtractSnafu)?;
        }

        // Release the table before allocating the sort buffers
        drop(table);

        if self.sort_result {
            let _guard = StageTimer::start(&mut metrics.sort_time);
            sort_groupby_result(
                &self.device,
                out_groupby_column,
                out_aggregation_column,
                metrics.num_groups,
            )
            .context(SortSnafu)?;
        }

        tracing::debug!(
            "GroupbyHash: aggregate {} rows into {} groups with `{}` on a table with {} slots. Build time: `{:?}`, Extract time: `{:?}`, Sort time: `{:?}`",
            metrics.num_rows,
            metrics.num_groups,
            self.aggregation_op.name(),
            metrics.capacity,
            metrics.build_time,
            metrics.extract_time,
            metrics.sort_time,
        );

        Ok(GroupbyOutput {
            out_size: metrics.num_groups,
            metrics,
        })
    }
}

/// Performs the groupby with the default [`ExecArgs`] on the global rayon pool. Returns
/// the number of groups written into the front of the output columns.
///
/// See [`GroupbyHash::execute`] for details
pub fn groupby_hash<K, V, Op>(
    in_groupby_column: &[K],
    in_aggregation_column: &[V],
    out_groupby_column: &mut [K],
    out_aggregation_column: &mut [V],
    aggregation_op: Op,
    sort_result: bool,
) -> Result<usize>
where
    K: GroupKey,
    V: AtomicPrimitive,
    Op: AggregationOperator<V>,
{
    GroupbyHash::try_new(aggregation_op, ExecArgs::default(), sort_result)?
        .execute(
            in_groupby_column,
            in_aggregation_column,
            out_groupby_column,
            out_aggregation_column,
        )
        .map(|output| output.out_size)
}

/// [`groupby_hash`] for the caller holding raw buffers. Arguments are checked before
/// any work: null input pointers, a non-positive size and null output pointers are
/// rejected. On success the number of groups is written into `out_size`.
///
/// # Safety
///
/// - `in_groupby_column` and `in_aggregation_column` point to `in_column_size` initialized
///   elements
/// - `out_groupby_column` and `out_aggregation_column` point to buffers that can hold
///   `in_column_size` elements, they do not overlap the inputs and each other
#[allow(clippy::too_many_arguments)]
pub unsafe fn groupby_hash_from_raw_parts<K, V, Op>(
    in_groupby_column: *const K,
    in_aggregation_column: *const V,
    in_column_size: i64,
    out_groupby_column: *mut K,
    out_aggregation_column: *mut V,
    out_size: &mut usize,
    aggregation_op: Op,
    sort_result: bool,
) -> Result<()>
where
    K: GroupKey,
    V: AtomicPrimitive,
    Op: AggregationOperator<V>,
{
    ensure!(
        !in_groupby_column.is_null(),
        NullInputSnafu { column: "groupby" }
    );
    ensure!(
        !in_aggregation_column.is_null(),
        NullInputSnafu {
            column: "aggregation"
        }
    );
    ensure!(
        in_column_size > 0,
        NonPositiveSizeSnafu {
            size: in_column_size
        }
    );
    ensure!(
        !out_groupby_column.is_null(),
        NullOutputSnafu { column: "groupby" }
    );
    ensure!(
        !out_aggregation_column.is_null(),
        NullOutputSnafu {
            column: "aggregation"
        }
    );

    let len = in_column_size as usize;
    // SAFETY: pointers are non-null, the length and non-overlapping are guaranteed by
    // the caller
    let (in_groupby, in_aggregation, out_groupby, out_aggregation) = unsafe {
        (
            std::slice::from_raw_parts(in_groupby_column, len),
            std::slice::from_raw_parts(in_aggregation_column, len),
            std::slice::from_raw_parts_mut(out_groupby_column, len),
            std::slice::from_raw_parts_mut(out_aggregation_column, len),
        )
    };

    *out_size = groupby_hash(
        in_groupby,
        in_aggregation,
        out_groupby,
        out_aggregation,
        aggregation_op,
        sort_result,
    )?;
    Ok(())
}
