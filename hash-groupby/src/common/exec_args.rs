//! [`ExecArgs`] holds the knobs of a single groupby execution

use std::num::NonZeroUsize;

use super::types::ParallelismDegree;
use crate::{DEFAULT_HASH_TABLE_OCCUPANCY, THREAD_BLOCK_SIZE};

const DEFAULT_BLOCK_SIZE: NonZeroUsize = NonZeroUsize::new(THREAD_BLOCK_SIZE).unwrap();

/// Arguments for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecArgs {
    /// Execution parallelism. `None` means the stages run on the global rayon pool,
    /// otherwise a dedicated pool with the given number of threads is created
    pub parallelism: Option<ParallelismDegree>,
    /// Target occupancy of the hash table in percent, in range `1..=100`
    pub occupancy: u32,
    /// Number of logical workers processed by a single task of the pool
    pub block_size: NonZeroUsize,
}

impl ExecArgs {
    /// Number of slots the hash table needs to hold `num_rows` keys under the
    /// configured occupancy. The table is sized from the row count rather than the
    /// cardinality, the result is never zero.
    ///
    /// Caller should guarantee the occupancy is valid
    #[inline]
    pub fn hash_table_capacity(&self, num_rows: usize) -> usize {
        debug_assert!((1..=100).contains(&self.occupancy));
        let capacity = (num_rows as u128 * 100).div_ceil(self.occupancy as u128);
        usize::try_from(capacity).unwrap_or(usize::MAX).max(1)
    }
}

impl Default for ExecArgs {
    fn default() -> Self {
        Self {
            parallelism: None,
            occupancy: DEFAULT_HASH_TABLE_OCCUPANCY,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}
