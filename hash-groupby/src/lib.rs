#![warn(clippy::todo)]
#![deny(
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    rustdoc::private_intra_doc_links,
    rust_2018_idioms,
    missing_docs,
    clippy::needless_borrow,
    clippy::redundant_clone,
    missing_debug_implementations
)]

//! # Hash Groupby
//!
//! `hash-groupby` computes a single column `GROUP BY` over large, unsorted, flat columns
//! with a fixed capacity, lock-free, open addressing hash table that is built by many
//! worker threads at the same time.
//!
//! The pipeline has three stages:
//!
//! - Build: one logical worker per input row inserts/updates `(key, value)` into the
//!   [`ConcurrentHashTable`](exec::hash_table::ConcurrentHashTable)
//! - Extract: one logical worker per table slot compacts the live slots into the output
//!   columns through an atomic write cursor
//! - Sort(optional): radix sort the compacted pairs by key
//!
//! ```
//! use hash_groupby::exec::aggregate::sum::Sum;
//! use hash_groupby::groupby_hash;
//!
//! let keys = [1_u32, 2, 1, 3, 2, 1];
//! let values = [10_i64, 20, 30, 40, 50, 60];
//! let mut out_keys = [0_u32; 6];
//! let mut out_values = [0_i64; 6];
//!
//! let out_size = groupby_hash(&keys, &values, &mut out_keys, &mut out_values, Sum, true).unwrap();
//! assert_eq!(&out_keys[..out_size], &[1, 2, 3]);
//! assert_eq!(&out_values[..out_size], &[100, 70, 40]);
//! ```

pub mod common;
pub mod error;
pub mod exec;
mod macros;
use self::macros::shared_output_write_safety;

pub use self::error::{ErrorKind, GroupbyError};
pub use self::exec::groupby::{
    GroupbyHash, GroupbyMetrics, GroupbyOutput, groupby_hash, groupby_hash_from_raw_parts,
};

/// The occupancy of the hash table determines its capacity. A value of 50 implies
/// 50% occupancy, i.e., `hash_table_size == 2 * input_size`
pub const DEFAULT_HASH_TABLE_OCCUPANCY: u32 = 50;

/// Number of logical workers grouped into a single batch when a stage is launched
pub const THREAD_BLOCK_SIZE: usize = 256;

mod private {
    /// Sealed trait protect against downstream implementations
    pub trait Sealed {}
}
