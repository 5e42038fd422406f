//! Execution module contains the stages of the groupby and the [`Device`] that
//! executes them
//!
//! [`Device`]: device::Device

pub mod aggregate;
pub mod atomic;
pub mod build;
pub mod device;
pub mod extract;
pub mod groupby;
pub mod hash_table;
mod shared_output;
pub mod sort;
