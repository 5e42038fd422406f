//! Utils

pub mod hash;
pub mod memory;
