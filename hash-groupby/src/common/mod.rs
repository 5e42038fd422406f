//! Common utilities shared by the stages

pub mod exec_args;
pub mod timer;
pub mod types;
pub mod utils;
