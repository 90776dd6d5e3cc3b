//! Daily per-user CPU accounting snapshots, retained for a rolling window
//! and summed into a per-user report.

pub mod cli;
pub mod parsers;
pub mod services;
pub mod types;
