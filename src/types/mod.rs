//! Type definitions for usertime

mod error;
mod usage;

pub use error::*;
pub use usage::*;
