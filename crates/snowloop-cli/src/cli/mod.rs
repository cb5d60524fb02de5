//! Command-line interface for snowloop.

mod commands;
pub mod icons;

pub use commands::{is_verbose, run};
