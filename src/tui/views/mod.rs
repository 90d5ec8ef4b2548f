//! TUI view components
//!
//! Views only read state; the live loop owns every mutation.

pub mod helpers;
mod top_table;

pub use top_table::*;
