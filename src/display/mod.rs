//! Display formatting for terminal output
//!
//! Formats change-log records as tables and detail views.

pub mod changelog;

pub use changelog::{format_record_details, format_record_list};
