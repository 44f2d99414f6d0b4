//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the change-log store.

pub mod changelog;
pub mod export;

pub use changelog::{handle_log_command, LogCommands};
pub use export::{handle_export_command, ExportArgs, ExportFormat};
