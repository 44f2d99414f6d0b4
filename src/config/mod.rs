//! Configuration module for loggable
//!
//! - XDG-compliant path resolution
//! - Plugin settings persistence

pub mod paths;
pub mod settings;

pub use paths::LoggablePaths;
pub use settings::Settings;
