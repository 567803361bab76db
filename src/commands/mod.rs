//! CLI command implementations for kube-resource-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and resource source validation
//! - `config`: Sample configuration generation
//! - `test`: Refresh and extraction dry run
//! - `kinds`: Resource kind listing

pub mod check;
pub mod config;
pub mod kinds;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use kinds::command_kinds;
pub use test::command_test;
