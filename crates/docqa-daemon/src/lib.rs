//! docqa daemon library exports.
//!
//! This crate provides the `docqa` binary: the HTTP server plus the
//! commands that drive it.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, PathOverrides};
pub use commands::{
    handle_ask, handle_documents, handle_stats, handle_sync, handle_upload, init_logging,
    load_settings, render_config, run_index, show_config, show_status, start_daemon, stop_daemon,
};
