//! docqa
//!
//! Answers questions about a directory of PDF, DOCX and text documents.
//!
//! # Usage
//!
//! ```bash
//! docqa start [--foreground] [--port PORT] [--documents-dir DIR]
//! docqa index
//! docqa ask "What does the handbook say about leave?"
//! docqa stop
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/docqa/config.toml)
//! 3. Environment variables (DOCQA_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use docqa_daemon::{
    handle_ask, handle_documents, handle_stats, handle_sync, handle_upload, init_logging,
    load_settings, run_index, show_config, show_status, start_daemon, stop_daemon, Cli, Commands,
    PathOverrides,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Start {
            foreground,
            port,
            host,
            paths,
        } => {
            start_daemon(config, log_level, foreground, port, host, &paths).await?;
        }
        Commands::Stop => {
            stop_daemon()?;
        }
        Commands::Status => {
            show_status()?;
        }
        Commands::Index { paths } => {
            let settings = load_settings(config, log_level, &paths)?;
            init_logging(&settings.log_level)?;
            run_index(settings).await?;
        }
        Commands::Ask {
            query,
            endpoint,
            model,
            top_k,
            mode,
            conversation,
            json,
        } => {
            handle_ask(&endpoint, query, model, top_k, mode, conversation, json).await?;
        }
        Commands::Sync { endpoint } => {
            handle_sync(&endpoint).await?;
        }
        Commands::Upload { files, endpoint } => {
            handle_upload(&endpoint, &files).await?;
        }
        Commands::Documents { endpoint } => {
            handle_documents(&endpoint).await?;
        }
        Commands::Stats { endpoint } => {
            handle_stats(&endpoint).await?;
        }
        Commands::Config => {
            let settings = load_settings(config, log_level, &PathOverrides::default())?;
            show_config(&settings)?;
        }
    }

    Ok(())
}
