//! CLI argument parsing for the docqa binary.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docqa_client::DEFAULT_ENDPOINT;
use docqa_types::RetrievalMode;

/// Document question answering
///
/// Indexes a directory of PDF, DOCX and text files and answers questions
/// about them with references.
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/docqa/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings overrides shared by the commands that open the index.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PathOverrides {
    /// Override the documents directory
    #[arg(long)]
    pub documents_dir: Option<String>,

    /// Override the index data directory
    #[arg(long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,

        /// Override HTTP port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override bind address
        #[arg(long)]
        host: Option<String>,

        #[command(flatten)]
        paths: PathOverrides,
    },

    /// Stop the running server
    Stop,

    /// Show whether the server is running
    Status,

    /// Rebuild the index from the documents directory without a server
    Index {
        #[command(flatten)]
        paths: PathOverrides,
    },

    /// Ask a running server a question
    Ask {
        /// The question
        query: String,

        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Model profile to answer with
        #[arg(short, long)]
        model: Option<String>,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Retrieval mode: vector, keyword or hybrid
        #[arg(long)]
        mode: Option<RetrievalMode>,

        /// Continue an earlier conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Print the raw JSON answer
        #[arg(long)]
        json: bool,
    },

    /// Ask a running server to rebuild its index
    Sync {
        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },

    /// Upload files to a running server
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },

    /// List the documents a running server has indexed
    Documents {
        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },

    /// Show index and model statistics of a running server
    Stats {
        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },

    /// Print the effective configuration as TOML
    Config,
}
