//! Command implementations for the docqa binary.
//!
//! - start: load config, open the index (building it if missing), serve HTTP
//! - stop / status: via the PID file
//! - index: offline rebuild of the index
//! - ask / sync / upload / documents / stats: talk to a running server
//! - config: print the effective settings

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use docqa_client::{DocqaClient, QueryRequest};
use docqa_embeddings::build_embedder;
use docqa_generate::GeneratorRegistry;
use docqa_indexing::{DocumentIndex, IndexingConfig};
use docqa_service::{run_server_with_shutdown, shutdown_signal, DocumentPipeline, DocumentQaService};
use docqa_types::{RetrievalMode, Settings};

use crate::cli::PathOverrides;

/// Get the PID file path
fn pid_file_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| {
            #[cfg(unix)]
            {
                dirs.runtime_dir()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| dirs.cache_dir().to_path_buf())
            }
            #[cfg(not(unix))]
            {
                dirs.cache_dir().to_path_buf()
            }
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("docqa")
        .join("docqa.pid")
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, std::process::id().to_string())?;
    info!(path = ?pid_path, "Wrote PID file");
    Ok(())
}

fn remove_pid_file() {
    let pid_path = pid_file_path();
    if pid_path.exists() {
        if let Err(e) = fs::remove_file(&pid_path) {
            warn!(error = %e, "Failed to remove PID file");
        } else {
            info!("Removed PID file");
        }
    }
}

fn read_pid_file() -> Option<u32> {
    fs::read_to_string(pid_file_path())
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    // Signal 0 only checks that the process exists
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    log_level: Option<&str>,
    paths: &PathOverrides,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    apply_overrides(&mut settings, log_level, paths);
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, log_level: Option<&str>, paths: &PathOverrides) {
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    if let Some(dir) = &paths.documents_dir {
        settings.documents_dir = dir.clone();
    }
    if let Some(dir) = &paths.data_dir {
        settings.data_dir = dir.clone();
    }
}

/// Initialise tracing. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// The embedder may download a model, so build it off the async runtime.
async fn load_embedder(settings: &Settings) -> Result<Arc<dyn docqa_embeddings::EmbeddingModel>> {
    let embedding = settings.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || build_embedder(&embedding))
        .await?
        .context("Failed to load embedding model")?;
    info!(
        provider = %settings.embedding.provider,
        model = %embedder.info().name,
        dim = embedder.dimension(),
        "Embedding model ready"
    );
    Ok(embedder)
}

/// Start the HTTP server.
///
/// 1. Load configuration (defaults -> file -> env -> CLI)
/// 2. Load the embedder and model profiles
/// 3. Open the index, building it from the documents directory if missing
/// 4. Serve until SIGINT/SIGTERM
pub async fn start_daemon(
    config_path: Option<&str>,
    log_level: Option<&str>,
    foreground: bool,
    port: Option<u16>,
    host: Option<String>,
    paths: &PathOverrides,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level, paths)?;
    if let Some(port) = port {
        settings.http_port = port;
    }
    if let Some(host) = host {
        settings.http_host = host;
    }

    init_logging(&settings.log_level)?;

    info!(
        documents_dir = %settings.documents_dir,
        data_dir = %settings.data_dir,
        addr = %settings.http_addr(),
        index = ?settings.index.kind,
        default_model = %settings.generation.default_model,
        "docqa starting"
    );

    if !foreground {
        warn!("Background mode is not supported, running in foreground");
        warn!("Use a process manager (systemd, launchd) for background operation");
    }

    let addr: SocketAddr = settings
        .http_addr()
        .parse()
        .context("Invalid HTTP address")?;

    let embedder = load_embedder(&settings).await?;
    let generators =
        GeneratorRegistry::from_settings(&settings).context("Failed to set up model profiles")?;
    let service = DocumentQaService::open(settings, embedder, generators)
        .await
        .context("Failed to open document index")?;

    write_pid_file()?;
    let result = run_server_with_shutdown(addr, Arc::new(service), shutdown_signal()).await;
    remove_pid_file();

    result.map_err(|e| anyhow::anyhow!("Server error: {e}"))
}

/// Stop the running server by sending SIGTERM.
pub fn stop_daemon() -> Result<()> {
    let pid = read_pid_file().context("No PID file found - server may not be running")?;

    if !is_process_running(pid) {
        remove_pid_file();
        anyhow::bail!("Server not running (stale PID file removed)");
    }

    info!(pid, "Stopping server");

    #[cfg(unix)]
    {
        unsafe {
            if libc::kill(pid as i32, libc::SIGTERM) != 0 {
                anyhow::bail!("Failed to send SIGTERM to server");
            }
        }
        println!("Sent SIGTERM to docqa (PID {pid})");
    }

    #[cfg(not(unix))]
    {
        anyhow::bail!("Stop command not yet implemented on this platform");
    }

    Ok(())
}

pub fn show_status() -> Result<()> {
    let pid_path = pid_file_path();

    match read_pid_file() {
        Some(pid) if is_process_running(pid) => {
            println!("docqa is running (PID {pid})");
            println!("PID file: {pid_path:?}");
        }
        Some(pid) => {
            println!("docqa is NOT running (stale PID {pid} in {pid_path:?})");
        }
        None => {
            println!("docqa is NOT running (no PID file)");
        }
    }
    Ok(())
}

/// Rebuild the index from the documents directory, without a server.
pub async fn run_index(settings: Settings) -> Result<()> {
    let embedder = load_embedder(&settings).await?;
    let pipeline = DocumentPipeline::from_settings(&settings)?;
    let config = IndexingConfig::from_settings(&settings);

    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let index = DocumentIndex::open(config, embedder).context("Failed to open index")?;
        Ok(pipeline.sync(&index)?)
    })
    .await??;

    println!(
        "Indexed {} files ({} pages, {} chunks); skipped {}, failed {}",
        report.files, report.pages, report.chunks, report.skipped, report.failed
    );
    Ok(())
}

pub async fn handle_ask(
    endpoint: &str,
    query: String,
    model: Option<String>,
    top_k: Option<usize>,
    mode: Option<RetrievalMode>,
    conversation_id: Option<String>,
    json: bool,
) -> Result<()> {
    let client = DocqaClient::new(endpoint)?;
    let request = QueryRequest {
        query,
        model,
        top_k,
        mode,
        conversation_id,
    };
    let answer = client.ask(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.answer);
    if !answer.references.is_empty() {
        println!();
        println!("References:");
        for (i, r) in answer.references.iter().enumerate() {
            println!("  [{}] {} (page {}) score={:.4}", i + 1, r.file_name, r.page_number, r.score);
        }
    }
    if !answer.suggestions.is_empty() {
        println!();
        println!("You could also ask:");
        for s in &answer.suggestions {
            println!("  - {s}");
        }
    }
    println!();
    println!("Model: {}", answer.model);
    Ok(())
}

pub async fn handle_sync(endpoint: &str) -> Result<()> {
    let report = DocqaClient::new(endpoint)?.sync().await?;
    println!(
        "Synced {} files ({} pages, {} chunks); skipped {}, failed {}",
        report.files, report.pages, report.chunks, report.skipped, report.failed
    );
    Ok(())
}

pub async fn handle_upload(endpoint: &str, files: &[PathBuf]) -> Result<()> {
    let client = DocqaClient::new(endpoint)?;
    for file in files {
        let result = client
            .upload(file)
            .await
            .with_context(|| format!("Failed to upload {}", file.display()))?;
        println!("Uploaded {} ({} chunks)", result.uploaded.join(", "), result.chunks);
    }
    Ok(())
}

pub async fn handle_documents(endpoint: &str) -> Result<()> {
    let list = DocqaClient::new(endpoint)?.documents().await?;
    println!("{} documents", list.total_documents);
    for doc in &list.documents {
        println!("  {:<40} pages={:<5} chunks={}", doc.file_name, doc.pages, doc.chunks);
    }
    Ok(())
}

pub async fn handle_stats(endpoint: &str) -> Result<()> {
    let status = DocqaClient::new(endpoint)?.status().await?;
    println!("Index:       {:?} ({:?})", status.index_kind, status.metric);
    println!("Vectors:     {} x {}", status.vectors, status.dimension);
    println!("Chunks:      {}", status.chunks);
    println!("Documents:   {}", status.documents);
    println!("Index size:  {} bytes", status.index_size_bytes);
    println!("Embedding:   {}", status.embedding_model);
    println!("Models:      {} (default {})", status.models.join(", "), status.default_model);
    println!("Retrieval:   {}", status.retrieval_mode);
    println!("Started at:  {}", status.started_at);
    Ok(())
}

/// Settings as TOML, with API keys masked.
pub fn render_config(settings: &Settings) -> Result<String> {
    let mut settings = settings.clone();
    if settings.embedding.api_key.is_some() {
        settings.embedding.api_key = Some("***".to_string());
    }
    for profile in settings.models.values_mut() {
        if profile.api_key.is_some() {
            profile.api_key = Some("***".to_string());
        }
    }
    Ok(toml::to_string_pretty(&settings)?)
}

pub fn show_config(settings: &Settings) -> Result<()> {
    print!("{}", render_config(settings)?);
    Ok(())
}
