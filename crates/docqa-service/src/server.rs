//! HTTP API.
//!
//! Routes:
//! - GET  /                      redirect to the chat page
//! - GET  /static/chatbot.html   bundled chat page
//! - GET  /health                liveness
//! - POST /query, /ask           answer a question
//! - POST /processdocs, /syncdocs  rebuild from the documents directory
//! - POST /upload                multipart upload of one or more files
//! - GET  /documents             indexed files
//! - GET  /status                index and model status
//! - GET  /download/{file_name}  raw bytes of a stored document

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::service::{DocumentQaService, QueryRequest};

const CHATBOT_HTML: &str = include_str!("../static/chatbot.html");

pub type AppState = Arc<DocumentQaService>;

/// Build the router over a shared service.
pub fn router(service: AppState) -> Router {
    let max_body = service.settings().server.max_upload_mb * 1024 * 1024;

    Router::new()
        .route("/", get(root))
        .route("/static/chatbot.html", get(chatbot))
        .route("/health", get(health))
        // Question answering
        .route("/query", post(query))
        .route("/ask", post(query))
        // Document management
        .route("/processdocs", post(process_docs))
        .route("/syncdocs", post(process_docs))
        .route("/upload", post(upload))
        .route("/documents", get(documents))
        .route("/download/{file_name}", get(download))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn root() -> Redirect {
    Redirect::temporary("/static/chatbot.html")
}

async fn chatbot() -> Html<&'static str> {
    Html(CHATBOT_HTML)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn query(
    State(service): State<AppState>,
    request: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<docqa_types::Answer>, ServiceError> {
    let Json(request) = request.map_err(|e| ServiceError::InvalidInput(e.body_text()))?;
    Ok(Json(service.answer(request).await?))
}

async fn process_docs(State(service): State<AppState>) -> Result<Json<Value>, ServiceError> {
    let report = service.sync_documents().await?;
    Ok(Json(json!({
        "status": "success",
        "files": report.files,
        "pages": report.pages,
        "chunks": report.chunks,
        "skipped": report.skipped,
        "failed": report.failed,
    })))
}

async fn upload(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ServiceError> {
    let mut multipart = multipart.map_err(|e| ServiceError::InvalidInput(e.body_text()))?;
    let mut uploaded = Vec::new();
    let mut chunks = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let report = service.ingest_file(&file_name, bytes.to_vec()).await?;
        chunks += report.chunks;
        uploaded.push(report.file_name);
    }

    if uploaded.is_empty() {
        return Err(ServiceError::InvalidInput("no files in upload".into()));
    }
    Ok(Json(json!({
        "status": "success",
        "uploaded": uploaded,
        "chunks": chunks,
    })))
}

async fn documents(State(service): State<AppState>) -> Result<Json<Value>, ServiceError> {
    let documents = service.documents().await?;
    Ok(Json(json!({
        "total_documents": documents.len(),
        "documents": documents,
    })))
}

async fn download(
    State(service): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, ServiceError> {
    let path = service.document_path(&file_name)?;
    let bytes = tokio::fs::read(&path).await?;
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
        Some(ext) if ext.eq_ignore_ascii_case("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some(ext) if ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown") => {
            "text/markdown; charset=utf-8"
        }
        _ => "text/plain; charset=utf-8",
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

async fn status(
    State(service): State<AppState>,
) -> Result<Json<crate::service::ServiceStatus>, ServiceError> {
    Ok(Json(service.status().await?))
}

/// Serve until `shutdown_signal` resolves.
pub async fn run_server_with_shutdown<F>(
    addr: SocketAddr,
    service: AppState,
    shutdown_signal: F,
) -> Result<(), ServiceError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
