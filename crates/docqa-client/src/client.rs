//! HTTP client for the docqa server.

use std::path::Path;
use std::time::Duration;

use docqa_service::{QueryRequest, ServiceStatus, SyncReport};
use docqa_types::{Answer, DocumentSummary};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ClientError;

/// Default endpoint for a local docqa server.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

/// Answering can take as long as the model does.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub uploaded: Vec<String>,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
    pub total_documents: usize,
}

/// Client for a running docqa server.
#[derive(Debug, Clone)]
pub struct DocqaClient {
    base: Url,
    http: reqwest::Client,
}

impl DocqaClient {
    /// Create a client for `endpoint`, e.g. `http://localhost:8000`.
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        let base = Url::parse(endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidEndpoint(endpoint.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        debug!(endpoint, "Created docqa client");
        Ok(Self { base, http })
    }

    pub fn connect_default() -> Result<Self, ClientError> {
        Self::new(DEFAULT_ENDPOINT)
    }

    pub fn endpoint(&self) -> &str {
        self.base.as_str()
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::InvalidEndpoint(e.to_string()))
    }

    /// Turn non-2xx responses into `ClientError::Server`, using the
    /// server's `{"error":{"message"}}` body when there is one.
    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(text);
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// True when the server answers `/health`.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let response = self.http.get(self.url("health")?).send().await?;
        Ok(response.status().is_success())
    }

    pub async fn ask(&self, request: QueryRequest) -> Result<Answer, ClientError> {
        debug!(query = %request.query, "Ask request");
        let response = self
            .http
            .post(self.url("query")?)
            .json(&request)
            .send()
            .await?;
        Self::json(response).await
    }

    /// Rebuild the server's index from its documents directory.
    pub async fn sync(&self) -> Result<SyncReport, ClientError> {
        let response = self.http.post(self.url("processdocs")?).send().await?;
        let report: SyncReport = Self::json(response).await?;
        info!(files = report.files, chunks = report.chunks, "Server synced documents");
        Ok(report)
    }

    /// Upload one local file.
    pub async fn upload(&self, path: &Path) -> Result<UploadResult, ClientError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ClientError::Io(std::io::Error::other("path has no file name")))?;
        let bytes = tokio::fs::read(path).await?;

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("files", part);
        let response = self
            .http
            .post(self.url("upload")?)
            .multipart(form)
            .send()
            .await?;
        Self::json(response).await
    }

    pub async fn documents(&self) -> Result<DocumentList, ClientError> {
        let response = self.http.get(self.url("documents")?).send().await?;
        Self::json(response).await
    }

    pub async fn status(&self) -> Result<ServiceStatus, ClientError> {
        let response = self.http.get(self.url("status")?).send().await?;
        Self::json(response).await
    }

    /// Raw bytes of a stored document.
    pub async fn download(&self, file_name: &str) -> Result<Vec<u8>, ClientError> {
        let mut url = self.url("download/")?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidEndpoint(self.endpoint().to_string()))?
            .pop_if_empty()
            .push(file_name);
        let response = Self::check(self.http.get(url).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            DocqaClient::new("not a url"),
            Err(ClientError::InvalidEndpoint(_))
        ));
        assert!(DocqaClient::connect_default().is_ok());
    }

    #[tokio::test]
    async fn test_ask() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(json!({ "query": "Who signs invoices?" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "The finance lead.",
                "references": [
                    { "file_name": "finance.pdf", "page_number": 4, "snippet": "...", "score": 0.2 }
                ],
                "suggestions": ["Who approves budgets?"],
                "model": "llama3.1"
            })))
            .mount(&server)
            .await;

        let client = DocqaClient::new(&server.uri()).unwrap();
        let answer = client
            .ask(QueryRequest::new("Who signs invoices?"))
            .await
            .unwrap();
        assert_eq!(answer.answer, "The finance lead.");
        assert_eq!(answer.references[0].page_number, 4);
        assert_eq!(answer.model, "llama3.1");
    }

    #[tokio::test]
    async fn test_server_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Generation error: Rate limit exceeded" }
            })))
            .mount(&server)
            .await;

        let client = DocqaClient::new(&server.uri()).unwrap();
        match client.ask(QueryRequest::new("hi")).await {
            Err(ClientError::Server { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "Generation error: Rate limit exceeded");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sync_and_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/processdocs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success", "files": 3, "pages": 9, "chunks": 20, "skipped": 1, "failed": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_documents": 1,
                "documents": [{ "file_name": "a.txt", "pages": 1, "chunks": 2 }]
            })))
            .mount(&server)
            .await;

        let client = DocqaClient::new(&server.uri()).unwrap();
        let report = client.sync().await.unwrap();
        assert_eq!(report.files, 3);
        assert_eq!(report.skipped, 1);

        let list = client.documents().await.unwrap();
        assert_eq!(list.total_documents, 1);
        assert_eq!(list.documents[0].chunks, 2);
    }

    #[tokio::test]
    async fn test_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success", "uploaded": ["notes.txt"], "chunks": 1
            })))
            .mount(&server)
            .await;

        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("notes.txt");
        std::fs::write(&file, "some notes").unwrap();

        let client = DocqaClient::new(&server.uri()).unwrap();
        let result = client.upload(&file).await.unwrap();
        assert_eq!(result.uploaded, vec!["notes.txt".to_string()]);

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("filename=\"notes.txt\""));
        assert!(body.contains("some notes"));
    }

    #[tokio::test]
    async fn test_download_encodes_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/annual%20report.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let client = DocqaClient::new(&server.uri()).unwrap();
        let bytes = client.download("annual report.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_health_unreachable() {
        let client = DocqaClient::new("http://127.0.0.1:9").unwrap();
        assert!(client.health().await.is_err());
    }
}
