//! HTTP E2E tests: the router driven request by request.
//!
//! Every error must come back as `{"error":{"code","message"}}` with the
//! matching status, never as a panic or an empty body.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use docqa_generate::MockGenerator;
use docqa_service::router;
use e2e_tests::{body_json, docx_bytes, TestHarness};

const BOUNDARY: &str = "docqa-e2e-boundary";

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart(files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn assert_error_shape(body: &Value, status: StatusCode) {
    assert_eq!(body["error"]["code"], json!(status.as_u16()));
    assert!(
        body["error"]["message"].as_str().is_some_and(|m| !m.is_empty()),
        "error body should carry a message, got {body}"
    );
}

#[tokio::test]
async fn test_upload_docx_then_ask() {
    let harness = TestHarness::new();
    let app = harness.app().await;

    let docx = docx_bytes(&["The cafeteria serves lunch from noon until two."]);
    let response = app
        .clone()
        .oneshot(multipart(&[
            ("cafeteria.docx", docx.as_slice()),
            ("hours.txt", b"The building closes at eight in the evening."),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["uploaded"], json!(["cafeteria.docx", "hours.txt"]));
    assert_eq!(body["chunks"], json!(2));

    let response = app
        .clone()
        .oneshot(post_json(
            "/ask",
            json!({ "query": "cafeteria lunch", "mode": "keyword", "top_k": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["references"][0]["file_name"], "cafeteria.docx");
    assert_eq!(body["references"][0]["page_number"], json!(1));
    assert_eq!(body["suggestions"], json!(["Tell me more about: cafeteria lunch"]));
    assert_eq!(body["model"], "mock");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/download/cafeteria.docx")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
}

#[tokio::test]
async fn test_syncdocs_reports_skipped_files() {
    let harness = TestHarness::new();
    harness.write_text("a.txt", "Alpha.");
    harness.write_text("b.md", "# Beta");
    harness.write_text("c.xlsx", "not really a spreadsheet");
    let app = harness.app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/syncdocs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["files"], json!(2));
    assert_eq!(body["skipped"], json!(1));
    assert_eq!(body["failed"], json!(0));

    let response = app
        .oneshot(Request::builder().uri("/documents").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total_documents"], json!(2));
}

#[tokio::test]
async fn test_invalid_queries_are_rejected() {
    let harness = TestHarness::new();
    harness.write_text("a.txt", "Alpha.");
    let app = harness.app().await;

    for request in [
        json!({ "query": "" }),
        json!({ "query": "hello", "top_k": 0 }),
        json!({ "query": "hello", "model": "gpt-17" }),
        json!({ "query": "hello", "top_k": 1_000_000 }),
        json!({}),
        json!({ "query": 42 }),
    ] {
        let response = app
            .clone()
            .oneshot(post_json("/query", request.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "request {request}");
        assert_error_shape(&body_json(response).await, StatusCode::BAD_REQUEST);
    }

    for (content_type, body) in [
        ("application/json", "not json"),
        ("text/plain", r#"{"query":"hello"}"#),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        assert_error_shape(&body_json(response).await, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_rate_limited_model_maps_to_429() {
    let harness = TestHarness::new();
    harness.write_text("a.txt", "Alpha.");
    let service = harness
        .open_with(Arc::new(MockGenerator::rate_limited()))
        .await;
    let app = router(service);

    let response = app
        .oneshot(post_json("/query", json!({ "query": "hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_error_shape(&body_json(response).await, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_bad_uploads_are_rejected() {
    let harness = TestHarness::new();
    let app = harness.app().await;

    let response = app
        .clone()
        .oneshot(multipart(&[("payload.exe", b"MZ")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_error_shape(&body_json(response).await, StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(multipart(&[(".hidden.txt", b"secret")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was written for the rejected files
    assert!(!harness.documents_dir().join("payload.exe").exists());
    assert!(!harness.documents_dir().join(".hidden.txt").exists());

    let response = app
        .clone()
        .oneshot(post_json("/upload", json!({ "files": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_error_shape(&body_json(response).await, StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/download/missing.pdf")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_error_shape(&body_json(response).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_corrupt_reupload_keeps_stored_document() {
    let harness = TestHarness::new();
    let app = harness.app().await;
    let original = docx_bytes(&["Visitors sign in at reception."]);

    let response = app
        .clone()
        .oneshot(multipart(&[("visitors.docx", original.as_slice())]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(multipart(&[("visitors.docx", b"definitely not a zip")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_error_shape(&body_json(response).await, StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/download/visitors.docx")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.to_vec(), original);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/documents")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total_documents"], json!(1));
    assert_eq!(body["documents"][0]["file_name"], json!("visitors.docx"));
}

#[tokio::test]
async fn test_root_redirects_to_chat_page() {
    let harness = TestHarness::new();
    let app = harness.app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/static/chatbot.html");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/static/chatbot.html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
