//! Pipeline E2E tests: documents on disk through to answers.
//!
//! Covers indexing on first open, reuse of a persisted index, rebuilding
//! when the vector index is missing, and incremental ingestion.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use docqa_generate::MockGenerator;
use docqa_service::QueryRequest;
use docqa_types::RetrievalMode;
use e2e_tests::{remove_vector_index, TestHarness};

#[tokio::test]
async fn test_first_open_indexes_documents() {
    let harness = TestHarness::new();
    harness.write_text("returns.txt", "Unused items may be returned within thirty days.");
    harness.write_docx(
        "handbook.docx",
        &["Employees accrue two days of leave per month.", "Leave requests go to your manager."],
    );
    harness.write_text("notes.csv", "ignored,because,unsupported");

    let service = harness.open().await;
    let status = service.status().await.unwrap();

    assert_eq!(status.documents, 2);
    assert_eq!(status.vectors, status.chunks);
    assert_eq!(status.keyword_docs as usize, status.chunks);

    let mut names: Vec<String> = service
        .documents()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.file_name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["handbook.docx".to_string(), "returns.txt".to_string()]);
}

#[tokio::test]
async fn test_answer_cites_the_matching_document() {
    let harness = TestHarness::new();
    harness.write_text("returns.txt", "Unused items may be returned within thirty days.");
    harness.write_text("shipping.txt", "Orders ship from the warehouse every weekday morning.");

    let generator = Arc::new(MockGenerator::new());
    let service = harness.open_with(generator.clone()).await;

    let mut request = QueryRequest::new("Unused items may be returned within thirty days.");
    request.top_k = Some(1);
    let answer = service.answer(request).await.unwrap();

    assert_eq!(answer.references.len(), 1);
    assert_eq!(answer.references[0].file_name, "returns.txt");
    assert_eq!(answer.references[0].page_number, 1);
    assert_eq!(answer.model, "mock");

    // The model saw the retrieved chunk in its prompt
    let requests = generator.requests();
    assert!(requests[0].prompt.contains("returns.txt"));
    assert!(requests[0].prompt.contains("thirty days"));
}

#[tokio::test]
async fn test_persisted_index_is_reused() {
    let harness = TestHarness::new();
    harness.write_text("a.txt", "Alpha document about invoices.");

    let before = {
        let service = harness.open().await;
        service.status().await.unwrap()
    };

    // New files on disk are not picked up until a sync
    harness.write_text("b.txt", "Beta document about payroll.");
    let service = harness.open().await;
    let after = service.status().await.unwrap();
    assert_eq!(after.documents, before.documents);
    assert_eq!(after.chunks, before.chunks);

    let report = service.sync_documents().await.unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(service.status().await.unwrap().documents, 2);
}

#[tokio::test]
async fn test_missing_vector_index_is_rebuilt() {
    let harness = TestHarness::new();
    harness.write_text("a.txt", "Alpha document about invoices.");
    harness.write_text("b.txt", "Beta document about payroll.");

    let chunks = {
        let service = harness.open().await;
        service.status().await.unwrap().chunks
    };
    assert!(chunks >= 2);

    remove_vector_index(&harness.settings);

    let service = harness.open().await;
    let status = service.status().await.unwrap();
    assert_eq!(status.vectors, chunks);
    assert_eq!(status.chunks, chunks);

    let hits = service
        .retrieve("Beta document about payroll.", 1, RetrievalMode::Vector)
        .await
        .unwrap();
    assert_eq!(hits[0].chunk.file_name, "b.txt");
}

#[tokio::test]
async fn test_ingest_replaces_existing_file() {
    let harness = TestHarness::new();
    harness.write_text("policy.txt", "Old policy text about parking.");
    let service = harness.open().await;

    let report = service
        .ingest_file("policy.txt", b"New policy text about cycling.".to_vec())
        .await
        .unwrap();
    assert_eq!(report.file_name, "policy.txt");
    assert_eq!(report.chunks, 1);

    let status = service.status().await.unwrap();
    assert_eq!(status.documents, 1);
    assert_eq!(status.chunks, 1);

    let hits = service
        .retrieve("cycling", 5, RetrievalMode::Keyword)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].chunk.text.contains("cycling"));

    let stale = service
        .retrieve("parking", 5, RetrievalMode::Keyword)
        .await
        .unwrap();
    assert!(stale.is_empty());
}

#[tokio::test]
async fn test_long_document_is_split_into_overlapping_chunks() {
    let mut harness = TestHarness::new();
    harness.settings.chunking.chunk_size = 200;
    harness.settings.chunking.chunk_overlap = 20;

    let sentence = "Section text describing the travel reimbursement process in detail. ";
    harness.write_text("travel.txt", &sentence.repeat(20));

    let service = harness.open().await;
    let status = service.status().await.unwrap();
    assert!(status.chunks > 1, "expected several chunks, got {}", status.chunks);

    let docs = service.documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].chunks as usize, status.chunks);
}
