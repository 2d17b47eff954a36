//! Retrieval E2E tests across vector, keyword and hybrid modes.

use pretty_assertions::assert_eq;

use docqa_service::QueryRequest;
use docqa_types::{IndexKind, RetrievalMode};
use e2e_tests::TestHarness;

fn corpus(harness: &TestHarness) {
    harness.write_text(
        "security.txt",
        "Visitors must sign in at reception and wear a badge at all times.",
    );
    harness.write_text(
        "expenses.txt",
        "Expense claims are reimbursed at the end of each month after approval.",
    );
    harness.write_text(
        "it.md",
        "# Laptops\n\nLost laptops must be reported to the IT helpdesk immediately.",
    );
}

#[tokio::test]
async fn test_vector_mode_ranks_closest_chunk_first() {
    let harness = TestHarness::new();
    corpus(&harness);
    let service = harness.open().await;

    let hits = service
        .retrieve(
            "Expense claims are reimbursed at the end of each month after approval.",
            3,
            RetrievalMode::Vector,
        )
        .await
        .unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk.file_name, "expenses.txt");
    // Flat L2 scores are distances, best first means ascending
    assert!(hits[0].score <= hits[1].score);
    assert!(hits[1].score <= hits[2].score);
}

#[tokio::test]
async fn test_keyword_mode_matches_terms() {
    let harness = TestHarness::new();
    corpus(&harness);
    let service = harness.open().await;

    let hits = service
        .retrieve("helpdesk", 3, RetrievalMode::Keyword)
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.file_name, "it.md");
}

#[tokio::test]
async fn test_hybrid_mode_fuses_both_lists() {
    let harness = TestHarness::new();
    corpus(&harness);
    let service = harness.open().await;

    let hits = service
        .retrieve("badge reception visitors", 2, RetrievalMode::Hybrid)
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.file_name, "security.txt");
    // Fused scores are RRF scores, higher is better
    assert!(hits[0].score >= hits[1].score);
    assert!(hits.iter().all(|h| h.score > 0.0));
}

#[tokio::test]
async fn test_top_k_caps_references() {
    let harness = TestHarness::new();
    corpus(&harness);
    let service = harness.open().await;

    for top_k in [1usize, 2, 3] {
        let mut request = QueryRequest::new("What are the office rules?");
        request.top_k = Some(top_k);
        let answer = service.answer(request).await.unwrap();
        assert_eq!(answer.references.len(), top_k);
    }

    // Asking for more than exists returns everything
    let mut request = QueryRequest::new("What are the office rules?");
    request.top_k = Some(50);
    let answer = service.answer(request).await.unwrap();
    assert_eq!(answer.references.len(), 3);
}

#[tokio::test]
async fn test_hnsw_index_answers_like_flat() {
    let mut harness = TestHarness::new();
    harness.settings.index.kind = IndexKind::Hnsw;
    corpus(&harness);
    let service = harness.open().await;

    let status = service.status().await.unwrap();
    assert_eq!(status.index_kind, IndexKind::Hnsw);
    assert_eq!(status.vectors, 3);

    let hits = service
        .retrieve(
            "Lost laptops must be reported to the IT helpdesk immediately.",
            1,
            RetrievalMode::Vector,
        )
        .await
        .unwrap();
    assert_eq!(hits[0].chunk.file_name, "it.md");
}

#[tokio::test]
async fn test_empty_index_answers_without_references() {
    let harness = TestHarness::new();
    let service = harness.open().await;

    let answer = service
        .answer(QueryRequest::new("Is anything indexed?"))
        .await
        .unwrap();
    assert!(answer.references.is_empty());
    assert!(!answer.answer.is_empty());
}
