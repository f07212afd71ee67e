//! End-to-end pipeline tests against mocked HTTP providers.

use citesmith::{
    GroundingConfig, GroundingOutcome, GroundingPipeline, SourceDocument,
};
use httpmock::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Two-page plain-text document; pages split on the form feed.
const DOCUMENT: &str = "alpha alpha\u{0c}bravo bravo";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_for(server: &MockServer) -> GroundingConfig {
    GroundingConfig::builder()
        .embedding_api_key("test-key")
        .embedding_url(server.url("/embed"))
        .build()
        .expect("valid config")
}

fn mock_document(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/doc.pdf");
        then.status(200)
            .header("content-type", "text/plain")
            .body(DOCUMENT);
    })
}

/// Batch embedding call for the two document chunks.
fn mock_batch_embeddings(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/embed").body_contains("alpha");
        then.status(200).json_body(json!({
            "data": [
                { "embedding": [1.0, 0.0] },
                { "embedding": [0.0, 1.0] },
            ],
        }));
    })
}

/// Single-input embedding call for the query.
fn mock_query_embedding<'a>(server: &'a MockServer, marker: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(POST).path("/embed").body_contains(marker);
        then.status(200).json_body(json!({
            "data": [{ "embedding": [0.0, 1.0] }],
        }));
    })
}

#[tokio::test]
async fn retrieval_cites_the_best_matching_page() {
    init_tracing();
    let server = MockServer::start();
    let doc_mock = mock_document(&server);
    mock_batch_embeddings(&server);
    mock_query_embedding(&server, "tell me about bravo");

    let pipeline = GroundingPipeline::from_config(config_for(&server));
    let docs = vec![SourceDocument::new("doc-1", server.url("/doc.pdf"))];

    let outcome = pipeline.ground("tell me about bravo", &docs).await;

    let GroundingOutcome::Grounded(context) = outcome else {
        panic!("expected grounded outcome, got {outcome:?}");
    };
    assert!(!context.citations.is_empty());
    assert_eq!(context.citations[0].page, 2);
    assert!(context.citations[0]
        .open_url
        .ends_with("/doc.pdf#page=2"));
    doc_mock.assert();
}

#[tokio::test]
async fn repeat_questions_embed_the_document_once() {
    init_tracing();
    let server = MockServer::start();
    mock_document(&server);
    let batch = mock_batch_embeddings(&server);
    let query = mock_query_embedding(&server, "tell me about bravo");

    let pipeline = GroundingPipeline::from_config(config_for(&server));
    let docs = vec![SourceDocument::new("doc-1", server.url("/doc.pdf"))];

    for _ in 0..3 {
        let outcome = pipeline.ground("tell me about bravo", &docs).await;
        assert!(matches!(outcome, GroundingOutcome::Grounded(_)));
    }

    batch.assert_hits(1);
    query.assert_hits(3);
}

#[tokio::test]
async fn fact_questions_never_call_the_embedding_provider() {
    init_tracing();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/buyback.pdf");
        then.status(200)
            .header("content-type", "text/plain")
            .body("Record Date : 15-Mar-2024 for the buyback offer");
    });
    let embeddings = server.mock(|when, then| {
        when.method(POST).path("/embed");
        then.status(200).json_body(json!({ "data": [] }));
    });

    let pipeline = GroundingPipeline::from_config(config_for(&server));
    let docs = vec![SourceDocument::new("doc-1", server.url("/buyback.pdf"))];

    let outcome = pipeline.ground("what is the record date?", &docs).await;

    let GroundingOutcome::Deterministic(answer) = outcome else {
        panic!("expected deterministic outcome, got {outcome:?}");
    };
    assert!(answer.response.contains("15-Mar-2024"));
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].page, 1);
    assert!(answer.citations[0].open_url.ends_with("#page=1"));
    embeddings.assert_hits(0);
}

#[tokio::test]
async fn unreachable_documents_signal_no_content() {
    init_tracing();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing.pdf");
        then.status(404);
    });

    let pipeline = GroundingPipeline::from_config(config_for(&server));
    let docs = vec![SourceDocument::new("doc-1", server.url("/missing.pdf"))];

    let outcome = pipeline.ground("what is the record date?", &docs).await;
    assert!(matches!(outcome, GroundingOutcome::NoContent));
}

#[tokio::test]
async fn failing_remote_index_falls_back_to_local_answers() {
    init_tracing();
    let server = MockServer::start();
    mock_document(&server);
    mock_batch_embeddings(&server);
    mock_query_embedding(&server, "tell me about bravo");

    let upsert = server.mock(|when, then| {
        when.method(POST).path("/vector/upsert");
        then.status(500);
    });
    let query = server.mock(|when, then| {
        when.method(POST).path("/vector/query");
        then.status(500);
    });

    let config = GroundingConfig::builder()
        .embedding_api_key("test-key")
        .embedding_url(server.url("/embed"))
        .vector_index(server.url("/vector"), "index-token")
        .build()
        .expect("valid config");
    let pipeline = GroundingPipeline::from_config(config);
    let docs = vec![SourceDocument::new("doc-1", server.url("/doc.pdf"))];

    let outcome = pipeline.ground("tell me about bravo", &docs).await;

    let GroundingOutcome::Grounded(context) = outcome else {
        panic!("expected grounded outcome, got {outcome:?}");
    };
    assert!(
        !context.citations.is_empty(),
        "in-process store must answer when the remote index is down"
    );
    assert_eq!(context.citations[0].page, 2);
    upsert.assert_hits(1);
    query.assert_hits(1);
}

#[tokio::test]
async fn embedding_outage_still_returns_extraction_evidence() {
    init_tracing();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/doc.pdf");
        then.status(200)
            .header("content-type", "text/plain")
            .body("The offer covers 4,00,000 equity shares at a premium of 2.5%.");
    });
    server.mock(|when, then| {
        when.method(POST).path("/embed");
        then.status(503);
    });

    let pipeline = GroundingPipeline::from_config(config_for(&server));
    let docs = vec![SourceDocument::new("doc-1", server.url("/doc.pdf"))];

    let outcome = pipeline.ground("describe the offer structure", &docs).await;

    let GroundingOutcome::Grounded(context) = outcome else {
        panic!("expected grounded outcome, got {outcome:?}");
    };
    assert!(context.citations.is_empty(), "no retrieval without embeddings");
    assert!(!context.entities.is_empty(), "extraction output is kept");
}
