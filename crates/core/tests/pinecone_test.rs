use anyhow::Result;
use async_trait::async_trait;
use avatar_core::retrieval::{
    RetrievalClient, VectorStore,
    pinecone::{Embedder, PineconeStore},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticEmbedder;

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.5, 0.25, 0.125])
    }
}

#[tokio::test]
async fn test_pinecone_query_maps_matches_to_passages() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("Api-Key", "test-key"))
        .and(body_partial_json(json!({
            "vector": [0.5, 0.25, 0.125],
            "topK": 1,
            "includeMetadata": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [{
                "id": "doc-7#3",
                "score": 0.87,
                "metadata": { "text": "The museum opens at 9am.", "source": "visitor-guide.pdf" }
            }],
            "namespace": ""
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = PineconeStore::new(&mock_server.uri(), "test-key".into(), Arc::new(StaticEmbedder));
    let passages = store.similarity_search("When do you open?", 1).await.unwrap();

    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].content, "The museum opens at 9am.");
    assert_eq!(passages[0].source, "visitor-guide.pdf");
    assert_eq!(passages[0].rank, 1);
}

#[tokio::test]
async fn test_pinecone_source_falls_back_to_vector_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [{ "id": "doc-1", "metadata": { "text": "Hello" } }]
        })))
        .mount(&mock_server)
        .await;

    let store = PineconeStore::new(&mock_server.uri(), "test-key".into(), Arc::new(StaticEmbedder));
    let passages = store.similarity_search("hi", 1).await.unwrap();
    assert_eq!(passages[0].source, "doc-1");
    assert_eq!(passages[0].score, None);
}

#[tokio::test]
async fn test_pinecone_error_status_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let store = PineconeStore::new(&mock_server.uri(), "test-key".into(), Arc::new(StaticEmbedder));
    assert!(store.similarity_search("hi", 1).await.is_err());
}

#[tokio::test]
async fn test_retrieval_client_degrades_on_backend_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let store = PineconeStore::new(&mock_server.uri(), "test-key".into(), Arc::new(StaticEmbedder));
    let client = RetrievalClient::new(Arc::new(store), Duration::from_secs(5));
    assert_eq!(client.query("hi").await, None);
}

#[tokio::test]
async fn test_describe_index_host() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/avatar-docs"))
        .and(header("Api-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "avatar-docs",
            "dimension": 1536,
            "host": "avatar-docs-abc123.svc.aped-4627-b74a.pinecone.io"
        })))
        .mount(&mock_server)
        .await;

    let host = PineconeStore::describe_index_host(&mock_server.uri(), "test-key", "avatar-docs")
        .await
        .unwrap();
    assert_eq!(host, "https://avatar-docs-abc123.svc.aped-4627-b74a.pinecone.io");
}

#[tokio::test]
async fn test_describe_missing_index_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let result =
        PineconeStore::describe_index_host(&mock_server.uri(), "test-key", "missing").await;
    assert!(result.is_err());
}
