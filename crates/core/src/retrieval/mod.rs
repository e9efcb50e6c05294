//! Retrieval Client
//!
//! A read-only query facade over an external vector store. Retrieval is an
//! enhancement to a turn, never a precondition for it: every failure mode
//! degrades to "no context".

pub mod pinecone;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPassage {
    pub content: String,
    pub source: String,
    /// 1-based position in the result list.
    pub rank: usize,
    pub score: Option<f32>,
}

/// The backend interface: a similarity search over an externally maintained
/// index.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns up to `k` passages, best match first.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>>;
}

/// Queries a [`VectorStore`] for the single best passage.
#[derive(Clone)]
pub struct RetrievalClient {
    store: Arc<dyn VectorStore>,
    timeout: Duration,
}

impl RetrievalClient {
    pub fn new(store: Arc<dyn VectorStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Returns the top match for `text`, or `None` when the index has nothing
    /// useful, the backend fails, or the call exceeds the timeout.
    pub async fn query(&self, text: &str) -> Option<RetrievedPassage> {
        let search = self.store.similarity_search(text, 1);
        let passages = match tokio::time::timeout(self.timeout, search).await {
            Ok(Ok(passages)) => passages,
            Ok(Err(e)) => {
                warn!(error = ?e, "Retrieval failed; continuing without context");
                return None;
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Retrieval timed out; continuing without context");
                return None;
            }
        };

        let passage = passages
            .into_iter()
            .find(|p| !p.content.trim().is_empty());
        match &passage {
            Some(p) => info!(source = %p.source, score = ?p.score, "Retrieved context passage"),
            None => debug!("Retrieval returned no usable passage"),
        }
        passage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn passage(content: &str) -> RetrievedPassage {
        RetrievedPassage {
            content: content.to_string(),
            source: "handbook.pdf".to_string(),
            rank: 1,
            score: Some(0.91),
        }
    }

    #[tokio::test]
    async fn test_query_returns_top_match_with_k_one() {
        let mut store = MockVectorStore::new();
        store
            .expect_similarity_search()
            .withf(|query, k| query.to_string() == "opening hours?" && *k == 1)
            .times(1)
            .returning(|_, _| Ok(vec![passage("We open at nine.")]));

        let client = RetrievalClient::new(Arc::new(store), Duration::from_secs(1));
        let found = client.query("opening hours?").await;
        assert_eq!(found, Some(passage("We open at nine.")));
    }

    #[tokio::test]
    async fn test_backend_error_degrades_to_none() {
        let mut store = MockVectorStore::new();
        store
            .expect_similarity_search()
            .returning(|_, _| Err(anyhow!("index unavailable")));

        let client = RetrievalClient::new(Arc::new(store), Duration::from_secs(1));
        assert_eq!(client.query("anything").await, None);
    }

    #[tokio::test]
    async fn test_empty_and_blank_results_degrade_to_none() {
        let mut store = MockVectorStore::new();
        store
            .expect_similarity_search()
            .times(2)
            .returning({
                let mut calls = 0;
                move |_, _| {
                    calls += 1;
                    if calls == 1 {
                        Ok(vec![])
                    } else {
                        Ok(vec![passage("   ")])
                    }
                }
            });

        let client = RetrievalClient::new(Arc::new(store), Duration::from_secs(1));
        assert_eq!(client.query("first").await, None);
        assert_eq!(client.query("second").await, None);
    }

    struct StalledStore;

    #[async_trait]
    impl VectorStore for StalledStore {
        async fn similarity_search(
            &self,
            _query: &str,
            _k: usize,
        ) -> Result<Vec<RetrievedPassage>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_is_bounded_by_timeout() {
        let client = RetrievalClient::new(Arc::new(StalledStore), Duration::from_secs(5));
        assert_eq!(client.query("hello").await, None);
    }
}
