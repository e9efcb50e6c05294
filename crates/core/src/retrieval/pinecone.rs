//! Pinecone-backed [`VectorStore`].
//!
//! Queries are embedded with an [`Embedder`] and sent to the index's data
//! plane. The index is populated elsewhere; this module never writes to it.

use super::{RetrievedPassage, VectorStore};
use anyhow::{Context, Result, bail};
use async_openai::{Client, config::OpenAIConfig, types::CreateEmbeddingRequestArgs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

pub const PINECONE_CONTROL_URL: &str = "https://api.pinecone.io";
const PINECONE_API_VERSION: &str = "2024-07";

/// Turns query text into an embedding vector.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// An [`Embedder`] backed by the OpenAI embeddings API.
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIEmbedder {
    /// # Arguments
    ///
    /// * `config` - OpenAI API configuration (API key, base URL, etc.).
    /// * `model` - Embedding model identifier (e.g., "text-embedding-3-small").
    ///   Must match the model the index was built with.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()?;
        let response = self.client.embeddings().create(request).await?;
        let embedding = response
            .data
            .into_iter()
            .next()
            .context("No embedding returned for query")?
            .embedding;
        Ok(embedding)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: Option<f32>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
}

/// Similarity search against a Pinecone index.
pub struct PineconeStore {
    http: reqwest::Client,
    api_key: String,
    host: String,
    embedder: Arc<dyn Embedder>,
}

impl PineconeStore {
    /// Creates a store for an index whose data-plane host is already known.
    ///
    /// A host without a scheme (as returned by the control plane) is assumed
    /// to be HTTPS.
    pub fn new(host: &str, api_key: String, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            host: normalize_host(host),
            embedder,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Looks up the data-plane host of `index_name` on the control plane.
    pub async fn describe_index_host(
        control_url: &str,
        api_key: &str,
        index_name: &str,
    ) -> Result<String> {
        let url = format!("{}/indexes/{}", control_url.trim_end_matches('/'), index_name);
        let response = reqwest::Client::new()
            .get(&url)
            .header("Api-Key", api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .send()
            .await
            .with_context(|| format!("Failed to describe index '{}'", index_name))?;
        if !response.status().is_success() {
            bail!(
                "Describing index '{}' failed with status {}",
                index_name,
                response.status()
            );
        }
        let description: IndexDescription = response.json().await?;
        Ok(normalize_host(&description.host))
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed retrieval query")?;

        let body = QueryRequest {
            vector: &vector,
            top_k: k,
            include_metadata: true,
        };
        let response = self
            .http
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Pinecone query request failed")?;
        if !response.status().is_success() {
            bail!("Pinecone query failed with status {}", response.status());
        }
        let parsed: QueryResponse = response.json().await?;
        debug!(matches = parsed.matches.len(), "Pinecone query complete");

        Ok(parsed
            .matches
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                let content = metadata_str(&m.metadata, "text").unwrap_or_default();
                let source = metadata_str(&m.metadata, "source").unwrap_or(m.id);
                RetrievedPassage {
                    content,
                    source,
                    rank: i + 1,
                    score: m.score,
                }
            })
            .collect())
    }
}

fn metadata_str(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata.get(key)?.as_str().map(str::to_string)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
