use crate::traits::VectorStore;
use crate::{EmbeddingStoreError, ScoredPassage, StoreEntry};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;
use uuid::Uuid;

const SCROLL_PAGE: usize = 256;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

/// Qdrant only accepts integers or UUIDs as point ids; the chunk id is kept
/// in the payload and hashed into a stable UUID.
pub fn point_id(chunk_id: &str) -> Uuid {
    let digest = Sha256::digest(chunk_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

fn backend_error(details: impl Into<String>) -> EmbeddingStoreError {
    EmbeddingStoreError::BackendResponse {
        backend: "qdrant".to_string(),
        details: details.into(),
    }
}

impl QdrantStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, EmbeddingStoreError> {
        let endpoint = Url::parse(endpoint)?;
        Ok(Self {
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Creates the collection with cosine distance unless it already exists.
    pub async fn ensure_collection(&self) -> Result<(), EmbeddingStoreError> {
        let response = self.client.get(self.collection_url()).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status().to_string()));
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn existing_ids(&self) -> Result<HashSet<String>, EmbeddingStoreError> {
        let mut ids = HashSet::new();
        let mut offset = Value::Null;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": ["chunk_id"],
                "with_vector": false,
            });
            if !offset.is_null() {
                body["offset"] = offset.clone();
            }

            let response = self
                .client
                .post(format!("{}/points/scroll", self.collection_url()))
                .json(&body)
                .send()
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                return Ok(ids);
            }
            if !response.status().is_success() {
                return Err(backend_error(response.status().to_string()));
            }

            let parsed: Value = response.json().await?;
            let points = parsed
                .pointer("/result/points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            ids.extend(points.iter().filter_map(|point| {
                point
                    .pointer("/payload/chunk_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }));

            offset = parsed
                .pointer("/result/next_page_offset")
                .cloned()
                .unwrap_or(Value::Null);
            if offset.is_null() {
                return Ok(ids);
            }
        }
    }

    async fn insert(&self, entries: &[StoreEntry]) -> Result<(), EmbeddingStoreError> {
        let points = entries
            .iter()
            .map(|entry| {
                if entry.embedding.len() != self.vector_size {
                    return Err(EmbeddingStoreError::Request(format!(
                        "embedding dimension {} != {}",
                        entry.embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(&entry.id).to_string(),
                    "vector": entry.embedding,
                    "payload": {
                        "chunk_id": entry.id,
                        "content": entry.content,
                        "source": entry.source,
                        "page_number": entry.page_number,
                    },
                }))
            })
            .collect::<Result<Vec<_>, EmbeddingStoreError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, EmbeddingStoreError> {
        if query_vector.len() != self.vector_size {
            return Err(EmbeddingStoreError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        Ok(hits_to_passages(&parsed))
    }

    async fn reset(&self) -> Result<(), EmbeddingStoreError> {
        let response = self.client.delete(self.collection_url()).send().await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status().to_string()));
        }
        self.ensure_collection().await
    }

    async fn count(&self) -> Result<usize, EmbeddingStoreError> {
        let response = self
            .client
            .post(format!("{}/points/count", self.collection_url()))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| backend_error("count response without result.count"))
    }
}

fn hits_to_passages(parsed: &Value) -> Vec<ScoredPassage> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .map(|hit| {
            let text = |pointer: &str| {
                hit.pointer(pointer)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            ScoredPassage {
                id: text("/payload/chunk_id"),
                content: text("/payload/content"),
                source: text("/payload/source"),
                page_number: hit
                    .pointer("/payload/page_number")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            }
        })
        .collect()
}
