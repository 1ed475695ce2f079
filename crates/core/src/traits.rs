use crate::{EmbeddingStoreError, ModelInvocationError, ScoredPassage, StoreEntry};
use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn existing_ids(&self) -> Result<HashSet<String>, EmbeddingStoreError>;

    /// Inserts or replaces entries keyed by their chunk id.
    async fn insert(&self, entries: &[StoreEntry]) -> Result<(), EmbeddingStoreError>;

    /// Most similar entries first.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, EmbeddingStoreError>;

    /// Drops every entry.
    async fn reset(&self) -> Result<(), EmbeddingStoreError>;

    async fn count(&self) -> Result<usize, EmbeddingStoreError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError>;
}
