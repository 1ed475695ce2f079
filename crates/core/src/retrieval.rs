use crate::embeddings::Embedder;
use crate::error::RetrievalError;
use crate::models::ScoredPassage;
use crate::traits::VectorStore;
use std::sync::Arc;
use tracing::debug;

/// Embeds the query and asks the store for its nearest passages.
pub struct Retriever<E: ?Sized, S: ?Sized> {
    embedder: Arc<E>,
    store: Arc<S>,
    top_k: usize,
}

impl<E, S> Retriever<E, S>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    pub fn new(embedder: Arc<E>, store: Arc<S>, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredPassage>, RetrievalError> {
        self.retrieve_top(query, self.top_k).await
    }

    pub async fn retrieve_top(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, RetrievalError> {
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let passages = self.store.search(&query_vector, top_k).await?;
        debug!(hits = passages.len(), top_k, "retrieved passages");
        Ok(passages)
    }
}
