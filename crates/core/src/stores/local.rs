use crate::traits::VectorStore;
use crate::{EmbeddingStoreError, ScoredPassage, StoreEntry};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

const ENTRY_DIR: &str = "entries";

/// Vector store persisted as a directory with one JSON file per entry. The
/// file name is the SHA-256 of the chunk id, so re-inserting an id overwrites
/// its previous file.
pub struct LocalVectorStore {
    root: PathBuf,
    entries: RwLock<HashMap<String, StoreEntry>>,
}

impl LocalVectorStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, EmbeddingStoreError> {
        let root = root.into();
        let entry_dir = root.join(ENTRY_DIR);
        tokio::fs::create_dir_all(&entry_dir).await?;

        let mut entries = HashMap::new();
        let mut listing = tokio::fs::read_dir(&entry_dir).await?;
        while let Some(item) = listing.next_entry().await? {
            let path = item.path();
            let is_entry = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "json");
            if !is_entry {
                continue;
            }

            let raw = tokio::fs::read(&path).await?;
            let entry: StoreEntry =
                serde_json::from_slice(&raw).map_err(|error| EmbeddingStoreError::Corrupt {
                    path: path.display().to_string(),
                    details: error.to_string(),
                })?;
            entries.insert(entry.id.clone(), entry);
        }

        debug!(root = %root.display(), entries = entries.len(), "opened local vector store");

        Ok(Self {
            root,
            entries: RwLock::new(entries),
        })
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        self.root
            .join(ENTRY_DIR)
            .join(format!("{:x}.json", hasher.finalize()))
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn existing_ids(&self) -> Result<HashSet<String>, EmbeddingStoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn insert(&self, entries: &[StoreEntry]) -> Result<(), EmbeddingStoreError> {
        let mut guard = self.entries.write().await;

        for entry in entries {
            let path = self.entry_path(&entry.id);
            let staging = path.with_extension("json.tmp");
            tokio::fs::write(&staging, serde_json::to_vec(entry)?).await?;
            tokio::fs::rename(&staging, &path).await?;
            guard.insert(entry.id.clone(), entry.clone());
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, EmbeddingStoreError> {
        let guard = self.entries.read().await;

        let mut scored = Vec::with_capacity(guard.len());
        for entry in guard.values() {
            if entry.embedding.len() != query_vector.len() {
                return Err(EmbeddingStoreError::Request(format!(
                    "query vector dim {} does not match stored dim {} of {}",
                    query_vector.len(),
                    entry.embedding.len(),
                    entry.id
                )));
            }

            scored.push(ScoredPassage {
                id: entry.id.clone(),
                content: entry.content.clone(),
                source: entry.source.clone(),
                page_number: entry.page_number,
                score: cosine_similarity(query_vector, &entry.embedding),
            });
        }

        // Ties break on id so equal scores keep a stable order.
        scored.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.id.cmp(&right.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn reset(&self) -> Result<(), EmbeddingStoreError> {
        let mut guard = self.entries.write().await;
        let entry_dir = self.root.join(ENTRY_DIR);

        if tokio::fs::try_exists(&entry_dir).await? {
            tokio::fs::remove_dir_all(&entry_dir).await?;
        }
        tokio::fs::create_dir_all(&entry_dir).await?;
        guard.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, EmbeddingStoreError> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> StoreEntry {
        StoreEntry {
            id: id.to_string(),
            content: format!("content of {id}"),
            source: "doc.pdf".to_string(),
            page_number: 0,
            embedding,
        }
    }

    #[tokio::test]
    async fn entries_survive_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        {
            let store = LocalVectorStore::open(dir.path()).await?;
            store
                .insert(&[entry("doc.pdf:0:0", vec![1.0, 0.0]), entry("doc.pdf:0:1", vec![0.0, 1.0])])
                .await?;
        }

        let reopened = LocalVectorStore::open(dir.path()).await?;
        let ids = reopened.existing_ids().await?;
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("doc.pdf:0:1"));
        Ok(())
    }

    #[tokio::test]
    async fn reinserting_an_id_replaces_it() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = LocalVectorStore::open(dir.path()).await?;
        store.insert(&[entry("a", vec![1.0, 0.0])]).await?;
        store.insert(&[entry("a", vec![0.0, 1.0])]).await?;

        assert_eq!(store.count().await?, 1);
        let reopened = LocalVectorStore::open(dir.path()).await?;
        assert_eq!(reopened.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = LocalVectorStore::open(dir.path()).await?;
        store
            .insert(&[
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.1]),
                entry("middle", vec![1.0, 1.0]),
            ])
            .await?;

        let hits = store.search(&[1.0, 0.0], 2).await?;
        let ids: Vec<_> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "middle"]);
        assert!(hits[0].score > hits[1].score);
        Ok(())
    }

    #[tokio::test]
    async fn search_on_empty_store_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = LocalVectorStore::open(dir.path()).await?;
        assert!(store.search(&[1.0, 0.0], 3).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn reset_clears_memory_and_disk() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = LocalVectorStore::open(dir.path()).await?;
        store.insert(&[entry("a", vec![1.0])]).await?;
        store.reset().await?;

        assert_eq!(store.count().await?, 0);
        assert_eq!(LocalVectorStore::open(dir.path()).await?.count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_entry_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join(ENTRY_DIR))?;
        std::fs::write(dir.path().join(ENTRY_DIR).join("bad.json"), b"{not json")?;

        let result = LocalVectorStore::open(dir.path()).await;
        assert!(matches!(result, Err(EmbeddingStoreError::Corrupt { .. })));
        Ok(())
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
