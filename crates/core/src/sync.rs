use crate::embeddings::Embedder;
use crate::error::{IngestError, ModelInvocationError};
use crate::models::{Chunk, StoreEntry};
use crate::traits::VectorStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub existing: usize,
    pub inserted: usize,
}

/// Inserts only the chunks whose id is not yet in the store.
///
/// Clones share one writer lock, so the read-existing-then-insert section
/// never interleaves between two runs in the same process.
pub struct StoreSynchronizer<E: ?Sized, S: ?Sized> {
    embedder: Arc<E>,
    store: Arc<S>,
    batch_size: usize,
    writer: Arc<Mutex<()>>,
}

impl<E: ?Sized, S: ?Sized> Clone for StoreSynchronizer<E, S> {
    fn clone(&self) -> Self {
        Self {
            embedder: Arc::clone(&self.embedder),
            store: Arc::clone(&self.store),
            batch_size: self.batch_size,
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<E, S> StoreSynchronizer<E, S>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    pub fn new(embedder: Arc<E>, store: Arc<S>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub async fn sync(&self, chunks: &[Chunk]) -> Result<SyncReport, IngestError> {
        let _writer = self.writer.lock().await;

        let existing_ids = self.store.existing_ids().await?;
        info!(existing = existing_ids.len(), "existing entries in store");

        let fresh: Vec<&Chunk> = chunks
            .iter()
            .filter(|chunk| !existing_ids.contains(&chunk.id))
            .collect();

        let mut report = SyncReport {
            existing: existing_ids.len(),
            inserted: 0,
        };

        if fresh.is_empty() {
            info!("no new chunks to add");
            return Ok(report);
        }

        info!(new_chunks = fresh.len(), "adding new chunks");
        for batch in fresh.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(ModelInvocationError::EmbeddingCount {
                    expected: batch.len(),
                    received: vectors.len(),
                }
                .into());
            }

            let entries: Vec<StoreEntry> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| StoreEntry::from_chunk(chunk, vector))
                .collect();

            self.store.insert(&entries).await?;
            report.inserted += entries.len();
        }

        Ok(report)
    }

    pub async fn reset(&self) -> Result<(), IngestError> {
        let _writer = self.writer.lock().await;
        info!("clearing vector store");
        self.store.reset().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::identity::chunk_id;
    use crate::stores::LocalVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        inner: CharacterNgramEmbedder,
        embedded: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn dimensions(&self) -> usize {
            self.inner.dimensions
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelInvocationError> {
            self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    fn chunk(source: &str, page: u32, index: u32) -> Chunk {
        Chunk {
            id: chunk_id(source, page, index),
            source: source.to_string(),
            page_number: page,
            chunk_index: index,
            content: format!("{source} page {page} part {index}"),
        }
    }

    #[tokio::test]
    async fn only_unseen_ids_are_embedded() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(LocalVectorStore::open(dir.path()).await?);
        let embedder = Arc::new(CountingEmbedder {
            inner: CharacterNgramEmbedder::default(),
            embedded: AtomicUsize::new(0),
        });
        let synchronizer = StoreSynchronizer::new(embedder.clone(), store.clone(), 2);

        let first = synchronizer
            .sync(&[chunk("a", 0, 0), chunk("a", 0, 1), chunk("a", 1, 0)])
            .await?;
        assert_eq!(first, SyncReport { existing: 0, inserted: 3 });

        let second = synchronizer
            .sync(&[chunk("a", 0, 0), chunk("a", 0, 1), chunk("a", 1, 0), chunk("b", 0, 0)])
            .await?;
        assert_eq!(second, SyncReport { existing: 3, inserted: 1 });
        assert_eq!(embedder.embedded.load(Ordering::SeqCst), 4);
        assert_eq!(store.count().await?, 4);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_clones_insert_each_id_once() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(LocalVectorStore::open(dir.path()).await?);
        let embedder = Arc::new(CountingEmbedder {
            inner: CharacterNgramEmbedder::default(),
            embedded: AtomicUsize::new(0),
        });
        let synchronizer = StoreSynchronizer::new(embedder.clone(), store.clone(), 1);
        let chunks: Vec<Chunk> = (0..6).map(|index| chunk("shared", 0, index)).collect();

        let runs = (0..2).map(|_| {
            let synchronizer = synchronizer.clone();
            let chunks = chunks.clone();
            tokio::spawn(async move { synchronizer.sync(&chunks).await })
        });
        let mut inserted = 0;
        for run in runs.collect::<Vec<_>>() {
            inserted += run.await??.inserted;
        }

        assert_eq!(inserted, 6);
        assert_eq!(embedder.embedded.load(Ordering::SeqCst), 6);
        assert_eq!(store.count().await?, 6);
        Ok(())
    }

    #[tokio::test]
    async fn reset_empties_the_store() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(LocalVectorStore::open(dir.path()).await?);
        let synchronizer =
            StoreSynchronizer::new(Arc::new(CharacterNgramEmbedder::default()), store.clone(), 8);

        synchronizer.sync(&[chunk("a", 0, 0)]).await?;
        synchronizer.reset().await?;
        assert_eq!(store.count().await?, 0);
        Ok(())
    }
}
