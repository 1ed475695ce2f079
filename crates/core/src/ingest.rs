use crate::chunking::split_documents;
use crate::config::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::extractor::PdfExtractor;
use crate::identity::assign_chunk_ids;
use crate::models::Document;
use crate::sync::StoreSynchronizer;
use crate::traits::VectorStore;
use crate::IngestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    // Chunk ids depend on processing order.
    files.sort_unstable();
    files
}

/// Source label stored in chunk ids: the path relative to the ingested folder.
pub fn source_label(folder: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(folder).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub documents: usize,
    pub chunks: usize,
    pub existing: usize,
    pub inserted_count: usize,
    pub skipped_files: Vec<SkippedPdf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    pub reset: bool,
    /// Report unreadable PDFs instead of aborting the run.
    pub skip_unreadable: bool,
}

pub async fn load_documents<X>(
    folder: &Path,
    extractor: &X,
    skip_unreadable: bool,
) -> Result<(Vec<Document>, Vec<SkippedPdf>), IngestError>
where
    X: PdfExtractor + ?Sized,
{
    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in discover_pdf_files(folder) {
        match extractor.extract_pages(&path).await {
            Ok(pages) => documents.push(Document {
                source: source_label(folder, &path),
                pages,
            }),
            Err(error) if skip_unreadable => {
                warn!(path = %path.display(), %error, "skipped pdf");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
            Err(error) => {
                return Err(IngestError::Extraction {
                    path: path.display().to_string(),
                    source: error,
                })
            }
        }
    }

    info!(folder = %folder.display(), documents = documents.len(), "loaded documents");
    Ok((documents, skipped_files))
}

/// Extract, split, identify and sync a folder of PDFs.
pub struct Ingestor<X: ?Sized, E: ?Sized, S: ?Sized> {
    extractor: Arc<X>,
    synchronizer: StoreSynchronizer<E, S>,
    chunking: ChunkingConfig,
}

impl<X, E, S> Ingestor<X, E, S>
where
    X: PdfExtractor + ?Sized,
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    pub fn new(
        extractor: Arc<X>,
        synchronizer: StoreSynchronizer<E, S>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            extractor,
            synchronizer,
            chunking,
        }
    }

    pub async fn ingest(
        &self,
        source_directory: &Path,
        options: IngestOptions,
    ) -> Result<IngestionReport, IngestError> {
        self.chunking.validate()?;

        if !source_directory.is_dir() {
            return Err(IngestError::InvalidArgument(format!(
                "{} is not a directory",
                source_directory.display()
            )));
        }

        if options.reset {
            self.synchronizer.reset().await?;
        }

        let (documents, skipped_files) =
            load_documents(source_directory, self.extractor.as_ref(), options.skip_unreadable)
                .await?;
        if documents.is_empty() {
            warn!(folder = %source_directory.display(), "no pdf documents to ingest");
        }

        let chunks = assign_chunk_ids(split_documents(&documents, self.chunking));
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "split documents into chunks"
        );

        let sync = self.synchronizer.sync(&chunks).await?;

        Ok(IngestionReport {
            documents: documents.len(),
            chunks: chunks.len(),
            existing: sync.existing,
            inserted_count: sync.inserted,
            skipped_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::ExtractionError;
    use crate::models::Page;
    use crate::stores::LocalVectorStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    /// Reads `.pdf` files as plain text, one page per form feed.
    struct PlainTextExtractor;

    #[async_trait]
    impl PdfExtractor for PlainTextExtractor {
        async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, ExtractionError> {
            let raw = fs::read_to_string(path)?;
            if raw.starts_with("%broken") {
                return Err(ExtractionError::NoText(path.display().to_string()));
            }
            Ok(raw
                .split('\u{000c}')
                .enumerate()
                .map(|(index, text)| Page {
                    number: index as u32,
                    text: text.to_string(),
                })
                .collect())
        }
    }

    type TestIngestor = Ingestor<PlainTextExtractor, CharacterNgramEmbedder, LocalVectorStore>;

    async fn ingestor(store_dir: &Path) -> Result<(TestIngestor, Arc<LocalVectorStore>), IngestError> {
        let store = Arc::new(LocalVectorStore::open(store_dir).await?);
        let synchronizer = StoreSynchronizer::new(
            Arc::new(CharacterNgramEmbedder::default()),
            store.clone(),
            16,
        );
        let chunking = ChunkingConfig {
            chunk_size: 40,
            chunk_overlap: 10,
        };
        Ok((
            Ingestor::new(Arc::new(PlainTextExtractor), synchronizer, chunking),
            store,
        ))
    }

    fn write_sources(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::write(
            dir.join("biology.pdf"),
            "Cells are the basic unit of life and every organism is made of cells.\u{000c}Mitochondria produce energy.",
        )?;
        fs::create_dir(dir.join("physics"))?;
        fs::write(
            dir.join("physics").join("motion.pdf"),
            "Force equals mass times acceleration.",
        )?;
        Ok(())
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn source_label_is_relative_to_folder() {
        let label = source_label(Path::new("/data"), Path::new("/data/physics/motion.pdf"));
        assert_eq!(label, "physics/motion.pdf");
    }

    #[tokio::test]
    async fn second_ingest_inserts_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let sources = tempdir()?;
        let store_dir = tempdir()?;
        write_sources(sources.path())?;
        let (ingestor, store) = ingestor(store_dir.path()).await?;

        let first = ingestor.ingest(sources.path(), IngestOptions::default()).await?;
        assert_eq!(first.documents, 2);
        assert!(first.inserted_count > 0);
        assert_eq!(first.inserted_count, first.chunks);

        let second = ingestor.ingest(sources.path(), IngestOptions::default()).await?;
        assert_eq!(second.inserted_count, 0);
        assert_eq!(second.existing, first.chunks);
        assert_eq!(store.count().await?, first.chunks);
        Ok(())
    }

    #[tokio::test]
    async fn chunk_ids_carry_relative_source_and_page() -> Result<(), Box<dyn std::error::Error>> {
        let sources = tempdir()?;
        let store_dir = tempdir()?;
        write_sources(sources.path())?;
        let (ingestor, store) = ingestor(store_dir.path()).await?;

        ingestor.ingest(sources.path(), IngestOptions::default()).await?;
        let ids = store.existing_ids().await?;

        assert!(ids.contains("biology.pdf:0:0"));
        assert!(ids.contains("biology.pdf:0:1"));
        assert!(ids.contains("biology.pdf:1:0"));
        assert!(ids.contains("physics/motion.pdf:0:0"));
        Ok(())
    }

    #[tokio::test]
    async fn reset_then_ingest_matches_single_reset_ingest() -> Result<(), Box<dyn std::error::Error>> {
        let sources = tempdir()?;
        write_sources(sources.path())?;

        let twice_dir = tempdir()?;
        let (twice, twice_store) = ingestor(twice_dir.path()).await?;
        twice
            .ingest(sources.path(), IngestOptions { reset: true, skip_unreadable: false })
            .await?;
        twice.ingest(sources.path(), IngestOptions::default()).await?;

        let once_dir = tempdir()?;
        let (once, once_store) = ingestor(once_dir.path()).await?;
        once.ingest(sources.path(), IngestOptions { reset: true, skip_unreadable: false })
            .await?;

        let twice_ids: HashSet<String> = twice_store.existing_ids().await?;
        let once_ids: HashSet<String> = once_store.existing_ids().await?;
        assert_eq!(twice_ids, once_ids);
        Ok(())
    }

    #[tokio::test]
    async fn reset_drops_entries_of_deleted_sources() -> Result<(), Box<dyn std::error::Error>> {
        let sources = tempdir()?;
        let store_dir = tempdir()?;
        write_sources(sources.path())?;
        let (ingestor, store) = ingestor(store_dir.path()).await?;

        ingestor.ingest(sources.path(), IngestOptions::default()).await?;
        fs::remove_file(sources.path().join("biology.pdf"))?;
        ingestor
            .ingest(sources.path(), IngestOptions { reset: true, skip_unreadable: false })
            .await?;

        let ids = store.existing_ids().await?;
        assert!(ids.iter().all(|id| id.starts_with("physics/")));
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_pdf_aborts_by_default() -> Result<(), Box<dyn std::error::Error>> {
        let sources = tempdir()?;
        let store_dir = tempdir()?;
        write_sources(sources.path())?;
        fs::write(sources.path().join("broken.pdf"), "%broken")?;
        let (ingestor, store) = ingestor(store_dir.path()).await?;

        let result = ingestor.ingest(sources.path(), IngestOptions::default()).await;
        assert!(matches!(result, Err(IngestError::Extraction { .. })));
        assert_eq!(store.count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn best_effort_skips_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let sources = tempdir()?;
        let store_dir = tempdir()?;
        write_sources(sources.path())?;
        fs::write(sources.path().join("broken.pdf"), "%broken")?;
        let (ingestor, _store) = ingestor(store_dir.path()).await?;

        let report = ingestor
            .ingest(sources.path(), IngestOptions { reset: false, skip_unreadable: true })
            .await?;

        assert_eq!(report.documents, 2);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("broken.pdf")
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_directory_is_rejected_before_reset() -> Result<(), Box<dyn std::error::Error>> {
        let sources = tempdir()?;
        let store_dir = tempdir()?;
        write_sources(sources.path())?;
        let (ingestor, store) = ingestor(store_dir.path()).await?;
        ingestor.ingest(sources.path(), IngestOptions::default()).await?;
        let before = store.count().await?;

        let result = ingestor
            .ingest(
                &sources.path().join("missing"),
                IngestOptions { reset: true, skip_unreadable: false },
            )
            .await;

        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
        assert_eq!(store.count().await?, before);
        Ok(())
    }
}
