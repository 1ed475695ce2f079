pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod orchestrator;
pub mod prompt;
pub mod quiz;
pub mod retrieval;
pub mod stores;
pub mod sync;
pub mod traits;

pub use chunking::{split_documents, split_text};
pub use config::{
    ChunkingConfig, DifficultyProfile, DifficultyTable, EmbeddingConfig, LanguageModelConfig,
    OcrConfig, QuizConfig, RetrievalConfig, StoreConfig, StudyConfig,
};
pub use embeddings::{CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    EmbeddingStoreError, ExtractionError, IngestError, ModelInvocationError, ParseError,
    QuizError, RepositoryError, RetrievalError,
};
pub use extractor::{LopdfExtractor, PdfExtractor};
pub use identity::{assign_chunk_ids, chunk_id};
pub use ingest::{
    discover_pdf_files, IngestOptions, IngestionReport, Ingestor, SkippedPdf,
};
pub use llm::{AnswerGenerator, OpenAiChatModel, ERROR_ANSWER_PREFIX};
pub use models::{
    Answer, Chunk, Difficulty, Document, Page, Question, Quiz, ScoredPassage, StoreEntry,
    TextSegment,
};
pub use ocr::{HttpOcr, OcrEngine, TesseractOcr};
pub use orchestrator::{StudyAssistant, StudyBackends, NO_CONTEXT_ANSWER};
pub use prompt::PromptAssembler;
pub use quiz::{JsonQuizRepository, QuizGenerator, QuizPromptBuilder, QuizRepository, QuizRequest};
pub use retrieval::Retriever;
pub use stores::{LocalVectorStore, QdrantStore};
pub use sync::{StoreSynchronizer, SyncReport};
pub use traits::{LanguageModel, VectorStore};
