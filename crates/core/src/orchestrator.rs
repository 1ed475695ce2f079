use crate::config::StudyConfig;
use crate::embeddings::Embedder;
use crate::error::{IngestError, QuizError, RetrievalError};
use crate::extractor::PdfExtractor;
use crate::ingest::{IngestOptions, IngestionReport, Ingestor};
use crate::llm::{AnswerGenerator, ERROR_ANSWER_PREFIX};
use crate::models::{Difficulty, Quiz, ScoredPassage};
use crate::prompt::PromptAssembler;
use crate::quiz::{QuizGenerator, QuizPromptBuilder, QuizRepository, QuizRequest};
use crate::retrieval::Retriever;
use crate::sync::StoreSynchronizer;
use crate::traits::{LanguageModel, VectorStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const NO_CONTEXT_ANSWER: &str = "I don't know";

/// Backends the assistant is wired to.
#[derive(Clone)]
pub struct StudyBackends {
    pub extractor: Arc<dyn PdfExtractor>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub model: Arc<dyn LanguageModel>,
    pub quizzes: Arc<dyn QuizRepository>,
}

/// Entry points for ingestion, question answering and quiz generation.
pub struct StudyAssistant {
    extractor: Arc<dyn PdfExtractor>,
    ingestor: Ingestor<dyn PdfExtractor, dyn Embedder, dyn VectorStore>,
    retriever: Retriever<dyn Embedder, dyn VectorStore>,
    prompts: PromptAssembler,
    answers: AnswerGenerator<dyn LanguageModel>,
    quizzes: QuizGenerator<dyn LanguageModel, dyn QuizRepository>,
}

impl StudyAssistant {
    pub fn new(backends: StudyBackends, config: &StudyConfig) -> Result<Self, IngestError> {
        config.validate()?;

        let synchronizer = StoreSynchronizer::new(
            Arc::clone(&backends.embedder),
            Arc::clone(&backends.store),
            config.embedding.batch_size,
        );

        Ok(Self {
            extractor: Arc::clone(&backends.extractor),
            ingestor: Ingestor::new(backends.extractor, synchronizer, config.chunking),
            retriever: Retriever::new(
                backends.embedder,
                backends.store,
                config.retrieval.top_k,
            ),
            prompts: PromptAssembler::from_config(&config.retrieval),
            answers: AnswerGenerator::new(Arc::clone(&backends.model)),
            quizzes: QuizGenerator::new(
                backends.model,
                backends.quizzes,
                QuizPromptBuilder::from_config(&config.quiz),
            ),
        })
    }

    pub async fn ingest(
        &self,
        source_directory: &Path,
        options: IngestOptions,
    ) -> Result<IngestionReport, IngestError> {
        let report = self.ingestor.ingest(source_directory, options).await?;
        info!(
            folder = %source_directory.display(),
            inserted = report.inserted_count,
            skipped = report.skipped_files.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    /// Ranked passages for a query, without calling the language model.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredPassage>, RetrievalError> {
        let top_k = top_k.unwrap_or_else(|| self.retriever.top_k());
        self.retriever.retrieve_top(query, top_k).await
    }

    /// Never fails: retrieval or model errors come back as an error answer.
    pub async fn answer_question(&self, query: &str) -> String {
        let passages = match self.retriever.retrieve(query).await {
            Ok(passages) => passages,
            Err(error) => {
                warn!(%error, "retrieval failed");
                return format!("{ERROR_ANSWER_PREFIX} {error}");
            }
        };

        match self.prompts.assemble(&passages, query) {
            Some(prompt) => self.answers.generate(&prompt).await,
            None => NO_CONTEXT_ANSWER.to_string(),
        }
    }

    pub async fn generate_quiz(&self, request: QuizRequest) -> Result<Quiz, QuizError> {
        self.quizzes.generate_quiz(request).await
    }

    pub async fn generate_quiz_from_pdf(
        &self,
        path: &Path,
        title: &str,
        description: &str,
        difficulty: Difficulty,
    ) -> Result<Quiz, QuizError> {
        self.quizzes
            .generate_quiz_from_pdf(self.extractor.as_ref(), path, title, description, difficulty)
            .await
    }
}
