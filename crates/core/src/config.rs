use crate::error::IngestError;
use crate::models::Difficulty;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Answer the question based only on the following context:\n\n{context}\n\n---\n\nAnswer the question based on the above context: {question}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub language_model: LanguageModelConfig,
    pub quiz: QuizConfig,
    pub ocr: OcrConfig,
}

impl StudyConfig {
    /// Reads a JSON config file; missing sections fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, IngestError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: StudyConfig = serde_json::from_str(&raw).map_err(|error| {
            IngestError::InvalidArgument(format!("config {}: {error}", path.display()))
        })?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Fills secrets from the environment. Keys are never read from files.
    pub fn apply_env(&mut self) {
        let api_key = non_empty_env("OPENAI_API_KEY");
        if self.language_model.api_key.is_none() {
            self.language_model.api_key = api_key.clone();
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = api_key;
        }
        if self.ocr.endpoint.is_none() {
            self.ocr.endpoint = non_empty_env("LLM_OCR_ENDPOINT");
        }
        if self.ocr.api_key.is_none() {
            self.ocr.api_key = non_empty_env("LLM_OCR_API_KEY");
        }
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        self.chunking.validate()?;

        if self.retrieval.top_k == 0 {
            return Err(IngestError::InvalidArgument(
                "retrieval.top_k must be positive".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(IngestError::InvalidArgument(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(IngestError::InvalidArgument(
                "embedding.batch_size must be positive".to_string(),
            ));
        }
        if !self.retrieval.prompt_template.contains("{context}")
            || !self.retrieval.prompt_template.contains("{question}")
        {
            return Err(IngestError::InvalidArgument(
                "retrieval.prompt_template needs {context} and {question} placeholders"
                    .to_string(),
            ));
        }

        for difficulty in Difficulty::ALL {
            let profile = self.quiz.difficulties.profile(difficulty);
            if !(2..=26).contains(&profile.answer_count) {
                return Err(IngestError::InvalidArgument(format!(
                    "{difficulty}: answer_count must be between 2 and 26, got {}",
                    profile.answer_count
                )));
            }
            if profile.question_count == 0 {
                return Err(IngestError::InvalidArgument(format!(
                    "{difficulty}: question_count must be positive"
                )));
            }
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the local vector store.
    pub path: PathBuf,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    /// Directory holding generated quizzes.
    pub quiz_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vector_store"),
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_collection: "study_chunks".to_string(),
            quiz_path: PathBuf::from("quizzes"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidArgument(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidArgument(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub prompt_template: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_context_chars: 6_000,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1_536,
            batch_size: 64,
            timeout: Duration::from_secs(60),
            api_key: None,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageModelConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LanguageModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(120),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub answer_count: usize,
    pub question_count: usize,
    pub style_hints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyTable {
    pub easy: DifficultyProfile,
    pub medium: DifficultyProfile,
    pub hard: DifficultyProfile,
}

impl DifficultyTable {
    pub fn profile(&self, difficulty: Difficulty) -> &DifficultyProfile {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }
}

fn hints(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self {
            easy: DifficultyProfile {
                answer_count: 3,
                question_count: 5,
                style_hints: hints(&["basic comprehension", "definition", "simple fact"]),
            },
            medium: DifficultyProfile {
                answer_count: 4,
                question_count: 10,
                style_hints: hints(&["application", "comparison", "cause and effect"]),
            },
            hard: DifficultyProfile {
                answer_count: 4,
                question_count: 15,
                style_hints: hints(&["analysis", "evaluation", "multi-step reasoning"]),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    pub max_material_chars: usize,
    pub difficulties: DifficultyTable,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            max_material_chars: 4_000,
            difficulties: DifficultyTable::default(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    pub resolution_dpi: u32,
    /// Tesseract language code, e.g. `eng`.
    pub language: Option<String>,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    /// When set, OCR goes to this multimodal endpoint instead of tesseract.
    pub endpoint: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution_dpi: 300,
            language: None,
            timeout: Duration::from_secs(120),
            endpoint: None,
            api_key: None,
        }
    }
}
