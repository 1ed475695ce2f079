use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use pdf_study_core::{
    CharacterNgramEmbedder, Difficulty, Embedder, HttpEmbedder, HttpOcr, IngestOptions,
    JsonQuizRepository, LanguageModel, LocalVectorStore, LopdfExtractor, OcrEngine,
    OpenAiChatModel, PdfExtractor, QdrantStore, Quiz, QuizRequest, StudyAssistant, StudyBackends,
    StudyConfig, TesseractOcr, VectorStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreBackend {
    Local,
    Qdrant,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmbedderBackend {
    /// Offline character trigram hashing.
    Ngram,
    /// OpenAI-compatible /embeddings endpoint.
    Http,
}

#[derive(Parser)]
#[command(name = "pdf-study", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file
    #[arg(long, env = "PDF_STUDY_CONFIG")]
    config: Option<PathBuf>,

    /// Vector store backend
    #[arg(long, value_enum, default_value = "local", env = "PDF_STUDY_STORE")]
    store: StoreBackend,

    /// Directory of the local vector store
    #[arg(long, env = "PDF_STUDY_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION")]
    qdrant_collection: Option<String>,

    /// Embedding backend
    #[arg(long, value_enum, default_value = "http", env = "PDF_STUDY_EMBEDDER")]
    embedder: EmbedderBackend,

    /// Embedding model identifier
    #[arg(long, env = "PDF_STUDY_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Chat model identifier
    #[arg(long, env = "PDF_STUDY_CHAT_MODEL")]
    chat_model: Option<String>,

    /// Directory where generated quizzes are stored
    #[arg(long, env = "PDF_STUDY_QUIZ_PATH")]
    quiz_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a folder of PDFs into the vector store.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: PathBuf,
        /// Clear the store before ingesting.
        #[arg(long, default_value_t = false)]
        reset: bool,
        /// Report unreadable PDFs instead of aborting.
        #[arg(long, default_value_t = false)]
        skip_unreadable: bool,
    },
    /// Answer a question from the ingested material.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Print the passages closest to a query.
    Search {
        #[arg(long)]
        query: String,
        /// Number of passages to return; defaults to retrieval.top_k.
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Generate a multiple-choice quiz from a PDF or a text file.
    #[command(group(ArgGroup::new("material").required(true).args(["pdf", "text_file"])))]
    Quiz {
        #[arg(long)]
        pdf: Option<PathBuf>,
        #[arg(long)]
        text_file: Option<PathBuf>,
        #[arg(long, default_value = "medium")]
        difficulty: Difficulty,
        #[arg(long, default_value = "Study quiz")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<StudyConfig> {
    let mut config = match &cli.config {
        Some(path) => StudyConfig::from_json_file(path)?,
        None => {
            let mut config = StudyConfig::default();
            config.apply_env();
            config
        }
    };

    if let Some(path) = &cli.store_path {
        config.store.path = path.clone();
    }
    if let Some(url) = &cli.qdrant_url {
        config.store.qdrant_url = url.clone();
    }
    if let Some(collection) = &cli.qdrant_collection {
        config.store.qdrant_collection = collection.clone();
    }
    if let Some(path) = &cli.quiz_path {
        config.store.quiz_path = path.clone();
    }
    if let Some(model) = &cli.embedding_model {
        config.embedding.model = model.clone();
    }
    if let Some(model) = &cli.chat_model {
        config.language_model.model = model.clone();
    }

    config.validate()?;
    Ok(config)
}

fn build_extractor(config: &StudyConfig) -> anyhow::Result<Arc<dyn PdfExtractor>> {
    if !config.ocr.enabled {
        return Ok(Arc::new(LopdfExtractor::new()));
    }

    let ocr: Arc<dyn OcrEngine> = match &config.ocr.endpoint {
        Some(endpoint) => Arc::new(HttpOcr::new(
            endpoint.clone(),
            config.ocr.api_key.clone(),
            config.ocr.timeout,
        )?),
        None => Arc::new(TesseractOcr::new(&config.ocr)),
    };
    Ok(Arc::new(LopdfExtractor::with_ocr(ocr)))
}

async fn build_backends(cli: &Cli, config: &StudyConfig) -> anyhow::Result<StudyBackends> {
    let embedder: Arc<dyn Embedder> = match cli.embedder {
        EmbedderBackend::Ngram => Arc::new(CharacterNgramEmbedder {
            dimensions: config.embedding.dimensions,
        }),
        EmbedderBackend::Http => Arc::new(HttpEmbedder::new(&config.embedding)?),
    };

    let store: Arc<dyn VectorStore> = match cli.store {
        StoreBackend::Local => Arc::new(
            LocalVectorStore::open(&config.store.path)
                .await
                .with_context(|| format!("opening {}", config.store.path.display()))?,
        ),
        StoreBackend::Qdrant => {
            let store = QdrantStore::new(
                &config.store.qdrant_url,
                config.store.qdrant_collection.clone(),
                embedder.dimensions(),
            )?;
            store.ensure_collection().await?;
            Arc::new(store)
        }
    };

    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiChatModel::new(&config.language_model)?);
    let quizzes = Arc::new(JsonQuizRepository::open(&config.store.quiz_path).await?);

    Ok(StudyBackends {
        extractor: build_extractor(config)?,
        embedder,
        store,
        model,
        quizzes,
    })
}

fn print_quiz(quiz: &Quiz) {
    println!("quiz {} \"{}\" ({})", quiz.id, quiz.title, quiz.difficulty);
    for (number, question) in quiz.questions.iter().enumerate() {
        println!();
        println!("Question {}: {}", number + 1, question.text);
        for (letter, answer) in ('A'..='Z').zip(&question.answers) {
            let marker = if answer.is_correct { "*" } else { " " };
            println!("{marker} {letter}. {}", answer.text);
        }
    }
}

async fn read_material(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let assistant = StudyAssistant::new(build_backends(&cli, &config).await?, &config)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-study boot"
    );

    match cli.command {
        Command::Ingest {
            folder,
            reset,
            skip_unreadable,
        } => {
            let report = assistant
                .ingest(
                    &folder,
                    IngestOptions {
                        reset,
                        skip_unreadable,
                    },
                )
                .await?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }

            println!(
                "{} documents, {} chunks, {} already stored, {} inserted at {}",
                report.documents,
                report.chunks,
                report.existing,
                report.inserted_count,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question } => {
            println!("{}", assistant.answer_question(&question).await);
        }
        Command::Search { query, top_k } => {
            let passages = assistant.search(&query, top_k).await?;
            println!("query: {query}");
            if passages.is_empty() {
                println!("no passages found");
            }
            for passage in passages {
                println!(
                    "[{}] score={:.4} page={} chunk={}",
                    passage.source, passage.score, passage.page_number, passage.id
                );
                println!("{}", passage.content);
            }
        }
        Command::Quiz {
            pdf,
            text_file,
            difficulty,
            title,
            description,
        } => {
            let quiz = match (pdf, text_file) {
                (Some(pdf), _) => {
                    assistant
                        .generate_quiz_from_pdf(&pdf, &title, &description, difficulty)
                        .await?
                }
                (None, Some(text_file)) => {
                    let material = read_material(&text_file).await?;
                    assistant
                        .generate_quiz(QuizRequest {
                            title,
                            description,
                            material,
                            difficulty,
                        })
                        .await?
                }
                (None, None) => anyhow::bail!("either --pdf or --text-file is required"),
            };
            print_quiz(&quiz);
        }
    }

    Ok(())
}
