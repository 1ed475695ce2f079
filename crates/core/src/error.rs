use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to open pdf {path}: {details}")]
    Open { path: String, details: String },

    #[error("no text could be extracted from {0}")]
    NoText(String),

    #[error("ocr failed: {0}")]
    OcrFailed(String),

    #[error("ocr timed out after {seconds}s: {step}")]
    OcrTimeout { step: String, seconds: u64 },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum EmbeddingStoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt store entry {path}: {details}")]
    Corrupt { path: String, details: String },

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ModelInvocationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{backend} returned {status}: {details}")]
    BackendResponse {
        backend: String,
        status: u16,
        details: String,
    },

    #[error("model call timed out after {0}s")]
    Timeout(u64),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("embedding count {received} doesn't match input count {expected}")]
    EmbeddingCount { expected: usize, received: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no valid questions parsed ({blocks} block(s) rejected)")]
    NoValidQuestions { blocks: usize },
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] ModelInvocationError),

    #[error("vector search failed: {0}")]
    Store(#[from] EmbeddingStoreError),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed for {path}: {source}")]
    Extraction {
        path: String,
        #[source]
        source: ExtractionError,
    },

    #[error("embedding store error: {0}")]
    Store(#[from] EmbeddingStoreError),

    #[error("embedding model error: {0}")]
    Model(#[from] ModelInvocationError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("extraction failed")]
    Extraction(#[source] ExtractionError),

    #[error("ai call failed")]
    ModelCall(#[source] ModelInvocationError),

    #[error("no valid questions parsed")]
    Parse(#[source] ParseError),

    #[error("quiz persistence failed: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("quiz {0} not found")]
    NotFound(uuid::Uuid),
}
