pub mod local;
pub mod qdrant;

pub use local::{cosine_similarity, LocalVectorStore};
pub use qdrant::QdrantStore;
