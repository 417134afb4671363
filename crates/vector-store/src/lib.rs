//! # DevAgent Vector Store
//!
//! Embedding providers and a persistent similarity index for code chunks.
//!
//! ## Architecture
//!
//! ```text
//! CodeChunk[] (embedded)
//!     │
//!     ├──> Metadata codec
//!     │      └─> primitives kept, everything else as tagged JSON text
//!     │
//!     ├──> VectorIndex (in memory, brute-force cosine)
//!     │      └─> exact-match filters on file_path / chunk_type
//!     │
//!     └──> <persist_dir>/index.json
//!            └─> schema_version + model id + dimension, atomic rewrite
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use devagent_vector_store::{
//!     EmbeddingProvider, HashingEmbedder, SearchFilter, VectorIndex,
//! };
//! use devagent_code_chunker::{ChunkType, CodeChunk};
//! use std::sync::Arc;
//!
//! fn main() -> devagent_vector_store::Result<()> {
//!     let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::default());
//!     let mut index = VectorIndex::open(".devagent/index", Some(embedder.clone()))?;
//!
//!     let text = "def add(a, b):\n    return a + b";
//!     let chunk = CodeChunk::new("math.py", 1, 2, text, ChunkType::Function)
//!         .with_embedding(embedder.embed(text)?);
//!     index.add(vec![chunk])?;
//!
//!     for hit in index.search("add two numbers", 5, &SearchFilter::new())? {
//!         println!("{}: {:.3}", hit.id, hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
pub mod metadata;
mod ollama;
pub mod paths;
mod store;
mod types;

pub use embeddings::{cosine_similarity, EmbeddingProvider, HashingEmbedder, DEFAULT_DIMENSION};
pub use error::{Result, VectorStoreError};
pub use ollama::{OllamaEmbedder, DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL};
pub use store::{VectorIndex, INDEX_SCHEMA_VERSION};
pub use types::{IndexRecord, IndexStats, SearchFilter, SearchQuery, SearchResult};

// Re-export code chunker types for convenience
pub use devagent_code_chunker::{ChunkMetadata, ChunkType, CodeChunk};
