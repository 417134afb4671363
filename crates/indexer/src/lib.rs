//! # DevAgent Indexer
//!
//! Incremental project indexing and retrieval for the developer assistant.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (exclude globs + extension filter)
//!     │      └─> Source files
//!     │
//!     ├──> Change Tracker (SHA-256 manifest)
//!     │      └─> new / modified / deleted files
//!     │
//!     ├──> Chunker (functions, classes, text windows)
//!     │      └─> Code chunks
//!     │
//!     └──> Embedding Provider ─> Vector Index
//!            └─> Searchable, persisted index
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use devagent_indexer::{ContextEngine, DevAgentConfig};
//!
//! fn main() -> devagent_indexer::Result<()> {
//!     let root = std::path::Path::new("/path/to/project");
//!     let config = DevAgentConfig::load(root, None)?;
//!     let embedder = config.embedding.build_provider()?;
//!     let mut engine = ContextEngine::new(root, config, embedder)?;
//!
//!     let report = engine.index_codebase(false)?;
//!     println!("Indexed {} files, {} chunks", report.files_indexed, report.chunks_indexed);
//!
//!     for hit in engine.get_relevant_context("parse the config file", 5, None, None)? {
//!         println!("{} {:.3}", hit.id, hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod change_tracker;
mod config;
mod engine;
mod error;
mod manifest;
mod scanner;
mod stats;

pub use change_tracker::{hash_bytes, hash_file, needs_reindex};
pub use config::{
    DevAgentConfig, EmbeddingConfig, EmbeddingProviderKind, IndexingConfig, PerformanceConfig,
    DEFAULT_EXCLUDE_PATTERNS,
};
pub use engine::ContextEngine;
pub use error::{IndexerError, Result};
pub use manifest::HashManifest;
pub use scanner::{FileScanner, ScanOptions};
pub use stats::{EngineStats, IndexReport, SkippedFile};
