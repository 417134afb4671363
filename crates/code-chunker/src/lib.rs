//! # DevAgent Code Chunker
//!
//! Turns one source file into retrievable fragments for the context engine.
//!
//! ## Chunk families
//!
//! ```text
//! Source file
//!     │
//!     ├──> Analyzer registry (by extension)
//!     │      └─> tree-sitter: top-level functions + classes
//!     │            └─> `function` / `class` chunks (name, parameters, complexity, methods)
//!     │
//!     └──> Character windows (always)
//!            ├─> len <= chunk_size: one `file` chunk
//!            └─> otherwise: `text` chunks of chunk_size with fixed overlap
//! ```
//!
//! Both families are emitted for the same file. Embeddings are left unset; the vector
//! store never persists a chunk without one.
//!
//! ## Example
//!
//! ```rust
//! use devagent_code_chunker::{ChunkType, Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
//!
//! let code = "def add(a, b):\n    return a + b\n";
//! let chunks = chunker.extract_file("math_utils.py", code);
//!
//! assert_eq!(chunks[0].chunk_type, ChunkType::Function);
//! assert_eq!(chunks[0].name(), Some("add"));
//! assert_eq!(chunks[1].chunk_type, ChunkType::File);
//! ```

mod analyzer;
mod ast_analyzer;
mod chunker;
mod config;
mod error;
mod language;
mod types;

pub use analyzer::{
    analyzer_for_language, analyzer_for_path, ClassSymbol, FileSymbols, FunctionSymbol,
    SymbolAnalyzer, ANALYZER_EXTENSIONS,
};
pub use ast_analyzer::TreeSitterAnalyzer;
pub use chunker::{Chunker, Window};
pub use config::{ChunkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use types::{ChunkMetadata, ChunkType, CodeChunk};
