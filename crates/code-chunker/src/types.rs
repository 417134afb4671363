use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Open key/value metadata attached to a chunk. The shape depends on the chunk type.
pub type ChunkMetadata = BTreeMap<String, Value>;

/// A positioned fragment of source text, the unit of retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeChunk {
    /// Raw source fragment
    pub content: String,

    /// Project-relative source path (`/` separated)
    pub file_path: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Classification of the fragment
    pub chunk_type: ChunkType,

    /// Type-dependent metadata (name, parameters, chunk number, ...)
    #[serde(default)]
    pub metadata: ChunkMetadata,

    /// Embedding vector, present only after the embedding step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl CodeChunk {
    /// Create a new chunk without an embedding
    #[must_use]
    pub fn new(
        file_path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        content: impl Into<String>,
        chunk_type: ChunkType,
    ) -> Self {
        Self {
            content: content.into(),
            file_path: file_path.into(),
            start_line,
            end_line: end_line.max(start_line),
            chunk_type,
            metadata: ChunkMetadata::new(),
            embedding: None,
        }
    }

    /// Builder: insert a metadata value
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builder: attach an embedding
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Symbol name for function/class chunks
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(Value::as_str)
    }

    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Check if chunk contains a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.embedding.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// Kind of chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ChunkType {
    /// Top-level function
    Function,
    /// Class (or struct/trait/impl) including its methods
    Class,
    /// Whole file small enough to fit one chunk
    File,
    /// Sliding text window over a larger file
    Text,
}

impl ChunkType {
    pub const ALL: [Self; 4] = [Self::Function, Self::Class, Self::File, Self::Text];

    /// Whether the chunk comes from a structural analyzer
    #[must_use]
    pub const fn is_semantic(self) -> bool {
        matches!(self, Self::Function | Self::Class)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::File => "file",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown chunk type '{s}' (expected function|class|file|text)"))
    }
}
