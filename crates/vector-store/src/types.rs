use crate::metadata::FlatMetadata;
use devagent_code_chunker::{ChunkType, CodeChunk};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted chunk: id, vector, raw text and flattened metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Position of the chunk in its file's extraction output
    pub seq: usize,
    pub chunk_type: ChunkType,
    pub content: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: FlatMetadata,
}

impl IndexRecord {
    #[must_use]
    pub fn make_id(file_path: &str, start_line: usize, end_line: usize, seq: usize) -> String {
        format!("{file_path}:{start_line}:{end_line}:{seq}")
    }
}

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub chunk: CodeChunk,
}

/// Exact-match conjunctive filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub file_path: Option<String>,
    pub chunk_type: Option<ChunkType>,
}

impl SearchFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    #[must_use]
    pub const fn chunk_type(mut self, chunk_type: ChunkType) -> Self {
        self.chunk_type = Some(chunk_type);
        self
    }

    #[must_use]
    pub fn matches(&self, record: &IndexRecord) -> bool {
        self.file_path
            .as_deref()
            .map_or(true, |path| record.file_path == path)
            && self.chunk_type.map_or(true, |ty| record.chunk_type == ty)
    }
}

/// Similarity query: a precomputed vector or text for the attached embedder
#[derive(Debug, Clone, Copy)]
pub enum SearchQuery<'a> {
    Vector(&'a [f32]),
    Text(&'a str),
}

impl<'a> From<&'a str> for SearchQuery<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a [f32]> for SearchQuery<'a> {
    fn from(vector: &'a [f32]) -> Self {
        Self::Vector(vector)
    }
}

impl<'a> From<&'a Vec<f32>> for SearchQuery<'a> {
    fn from(vector: &'a Vec<f32>) -> Self {
        Self::Vector(vector.as_slice())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub total_files: usize,
    pub chunk_type_counts: BTreeMap<String, usize>,
    pub per_file_counts: BTreeMap<String, usize>,
}
