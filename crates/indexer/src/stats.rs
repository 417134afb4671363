use devagent_vector_store::IndexStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file a bulk run could not index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Summary of an `index_codebase` / `update_index` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Files whose chunks were (re)written
    pub files_indexed: usize,

    /// Chunks persisted with an embedding
    pub chunks_indexed: usize,

    /// Chunks dropped because embedding them failed
    pub chunks_dropped: usize,

    /// Files whose chunks and manifest entry were removed
    pub files_removed: usize,

    pub skipped: Vec<SkippedFile>,

    /// Time taken in milliseconds
    pub elapsed_ms: u64,
}

impl IndexReport {
    pub fn add_file(&mut self, chunks: usize, dropped: usize) {
        self.files_indexed += 1;
        self.chunks_indexed += chunks;
        self.chunks_dropped += dropped;
    }

    pub fn add_skipped(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        let skipped = SkippedFile {
            path: path.into(),
            reason: reason.into(),
        };
        log::warn!("Skipping {}: {}", skipped.path, skipped.reason);
        self.skipped.push(skipped);
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.chunks_dropped == 0
    }
}

/// Engine-level statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub project_path: PathBuf,
    pub persist_directory: PathBuf,
    /// Files recorded in the hash manifest
    pub indexed_files: usize,
    pub model_id: String,
    pub dimension: usize,
    pub index: IndexStats,
}
