use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::error::{Result, VectorStoreError};
use crate::metadata;
use crate::paths::index_path;
use crate::types::{IndexRecord, IndexStats, SearchFilter, SearchQuery, SearchResult};
use devagent_code_chunker::CodeChunk;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const INDEX_SCHEMA_VERSION: u32 = 1;

#[derive(Deserialize)]
struct PersistedIndex {
    schema_version: u32,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    dimension: Option<usize>,
    records: Vec<IndexRecord>,
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    schema_version: u32,
    model_id: Option<&'a str>,
    dimension: Option<usize>,
    records: Vec<&'a IndexRecord>,
}

/// Persistent brute-force vector index.
///
/// All records live in memory and are persisted as a single JSON document
/// (`<persist_dir>/index.json`), rewritten atomically after every mutation. Inside a
/// deferred batch ([`VectorIndex::begin_batch`]) writes are held back until
/// [`VectorIndex::flush`] or [`VectorIndex::commit_batch`].
pub struct VectorIndex {
    path: PathBuf,
    records: BTreeMap<String, IndexRecord>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    model_id: Option<String>,
    dimension: Option<usize>,
    deferred: bool,
    dirty: bool,
}

impl VectorIndex {
    /// Open (or start) the index stored in `persist_dir`.
    ///
    /// An unreadable or malformed index file is an error, never silently replaced.
    pub fn open(
        persist_dir: impl AsRef<Path>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<Self> {
        let path = index_path(persist_dir.as_ref());
        let mut index = Self {
            path,
            records: BTreeMap::new(),
            model_id: embedder.as_ref().map(|e| e.model_id().to_string()),
            dimension: embedder.as_ref().map(|e| e.dimension()),
            embedder,
            deferred: false,
            dirty: false,
        };

        if index.path.exists() {
            index.load()?;
            log::info!(
                "Loaded {} chunks from {}",
                index.records.len(),
                index.path.display()
            );
        } else {
            log::debug!("No index at {}; starting empty", index.path.display());
        }
        Ok(index)
    }

    fn load(&mut self) -> Result<()> {
        let bytes = std::fs::read(&self.path)?;
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)
            .map_err(|e| VectorStoreError::corrupt(&self.path, e.to_string()))?;
        if persisted.schema_version != INDEX_SCHEMA_VERSION {
            return Err(VectorStoreError::corrupt(
                &self.path,
                format!(
                    "unsupported schema_version {} (expected {INDEX_SCHEMA_VERSION})",
                    persisted.schema_version
                ),
            ));
        }

        let mut records = BTreeMap::new();
        for record in persisted.records {
            if let Some(expected) = persisted.dimension {
                if record.vector.len() != expected {
                    return Err(VectorStoreError::corrupt(
                        &self.path,
                        format!(
                            "record {} has {} dimensions, index has {expected}",
                            record.id,
                            record.vector.len()
                        ),
                    ));
                }
            }
            records.insert(record.id.clone(), record);
        }

        self.records = records;
        // an empty index adopts the attached provider's identity
        if !self.records.is_empty() || self.embedder.is_none() {
            self.model_id = persisted.model_id;
            self.dimension = persisted.dimension;
        }
        Ok(())
    }

    /// Model id of the stored vectors (or of the attached provider when empty)
    #[must_use]
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether stored vectors are comparable with `provider`'s output
    #[must_use]
    pub fn is_compatible_with(&self, provider: &dyn EmbeddingProvider) -> bool {
        if self.records.is_empty() {
            return true;
        }
        self.model_id.as_deref() == Some(provider.model_id())
            && self.dimension == Some(provider.dimension())
    }

    /// Upsert embedded chunks; returns the number of records written.
    ///
    /// Chunks without a usable embedding (missing, empty or non-finite) are skipped but still
    /// consume their position: the id of each chunk is `file_path:start:end:seq` with `seq`
    /// its index among the batch's chunks for that file. The batch is validated before anything is written.
    pub fn add(&mut self, chunks: Vec<CodeChunk>) -> Result<usize> {
        let mut seqs: HashMap<String, usize> = HashMap::new();
        let mut pending = Vec::with_capacity(chunks.len());
        let mut dimension = self.dimension;

        for chunk in chunks {
            let seq = {
                let next = seqs.entry(chunk.file_path.clone()).or_insert(0);
                let seq = *next;
                *next += 1;
                seq
            };
            let Some(vector) = chunk.embedding.filter(|v| !v.is_empty()) else {
                log::debug!(
                    "Skipping unembedded chunk {}:{}-{}",
                    chunk.file_path,
                    chunk.start_line,
                    chunk.end_line
                );
                continue;
            };
            // JSON has no NaN or infinity; such a record would make the saved index unreadable
            if !vector.iter().all(|x| x.is_finite()) {
                log::warn!(
                    "Skipping chunk {}:{}-{} with a non-finite embedding",
                    chunk.file_path,
                    chunk.start_line,
                    chunk.end_line
                );
                continue;
            }
            match dimension {
                Some(expected) if vector.len() != expected => {
                    return Err(VectorStoreError::InvalidDimension {
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(vector.len()),
            }
            pending.push(IndexRecord {
                id: IndexRecord::make_id(&chunk.file_path, chunk.start_line, chunk.end_line, seq),
                file_path: chunk.file_path,
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                seq,
                chunk_type: chunk.chunk_type,
                content: chunk.content,
                vector,
                metadata: metadata::encode(&chunk.metadata)?,
            });
        }

        if pending.is_empty() {
            return Ok(0);
        }
        let written = pending.len();
        self.dimension = dimension;
        for record in pending {
            self.records.insert(record.id.clone(), record);
        }
        log::debug!("Added {written} chunks. Total: {}", self.records.len());
        self.mark_dirty()?;
        Ok(written)
    }

    /// Top `k` records by cosine similarity, ties broken by id
    pub fn search<'q>(
        &self,
        query: impl Into<SearchQuery<'q>>,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>> {
        let owned;
        let vector: &[f32] = match query.into() {
            SearchQuery::Vector(vector) => vector,
            SearchQuery::Text(text) => {
                let embedder = self.embedder.as_ref().ok_or(VectorStoreError::MissingEmbedder)?;
                owned = embedder.embed(text)?;
                &owned
            }
        };
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(VectorStoreError::InvalidDimension {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(&IndexRecord, f32)> = self
            .records
            .values()
            .filter(|record| filter.matches(record))
            .map(|record| (record, cosine_similarity(vector, &record.vector)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(record, score)| {
                Ok(SearchResult {
                    id: record.id.clone(),
                    score,
                    chunk: to_chunk(record)?,
                })
            })
            .collect()
    }

    /// Remove every record of `file_path`; returns how many were removed
    pub fn delete_by_file(&mut self, file_path: &str) -> Result<usize> {
        let before = self.records.len();
        self.records.retain(|_, record| record.file_path != file_path);
        let removed = before - self.records.len();
        if removed > 0 {
            log::debug!("Deleted {removed} chunks of {file_path}");
            self.mark_dirty()?;
        }
        Ok(removed)
    }

    /// All chunks of `file_path` in extraction order
    pub fn get_by_file(&self, file_path: &str) -> Result<Vec<CodeChunk>> {
        let mut records: Vec<&IndexRecord> = self
            .records
            .values()
            .filter(|record| record.file_path == file_path)
            .collect();
        records.sort_by_key(|record| (record.seq, record.start_line));
        records.into_iter().map(to_chunk).collect()
    }

    /// Drop every record. The index takes on the attached provider's identity.
    pub fn clear(&mut self) -> Result<()> {
        log::info!("Clearing {} chunks from {}", self.records.len(), self.path.display());
        self.records.clear();
        self.model_id = self.embedder.as_ref().map(|e| e.model_id().to_string());
        self.dimension = self.embedder.as_ref().map(|e| e.dimension());
        self.mark_dirty()
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            total_chunks: self.records.len(),
            ..IndexStats::default()
        };
        for record in self.records.values() {
            *stats
                .chunk_type_counts
                .entry(record.chunk_type.to_string())
                .or_insert(0) += 1;
            *stats
                .per_file_counts
                .entry(record.file_path.clone())
                .or_insert(0) += 1;
        }
        stats.total_files = stats.per_file_counts.len();
        stats
    }

    /// Distinct indexed file paths, sorted
    #[must_use]
    pub fn list_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .records
            .values()
            .map(|record| record.file_path.clone())
            .collect();
        files.sort();
        files.dedup();
        files
    }

    #[must_use]
    pub fn count_chunks(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hold back writes until [`VectorIndex::commit_batch`]
    pub fn begin_batch(&mut self) {
        self.deferred = true;
    }

    /// Leave deferred mode and persist pending changes
    pub fn commit_batch(&mut self) -> Result<()> {
        self.deferred = false;
        if self.dirty {
            self.flush()?;
        }
        Ok(())
    }

    fn mark_dirty(&mut self) -> Result<()> {
        self.dirty = true;
        if self.deferred {
            return Ok(());
        }
        self.flush()
    }

    /// Write the index atomically (temp file + rename)
    pub fn flush(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedIndexRef {
            schema_version: INDEX_SCHEMA_VERSION,
            model_id: self.model_id.as_deref(),
            dimension: self.dimension,
            records: self.records.values().collect(),
        };
        let bytes = serde_json::to_vec(&persisted)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        log::debug!("Index saved to {}", self.path.display());
        Ok(())
    }
}

fn to_chunk(record: &IndexRecord) -> Result<CodeChunk> {
    let mut chunk = CodeChunk::new(
        record.file_path.clone(),
        record.start_line,
        record.end_line,
        record.content.clone(),
        record.chunk_type,
    );
    chunk.metadata = metadata::decode(&record.metadata)?;
    chunk.embedding = Some(record.vector.clone());
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use devagent_code_chunker::ChunkType;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn chunk(file: &str, start: usize, end: usize, ty: ChunkType, vector: Vec<f32>) -> CodeChunk {
        CodeChunk::new(file, start, end, format!("{file} {start}-{end}"), ty)
            .with_embedding(vector)
    }

    fn open(dir: &TempDir) -> VectorIndex {
        VectorIndex::open(dir.path(), None).unwrap()
    }

    #[test]
    fn non_finite_vectors_are_never_persisted() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        let written = index
            .add(vec![
                chunk("a.py", 1, 2, ChunkType::Function, vec![f32::NAN, 1.0]),
                chunk("a.py", 4, 5, ChunkType::Function, vec![f32::INFINITY, 0.0]),
                chunk("a.py", 1, 5, ChunkType::File, vec![0.0, 1.0]),
            ])
            .unwrap();
        assert_eq!(written, 1);

        let reopened = open(&tmp);
        assert_eq!(reopened.len(), 1);
        let ids: Vec<_> = reopened
            .get_by_file("a.py")
            .unwrap()
            .iter()
            .map(|c| (c.start_line, c.end_line))
            .collect();
        assert_eq!(ids, vec![(1, 5)]);
    }

    #[test]
    fn unembedded_chunks_are_skipped_but_keep_their_position() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        let written = index
            .add(vec![
                CodeChunk::new("a.py", 1, 2, "no vector", ChunkType::Function),
                chunk("a.py", 1, 10, ChunkType::File, vec![1.0, 0.0]),
            ])
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(index.len(), 1);
        let hits = index.search(&[1.0f32, 0.0][..], 5, &SearchFilter::new()).unwrap();
        assert_eq!(hits[0].id, "a.py:1:10:1");
    }

    #[test]
    fn search_orders_filters_and_limits() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        index
            .add(vec![
                chunk("a.py", 1, 3, ChunkType::Function, vec![1.0, 0.0]),
                chunk("a.py", 1, 9, ChunkType::File, vec![0.8, 0.2]),
                chunk("b.py", 1, 4, ChunkType::Function, vec![0.0, 1.0]),
                chunk("b.py", 5, 8, ChunkType::Function, vec![0.9, 0.1]),
            ])
            .unwrap();

        let query = [1.0f32, 0.0];
        let all = index.search(&query[..], 10, &SearchFilter::new()).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a.py:1:3:0", "b.py:5:8:1", "a.py:1:9:1", "b.py:1:4:0"]);
        assert!(all.windows(2).all(|w| w[0].score >= w[1].score));

        let functions = index
            .search(&query[..], 10, &SearchFilter::new().chunk_type(ChunkType::Function))
            .unwrap();
        assert_eq!(functions.len(), 3);

        let b_functions = index
            .search(
                &query[..],
                10,
                &SearchFilter::new()
                    .file_path("b.py")
                    .chunk_type(ChunkType::Function),
            )
            .unwrap();
        let ids: Vec<_> = b_functions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b.py:5:8:1", "b.py:1:4:0"]);

        assert_eq!(index.search(&query[..], 2, &SearchFilter::new()).unwrap().len(), 2);
        assert!(index.search(&query[..], 0, &SearchFilter::new()).unwrap().is_empty());
    }

    #[test]
    fn equal_scores_are_ordered_by_id() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        index
            .add(vec![
                chunk("z.py", 1, 1, ChunkType::Text, vec![1.0, 0.0]),
                chunk("m.py", 1, 1, ChunkType::Text, vec![2.0, 0.0]),
            ])
            .unwrap();
        let hits = index.search(&[1.0f32, 0.0][..], 2, &SearchFilter::new()).unwrap();
        let ids: Vec<_> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m.py:1:1:0", "z.py:1:1:0"]);
    }

    #[test]
    fn delete_by_file_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        index
            .add(vec![
                chunk("x.py", 1, 2, ChunkType::Function, vec![1.0, 0.0]),
                chunk("x.py", 1, 5, ChunkType::File, vec![1.0, 0.0]),
                chunk("y.py", 1, 5, ChunkType::File, vec![0.0, 1.0]),
            ])
            .unwrap();
        assert_eq!(index.delete_by_file("x.py").unwrap(), 2);
        assert_eq!(index.delete_by_file("x.py").unwrap(), 0);
        assert_eq!(index.delete_by_file("never.py").unwrap(), 0);
        assert!(index.get_by_file("x.py").unwrap().is_empty());
        assert_eq!(index.list_files(), vec!["y.py"]);
    }

    #[test]
    fn readding_a_file_replaces_not_duplicates() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        let batch = || {
            vec![
                chunk("a.py", 1, 2, ChunkType::Function, vec![1.0, 0.0]),
                chunk("a.py", 1, 5, ChunkType::File, vec![0.5, 0.5]),
            ]
        };
        index.add(batch()).unwrap();
        index.add(batch()).unwrap();
        assert_eq!(index.count_chunks(), 2);
    }

    #[test]
    fn dimension_mismatch_rejects_whole_batch() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        index
            .add(vec![chunk("a.py", 1, 1, ChunkType::File, vec![1.0, 0.0])])
            .unwrap();
        let err = index
            .add(vec![
                chunk("b.py", 1, 1, ChunkType::File, vec![1.0, 0.0]),
                chunk("b.py", 2, 2, ChunkType::Text, vec![1.0, 0.0, 0.0]),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::InvalidDimension { expected: 2, actual: 3 }
        ));
        assert_eq!(index.len(), 1);
        assert!(index.search(&[1.0f32][..], 1, &SearchFilter::new()).is_err());
    }

    #[test]
    fn get_by_file_restores_metadata_in_extraction_order() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        index
            .add(vec![
                chunk("a.py", 12, 20, ChunkType::Function, vec![1.0, 0.0])
                    .with_meta("name", "late")
                    .with_meta("parameters", json!(["x", "y"])),
                chunk("a.py", 3, 5, ChunkType::Function, vec![0.0, 1.0])
                    .with_meta("name", "early"),
                chunk("a.py", 1, 20, ChunkType::File, vec![1.0, 1.0])
                    .with_meta("total_lines", 20),
            ])
            .unwrap();
        let chunks = index.get_by_file("a.py").unwrap();
        let names: Vec<_> = chunks.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec![Some("late"), Some("early"), None]);
        assert_eq!(chunks[0].metadata["parameters"], json!(["x", "y"]));
        assert_eq!(chunks[2].metadata["total_lines"], json!(20));
        assert!(chunks.iter().all(CodeChunk::is_embedded));
    }

    #[test]
    fn stats_count_types_and_files() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        index
            .add(vec![
                chunk("a.py", 1, 2, ChunkType::Function, vec![1.0]),
                chunk("a.py", 1, 9, ChunkType::File, vec![1.0]),
                chunk("b.py", 1, 3, ChunkType::Class, vec![1.0]),
            ])
            .unwrap();
        let stats = index.stats();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.chunk_type_counts["function"], 1);
        assert_eq!(stats.chunk_type_counts["class"], 1);
        assert_eq!(stats.chunk_type_counts["file"], 1);
        assert_eq!(stats.per_file_counts["a.py"], 2);

        index.clear().unwrap();
        assert_eq!(index.stats(), IndexStats::default());
    }

    #[test]
    fn text_search_needs_an_embedder() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);
        let err = index.search("anything", 3, &SearchFilter::new()).unwrap_err();
        assert!(matches!(err, VectorStoreError::MissingEmbedder));
    }

    #[test]
    fn text_search_uses_attached_embedder() {
        let tmp = TempDir::new().unwrap();
        let embedder = Arc::new(HashingEmbedder::new(64).unwrap());
        let mut index = VectorIndex::open(tmp.path(), Some(embedder.clone() as Arc<dyn EmbeddingProvider>))
                .unwrap();
        let texts = ["def add(a, b): return a + b", "class Renderer: pass"];
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                CodeChunk::new("m.py", i + 1, i + 1, *text, ChunkType::Text)
                    .with_embedding(embedder.embed(text).unwrap())
            })
            .collect();
        index.add(chunks).unwrap();
        let hits = index.search("add numbers a b", 1, &SearchFilter::new()).unwrap();
        assert_eq!(hits[0].chunk.content, texts[0]);
        assert_eq!(index.model_id(), Some("hashing-v1-64"));
    }

    #[test]
    fn deferred_batch_writes_once_on_commit() {
        let tmp = TempDir::new().unwrap();
        let mut index = open(&tmp);
        index.begin_batch();
        index
            .add(vec![chunk("a.py", 1, 1, ChunkType::File, vec![1.0])])
            .unwrap();
        assert!(!index.path().exists());
        index.commit_batch().unwrap();
        assert!(index.path().exists());
        assert_eq!(open(&tmp).len(), 1);
    }
}
