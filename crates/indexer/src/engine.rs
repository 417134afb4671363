use crate::change_tracker::{hash_bytes, needs_reindex};
use crate::config::DevAgentConfig;
use crate::error::{IndexerError, Result};
use crate::manifest::HashManifest;
use crate::scanner::{FileScanner, ScanOptions};
use crate::stats::{EngineStats, IndexReport};
use devagent_code_chunker::{ChunkType, Chunker, CodeChunk};
use devagent_vector_store::paths::manifest_path;
use devagent_vector_store::{
    EmbeddingProvider, SearchFilter, SearchResult, VectorIndex, VectorStoreError,
};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const FUNCTION_QUERY_PREFIX: &str = "function";
const TEST_PATTERN_QUERY: &str = "test function unittest pytest assert";
const TEST_PATTERN_MARKERS: &[&str] = &["test_", "def test", "it(", "describe(", "assert"];
const TEST_PATTERN_CANDIDATES: usize = 10;

enum FileOutcome {
    Indexed { chunks: usize, dropped: usize },
    Skipped(String),
}

/// Indexing and retrieval over one project.
///
/// The engine owns the embedding provider, the vector index, and the hash manifest of
/// its persist directory. Only one engine may use a persist directory at a time; nothing
/// enforces this.
pub struct ContextEngine {
    root: PathBuf,
    config: DevAgentConfig,
    persist_dir: PathBuf,
    chunker: Chunker,
    scanner: FileScanner,
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
    manifest: HashManifest,
}

impl ContextEngine {
    /// Open the engine for `project_root`, loading any existing index and manifest.
    ///
    /// If the stored vectors were produced by a different model (id or dimension), the index
    /// and manifest are discarded so the next run rebuilds them.
    pub fn new(
        project_root: impl AsRef<Path>,
        config: DevAgentConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let root = project_root.as_ref();
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "Not a directory: {}",
                root.display()
            )));
        }
        let root = root.canonicalize()?;
        config.validate()?;

        let persist_dir = config.persist_dir(&root);
        std::fs::create_dir_all(&persist_dir)?;
        let chunker = Chunker::new(config.chunker_config())?;
        let scanner = FileScanner::new(&root, &ScanOptions::from(&config.indexing))?;
        let mut index = VectorIndex::open(&persist_dir, Some(embedder.clone()))?;
        let mut manifest = HashManifest::load(manifest_path(&persist_dir));

        if !index.is_compatible_with(embedder.as_ref()) {
            log::warn!(
                "Index was built with {} ({} dims) but the provider is {} ({} dims); discarding it",
                index.model_id().unwrap_or("unknown model"),
                index.dimension().unwrap_or(0),
                embedder.model_id(),
                embedder.dimension()
            );
            index.clear()?;
            manifest.clear();
            save_manifest(&manifest);
        }

        log::info!(
            "Context engine for {} ({} files in manifest, {} chunks)",
            root.display(),
            manifest.len(),
            index.len()
        );
        Ok(Self {
            root,
            config,
            persist_dir,
            chunker,
            scanner,
            embedder,
            index,
            manifest,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn config(&self) -> &DevAgentConfig {
        &self.config
    }

    #[must_use]
    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    /// Index every included file of the project.
    ///
    /// Each file is replayed (old chunks deleted, new chunks added), so re-running is
    /// idempotent. Manifest entries of files that no longer exist are pruned together with
    /// their chunks. Per-file failures are reported, not fatal; index failures are fatal.
    pub fn index_codebase(&mut self, force_reindex: bool) -> Result<IndexReport> {
        let started = Instant::now();
        let mut report = IndexReport::default();
        log::info!(
            "Indexing {}{}",
            self.root.display(),
            if force_reindex { " (forced)" } else { "" }
        );

        self.index.begin_batch();
        let outcome = self.run_full_index(force_reindex, &mut report);
        let committed = self.index.commit_batch();
        save_manifest(&self.manifest);
        outcome?;
        committed?;

        report.elapsed_ms = elapsed_ms(started);
        log::info!(
            "Indexed {} files ({} chunks) in {} ms; {} removed, {} skipped",
            report.files_indexed,
            report.chunks_indexed,
            report.elapsed_ms,
            report.files_removed,
            report.skipped.len()
        );
        Ok(report)
    }

    fn run_full_index(&mut self, force_reindex: bool, report: &mut IndexReport) -> Result<()> {
        if force_reindex {
            self.index.clear()?;
            self.manifest.clear();
        }

        let files = self.scanner.scan();
        let total = files.len();
        let batch_size = self.config.performance.index_batch_size.max(1);
        let mut included = BTreeSet::new();
        for (i, path) in files.iter().enumerate() {
            let Some(rel) = self.scanned_rel(path, report) else {
                continue;
            };
            self.index_one(path, &rel, report)?;
            included.insert(rel);

            if (i + 1) % batch_size == 0 && i + 1 < total {
                log::info!("Indexed {}/{total} files", i + 1);
                self.checkpoint()?;
            }
        }

        self.prune_stale(&included, report)
    }

    /// Re-index changed files.
    ///
    /// With an explicit list, each entry is re-indexed, or removed if it no longer exists.
    /// Without one, changes are detected: manifest entries whose content hash differs are
    /// modified, entries whose file vanished are removed right away, and included files
    /// missing from the manifest are new. The manifest is saved once at the end.
    pub fn update_index(&mut self, changed_files: Option<&[PathBuf]>) -> Result<IndexReport> {
        let started = Instant::now();
        let mut report = IndexReport::default();

        self.index.begin_batch();
        let outcome = self.run_update(changed_files, &mut report);
        let committed = self.index.commit_batch();
        save_manifest(&self.manifest);
        outcome?;
        committed?;

        report.elapsed_ms = elapsed_ms(started);
        log::info!(
            "Updated {} files ({} chunks) in {} ms; {} removed, {} skipped",
            report.files_indexed,
            report.chunks_indexed,
            report.elapsed_ms,
            report.files_removed,
            report.skipped.len()
        );
        Ok(report)
    }

    fn run_update(
        &mut self,
        changed_files: Option<&[PathBuf]>,
        report: &mut IndexReport,
    ) -> Result<()> {
        let explicit = changed_files.is_some();
        let changed = match changed_files {
            Some(list) => {
                let mut changed = Vec::with_capacity(list.len());
                for path in list {
                    match self.relative_path(path) {
                        Ok(rel) => changed.push(rel),
                        Err(e) => report.add_skipped(path.display().to_string(), e.to_string()),
                    }
                }
                changed
            }
            None => self.detect_changes(report)?,
        };
        log::info!("{} files to update", changed.len());

        for rel in changed {
            let abs = self.root.join(&rel);
            if !abs.exists() {
                self.remove_file(&rel, report)?;
                continue;
            }
            if explicit && !self.scanner.accepts(&rel) {
                report.add_skipped(rel, "excluded or unsupported file type");
                continue;
            }
            self.index_one(&abs, &rel, report)?;
        }
        Ok(())
    }

    /// Modified and new files; vanished files are removed on the spot
    fn detect_changes(&mut self, report: &mut IndexReport) -> Result<Vec<String>> {
        let known: Vec<(String, String)> = self
            .manifest
            .iter()
            .map(|(path, digest)| (path.to_string(), digest.to_string()))
            .collect();

        let mut changed = Vec::new();
        for (rel, digest) in &known {
            let abs = self.root.join(rel);
            if !abs.exists() {
                self.remove_file(rel, report)?;
            } else if needs_reindex(&abs, Some(digest)) {
                log::debug!("Modified: {rel}");
                changed.push(rel.clone());
            }
        }

        for path in self.scanner.scan() {
            let Some(rel) = self.scanned_rel(&path, report) else {
                continue;
            };
            if !self.manifest.contains(&rel) {
                log::debug!("New: {rel}");
                changed.push(rel);
            }
        }
        Ok(changed)
    }

    fn index_one(&mut self, abs: &Path, rel: &str, report: &mut IndexReport) -> Result<()> {
        match self.index_file(abs, rel)? {
            FileOutcome::Indexed { chunks, dropped } => {
                log::debug!("Indexed {rel}: {chunks} chunks");
                report.add_file(chunks, dropped);
            }
            FileOutcome::Skipped(reason) => {
                // old chunks must not outlive a failed re-read; no manifest entry means retry
                let removed = self.index.delete_by_file(rel)?;
                if self.manifest.remove(rel) || removed > 0 {
                    log::debug!("Dropped {removed} stale chunks of {rel}");
                }
                report.add_skipped(rel, reason);
            }
        }
        Ok(())
    }

    /// Project-relative key of a scanned path; paths that cannot be keyed are reported
    fn scanned_rel(&self, path: &Path, report: &mut IndexReport) -> Option<String> {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            report.add_skipped(path.display().to_string(), "outside the project root");
            return None;
        };
        let key = to_slash(rel);
        if key.is_none() {
            report.add_skipped(path.display().to_string(), "path is not valid UTF-8");
        }
        key
    }

    /// Extract, embed, and replay one file. Read and decode problems skip the file;
    /// index errors propagate.
    fn index_file(&mut self, abs: &Path, rel: &str) -> Result<FileOutcome> {
        let max_size = self.scanner.max_file_size_bytes();
        match std::fs::metadata(abs) {
            Ok(meta) if meta.len() > max_size => {
                return Ok(FileOutcome::Skipped(format!(
                    "file is {} bytes, limit is {max_size}",
                    meta.len()
                )));
            }
            Ok(_) => {}
            Err(e) => return Ok(FileOutcome::Skipped(format!("stat failed: {e}"))),
        }
        let bytes = match std::fs::read(abs) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(FileOutcome::Skipped(format!("read failed: {e}"))),
        };
        let digest = hash_bytes(&bytes);
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => return Ok(FileOutcome::Skipped("not valid UTF-8".to_string())),
        };

        let chunks = self.chunker.extract_file(rel, &content);
        let (chunks, dropped) = self.embed_chunks(rel, chunks);

        self.index.delete_by_file(rel)?;
        let written = self.index.add(chunks)?;
        self.manifest.insert(rel, digest);
        Ok(FileOutcome::Indexed {
            chunks: written,
            dropped,
        })
    }

    /// Attach embeddings. A failed batch falls back to one call per chunk so only the
    /// failing chunks lose their vector (and are then never persisted). Vectors with
    /// non-finite components count as failures.
    fn embed_chunks(&self, rel: &str, mut chunks: Vec<CodeChunk>) -> (Vec<CodeChunk>, usize) {
        if chunks.is_empty() {
            return (chunks, 0);
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors: Vec<devagent_vector_store::Result<Vec<f32>>> =
            match self.embedder.embed_batch(&texts) {
                Ok(vectors) if vectors.len() == chunks.len() => {
                    vectors.into_iter().map(Ok).collect()
                }
                Ok(vectors) => {
                    log::warn!(
                        "Embedding batch for {rel} returned {} vectors for {} chunks",
                        vectors.len(),
                        chunks.len()
                    );
                    texts.iter().map(|text| self.embedder.embed(text)).collect()
                }
                Err(e) => {
                    log::warn!("Embedding batch for {rel} failed: {e}");
                    texts.iter().map(|text| self.embedder.embed(text)).collect()
                }
            };

        let mut dropped = 0;
        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            let vector = vector.and_then(|v| {
                if v.iter().all(|x| x.is_finite()) {
                    Ok(v)
                } else {
                    Err(VectorStoreError::embedding("non-finite value in embedding"))
                }
            });
            match vector {
                Ok(vector) => chunk.embedding = Some(vector),
                Err(e) => {
                    log::warn!(
                        "Dropping chunk {rel}:{}-{}: {e}",
                        chunk.start_line,
                        chunk.end_line
                    );
                    chunk.embedding = None;
                    dropped += 1;
                }
            }
        }
        (chunks, dropped)
    }

    fn remove_file(&mut self, rel: &str, report: &mut IndexReport) -> Result<()> {
        let removed = self.index.delete_by_file(rel)?;
        let known = self.manifest.remove(rel);
        if removed > 0 || known {
            log::info!("Removed {rel} ({removed} chunks)");
            report.files_removed += 1;
        }
        Ok(())
    }

    /// Drop manifest entries and chunks of files that no longer exist on disk or that the
    /// scan no longer includes (excluded, oversized)
    fn prune_stale(
        &mut self,
        included: &BTreeSet<String>,
        report: &mut IndexReport,
    ) -> Result<()> {
        let tracked: BTreeSet<String> = self
            .manifest
            .iter()
            .map(|(path, _)| path.to_string())
            .chain(self.index.list_files())
            .collect();
        for rel in tracked {
            if !included.contains(&rel) {
                self.remove_file(&rel, report)?;
            }
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        self.index.flush()?;
        save_manifest(&self.manifest);
        Ok(())
    }

    /// Ranked chunks for a free-text query, optionally restricted to one file and/or type
    pub fn get_relevant_context(
        &self,
        query: &str,
        k: usize,
        file_filter: Option<&Path>,
        chunk_type_filter: Option<ChunkType>,
    ) -> Result<Vec<SearchResult>> {
        let mut filter = SearchFilter::new();
        if let Some(path) = file_filter {
            filter = filter.file_path(self.relative_path(path)?);
        }
        if let Some(chunk_type) = chunk_type_filter {
            filter = filter.chunk_type(chunk_type);
        }
        let vector = self.embedder.embed(query)?;
        Ok(self.index.search(&vector, k, &filter)?)
    }

    /// Function chunks of `file_path` related to `function_name`, with the function's own
    /// chunk(s) first regardless of similarity rank.
    pub fn get_function_context(
        &self,
        file_path: &Path,
        function_name: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let query = format!("{FUNCTION_QUERY_PREFIX} {function_name}");
        let candidates = self.get_relevant_context(
            &query,
            k.saturating_mul(2),
            Some(file_path),
            Some(ChunkType::Function),
        )?;

        let (exact, others): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|hit| hit.chunk.name() == Some(function_name));
        Ok(exact.into_iter().chain(others).take(k).collect())
    }

    /// Every stored chunk of one file, in extraction order
    pub fn get_file_context(&self, file_path: &Path) -> Result<Vec<CodeChunk>> {
        let rel = self.relative_path(file_path)?;
        Ok(self.index.get_by_file(&rel)?)
    }

    /// Unfiltered text search, embedded by the index
    pub fn search_by_text(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        Ok(self.index.search(query, k, &SearchFilter::new())?)
    }

    /// Function chunks likely to call or be called by `function_name`
    pub fn get_related_functions(
        &self,
        function_name: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let query = format!("{FUNCTION_QUERY_PREFIX} calls {function_name} dependencies");
        self.get_relevant_context(&query, k, None, Some(ChunkType::Function))
    }

    /// Chunks that look like existing tests, for use as style examples
    pub fn get_test_patterns(&self, limit: usize) -> Result<Vec<SearchResult>> {
        let candidates = self.get_relevant_context(
            TEST_PATTERN_QUERY,
            TEST_PATTERN_CANDIDATES.max(limit),
            None,
            None,
        )?;
        Ok(candidates
            .into_iter()
            .filter(|hit| {
                TEST_PATTERN_MARKERS
                    .iter()
                    .any(|marker| hit.chunk.content.contains(marker))
            })
            .take(limit)
            .collect())
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            project_path: self.root.clone(),
            persist_directory: self.persist_dir.clone(),
            indexed_files: self.manifest.len(),
            model_id: self.embedder.model_id().to_string(),
            dimension: self.embedder.dimension(),
            index: self.index.stats(),
        }
    }

    #[must_use]
    pub fn list_files(&self) -> Vec<String> {
        self.index.list_files()
    }

    #[must_use]
    pub fn count_chunks(&self) -> usize {
        self.index.count_chunks()
    }

    /// Project-relative `/`-separated form of `path` (absolute or relative to the root)
    pub fn relative_path(&self, path: &Path) -> Result<String> {
        let rel = if path.is_absolute() {
            self.strip_root(path).ok_or_else(|| {
                IndexerError::InvalidPath(format!(
                    "{} is outside {}",
                    path.display(),
                    self.root.display()
                ))
            })?
        } else {
            path.to_path_buf()
        };

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        IndexerError::InvalidPath(format!("{} is not valid UTF-8", path.display()))
                    })?;
                    parts.push(name.to_string());
                }
                Component::CurDir => {}
                _ => {
                    return Err(IndexerError::InvalidPath(format!(
                        "{} escapes the project root",
                        path.display()
                    )))
                }
            }
        }
        if parts.is_empty() {
            return Err(IndexerError::InvalidPath(format!(
                "{} does not name a file",
                path.display()
            )));
        }
        Ok(parts.join("/"))
    }

    fn strip_root(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(canonical) = path.canonicalize() {
            if let Ok(rel) = canonical.strip_prefix(&self.root) {
                return Some(rel.to_path_buf());
            }
        }
        if let Ok(rel) = path.strip_prefix(&self.root) {
            return Some(rel.to_path_buf());
        }
        // deleted files cannot be canonicalized, their parent directory may still be
        let parent = path.parent()?.canonicalize().ok()?;
        let rel = parent.strip_prefix(&self.root).ok()?;
        Some(rel.join(path.file_name()?))
    }
}

fn save_manifest(manifest: &HashManifest) {
    if let Err(e) = manifest.save() {
        log::warn!(
            "Failed to save hash manifest {}: {e}",
            manifest.path().display()
        );
    }
}

/// `None` when a component is not valid UTF-8
fn to_slash(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in rel.components() {
        if let Component::Normal(name) = component {
            parts.push(name.to_str()?);
        }
    }
    Some(parts.join("/"))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
