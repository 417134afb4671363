use crate::config::IndexingConfig;
use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// Scanner options derived from `[indexing]`
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub exclude_patterns: Vec<String>,
    pub supported_extensions: Vec<String>,
    pub respect_gitignore: bool,
    pub max_file_size_bytes: u64,
}

impl From<&IndexingConfig> for ScanOptions {
    fn from(config: &IndexingConfig) -> Self {
        Self {
            exclude_patterns: config.exclude_patterns.clone(),
            supported_extensions: config.supported_extensions.clone(),
            respect_gitignore: config.respect_gitignore,
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }
}

/// Scanner for finding indexable source files in a project
pub struct FileScanner {
    root: PathBuf,
    excludes: GlobSet,
    extensions: Vec<String>,
    respect_gitignore: bool,
    max_file_size_bytes: u64,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, options: &ScanOptions) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &options.exclude_patterns {
            builder.add(Glob::new(pattern)?);
        }
        let extensions = options
            .supported_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            excludes: builder.build()?,
            extensions,
            respect_gitignore: options.respect_gitignore,
            max_file_size_bytes: options.max_file_size_bytes,
        })
    }

    /// Absolute paths of every included file, sorted
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let excludes = self.excludes.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .parents(self.respect_gitignore)
            .sort_by_file_name(|a, b| a.cmp(b));
        builder.filter_entry(move |entry| {
            entry
                .path()
                .strip_prefix(&root)
                .map_or(true, |rel| !matches_excludes(&excludes, rel))
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !self.has_supported_extension(path) {
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.max_file_size_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.max_file_size_bytes
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        log::info!("Found {} source files", files.len());
        files
    }

    /// Whether a project-relative path would be picked up by [`FileScanner::scan`]
    /// (size aside)
    #[must_use]
    pub fn accepts(&self, relative: &str) -> bool {
        let rel = Path::new(relative);
        self.has_supported_extension(rel) && !self.is_excluded(rel)
    }

    /// An exclude pattern matches the path, its file name, or any ancestor directory
    #[must_use]
    pub fn is_excluded(&self, relative: &Path) -> bool {
        let mut prefix = PathBuf::new();
        for component in relative.components() {
            if let Component::Normal(name) = component {
                prefix.push(name);
                if matches_excludes(&self.excludes, &prefix) {
                    return true;
                }
            }
        }
        false
    }

    #[must_use]
    pub const fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|candidate| candidate == &ext)
            })
    }
}

fn matches_excludes(excludes: &GlobSet, relative: &Path) -> bool {
    if excludes.is_match(relative) {
        return true;
    }
    relative
        .file_name()
        .is_some_and(|name| excludes.is_match(Path::new(name)))
}
