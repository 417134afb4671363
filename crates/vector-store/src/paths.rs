use std::path::{Path, PathBuf};

/// Per-project state directory
pub const DEVAGENT_DIR_NAME: &str = ".devagent";
pub const INDEX_DIR_NAME: &str = "index";
pub const INDEX_FILE_NAME: &str = "index.json";
pub const MANIFEST_FILE_NAME: &str = "file_hashes.json";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[must_use]
pub fn devagent_dir_for_project_root(root: &Path) -> PathBuf {
    root.join(DEVAGENT_DIR_NAME)
}

/// Default `persist_directory`: `<project>/.devagent/index`
#[must_use]
pub fn default_persist_dir(root: &Path) -> PathBuf {
    devagent_dir_for_project_root(root).join(INDEX_DIR_NAME)
}

#[must_use]
pub fn index_path(persist_dir: &Path) -> PathBuf {
    persist_dir.join(INDEX_FILE_NAME)
}

#[must_use]
pub fn manifest_path(persist_dir: &Path) -> PathBuf {
    persist_dir.join(MANIFEST_FILE_NAME)
}

#[must_use]
pub fn config_path_for_project_root(root: &Path) -> PathBuf {
    devagent_dir_for_project_root(root).join(CONFIG_FILE_NAME)
}
