use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Failures of chunk extraction and symbol analysis
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// The parser produced no tree at all
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No analyzer for language: {0}")]
    UnsupportedLanguage(String),

    /// Window size / overlap out of range
    #[error("Invalid chunker configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An analyzer reported a symbol whose lines fall outside the file
    #[error("Invalid symbol '{name}': lines {start}-{end} outside 1-{total}")]
    InvalidSymbol {
        name: String,
        start: usize,
        end: usize,
        total: usize,
    },

    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl ChunkerError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
