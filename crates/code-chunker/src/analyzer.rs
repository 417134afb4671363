use crate::ast_analyzer::TreeSitterAnalyzer;
use crate::error::Result;
use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A top-level function reported by an analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub name: String,
    /// 1-indexed, inclusive
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Rough cyclomatic complexity (1 + number of branch points)
    #[serde(default = "default_complexity")]
    pub complexity: u32,
}

/// A top-level class (or class-like item) reported by an analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSymbol {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub methods: Vec<String>,
}

const fn default_complexity() -> u32 {
    1
}

/// Both symbol lists of one file
#[derive(Debug)]
pub struct FileSymbols {
    pub functions: Result<Vec<FunctionSymbol>>,
    /// `None` when the analyzer does not report classes
    pub classes: Option<Result<Vec<ClassSymbol>>>,
}

/// Structural analysis capability for one language.
///
/// `extract_functions` is required. `extract_classes` is optional: analyzers that cannot
/// report classes keep the default, and no class chunks are produced for their files.
pub trait SymbolAnalyzer: Send + Sync {
    fn language(&self) -> Language;

    fn extract_functions(&self, content: &str) -> Result<Vec<FunctionSymbol>>;

    fn extract_classes(&self, _content: &str) -> Option<Result<Vec<ClassSymbol>>> {
        None
    }

    /// Functions and classes together. Analyzers that parse the file should override this
    /// to parse it once.
    fn extract_symbols(&self, content: &str) -> FileSymbols {
        FileSymbols {
            functions: self.extract_functions(content),
            classes: self.extract_classes(content),
        }
    }
}

static RUST_ANALYZER: TreeSitterAnalyzer = TreeSitterAnalyzer::new(Language::Rust);
static PYTHON_ANALYZER: TreeSitterAnalyzer = TreeSitterAnalyzer::new(Language::Python);
static JAVASCRIPT_ANALYZER: TreeSitterAnalyzer = TreeSitterAnalyzer::new(Language::JavaScript);
static TYPESCRIPT_ANALYZER: TreeSitterAnalyzer = TreeSitterAnalyzer::new(Language::TypeScript);
static TSX_ANALYZER: TreeSitterAnalyzer = TreeSitterAnalyzer::new(Language::Tsx);

/// Extensions that have a registered analyzer
pub const ANALYZER_EXTENSIONS: &[&str] = &[".py", ".js", ".jsx", ".ts", ".tsx", ".rs"];

/// Static analyzer registry keyed by language
#[must_use]
pub fn analyzer_for_language(language: Language) -> Option<&'static dyn SymbolAnalyzer> {
    match language {
        Language::Rust => Some(&RUST_ANALYZER),
        Language::Python => Some(&PYTHON_ANALYZER),
        Language::JavaScript => Some(&JAVASCRIPT_ANALYZER),
        Language::TypeScript => Some(&TYPESCRIPT_ANALYZER),
        Language::Tsx => Some(&TSX_ANALYZER),
        Language::Unknown => None,
    }
}

/// Static analyzer registry keyed by file extension
#[must_use]
pub fn analyzer_for_path(path: impl AsRef<Path>) -> Option<&'static dyn SymbolAnalyzer> {
    let path = path.as_ref();
    let ext = path.extension()?.to_str()?.to_lowercase();
    if !ANALYZER_EXTENSIONS.contains(&format!(".{ext}").as_str()) {
        return None;
    }
    analyzer_for_language(Language::from_path(path))
}
