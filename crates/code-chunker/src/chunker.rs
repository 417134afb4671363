use crate::analyzer::{analyzer_for_path, ClassSymbol, FunctionSymbol, SymbolAnalyzer};
use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::types::{ChunkType, CodeChunk};
use serde_json::json;
use std::path::Path;

/// Character span of one sliding window, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

/// Chunk extractor: structural chunks from an analyzer plus coarse text chunks
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker, rejecting configurations that cannot make forward progress
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Extract chunks using the analyzer registered for the file's extension, if any
    pub fn extract_file(&self, file_path: &str, content: &str) -> Vec<CodeChunk> {
        self.extract(file_path, content, analyzer_for_path(file_path))
    }

    /// Chunk a file read from disk; `file_path` is the identifier stored on the chunks
    pub fn chunk_file(&self, path: impl AsRef<Path>, file_path: &str) -> Result<Vec<CodeChunk>> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.extract_file(file_path, &content))
    }

    /// Extract semantic chunks (when an analyzer is given) followed by text chunks.
    ///
    /// Embeddings are left unset. Analyzer failures never abort the file: they are logged
    /// and the remaining chunk families are still produced.
    pub fn extract(
        &self,
        file_path: &str,
        content: &str,
        analyzer: Option<&dyn SymbolAnalyzer>,
    ) -> Vec<CodeChunk> {
        if content.trim().is_empty() {
            log::debug!("Skipping empty file {file_path}");
            return Vec::new();
        }

        let mut chunks = Vec::new();
        if self.config.semantic_chunks {
            if let Some(analyzer) = analyzer {
                chunks.extend(self.semantic_chunks(file_path, content, analyzer));
            }
        }
        chunks.extend(self.text_chunks(file_path, content));
        chunks
    }

    /// One chunk per top-level function and per class
    pub fn semantic_chunks(
        &self,
        file_path: &str,
        content: &str,
        analyzer: &dyn SymbolAnalyzer,
    ) -> Vec<CodeChunk> {
        let lines: Vec<&str> = content.split('\n').collect();
        let language = analyzer.language().name();
        let mut chunks = Vec::new();

        let symbols = analyzer.extract_symbols(content);
        match symbols.functions {
            Ok(functions) => {
                for function in functions {
                    match function_chunk(file_path, &lines, language, &function) {
                        Ok(Some(chunk)) => chunks.push(chunk),
                        Ok(None) => {}
                        Err(e) => log::warn!("Skipping function in {file_path}: {e}"),
                    }
                }
            }
            Err(e) => log::warn!("Failed to extract functions from {file_path}: {e}"),
        }

        match symbols.classes {
            Some(Ok(classes)) => {
                for class in classes {
                    match class_chunk(file_path, &lines, language, &class) {
                        Ok(Some(chunk)) => chunks.push(chunk),
                        Ok(None) => {}
                        Err(e) => log::warn!("Skipping class in {file_path}: {e}"),
                    }
                }
            }
            Some(Err(e)) => log::warn!("Failed to extract classes from {file_path}: {e}"),
            None => {}
        }

        chunks
    }

    /// A single `file` chunk for small content, otherwise overlapping `text` windows
    pub fn text_chunks(&self, file_path: &str, content: &str) -> Vec<CodeChunk> {
        let char_len = content.chars().count();
        if char_len <= self.config.chunk_size {
            let total_lines = content.lines().count().max(1);
            return vec![
                CodeChunk::new(file_path, 1, total_lines, content, ChunkType::File)
                    .with_meta("total_lines", total_lines),
            ];
        }

        // byte offset of every char boundary, plus the end of the content
        let boundaries: Vec<usize> = content
            .char_indices()
            .map(|(idx, _)| idx)
            .chain(std::iter::once(content.len()))
            .collect();
        let newlines: Vec<usize> = content
            .chars()
            .enumerate()
            .filter_map(|(idx, ch)| (ch == '\n').then_some(idx))
            .collect();
        // 1-indexed line holding the character at `char_pos`
        let line_at = |char_pos: usize| newlines.partition_point(|&nl| nl < char_pos) + 1;

        self.windows(char_len)
            .into_iter()
            .enumerate()
            .map(|(chunk_number, window)| {
                let text = &content[boundaries[window.start]..boundaries[window.end]];
                CodeChunk::new(
                    file_path,
                    line_at(window.start),
                    line_at(window.end - 1),
                    text,
                    ChunkType::Text,
                )
                .with_meta("chunk_number", chunk_number)
                .with_meta("total_chars", window.end - window.start)
            })
            .collect()
    }

    /// Window layout over `len` characters.
    ///
    /// Windows are at most `chunk_size` long, consecutive windows share exactly `overlap`
    /// characters, and the last window ends at `len`.
    #[must_use]
    pub fn windows(&self, len: usize) -> Vec<Window> {
        let size = self.config.chunk_size;
        let stride = self.config.stride();
        let mut windows = Vec::new();
        if len == 0 || size == 0 || stride == 0 {
            return windows;
        }

        let mut start = 0;
        loop {
            let end = (start + size).min(len);
            windows.push(Window { start, end });
            if end == len {
                break;
            }
            start = end - self.config.overlap;
        }
        windows
    }
}

fn symbol_text(
    lines: &[&str],
    name: &str,
    start_line: usize,
    end_line: usize,
) -> Result<(usize, String)> {
    let total = lines.len();
    if start_line == 0 || start_line > total || end_line < start_line {
        return Err(ChunkerError::InvalidSymbol {
            name: name.to_string(),
            start: start_line,
            end: end_line,
            total,
        });
    }
    let end_line = end_line.min(total);
    Ok((end_line, lines[start_line - 1..end_line].join("\n")))
}

fn function_chunk(
    file_path: &str,
    lines: &[&str],
    language: &str,
    function: &FunctionSymbol,
) -> Result<Option<CodeChunk>> {
    let (end_line, text) =
        symbol_text(lines, &function.name, function.start_line, function.end_line)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(
        CodeChunk::new(file_path, function.start_line, end_line, text, ChunkType::Function)
            .with_meta("name", function.name.as_str())
            .with_meta("parameters", json!(function.parameters))
            .with_meta("complexity", function.complexity)
            .with_meta("language", language),
    ))
}

fn class_chunk(
    file_path: &str,
    lines: &[&str],
    language: &str,
    class: &ClassSymbol,
) -> Result<Option<CodeChunk>> {
    let (end_line, text) = symbol_text(lines, &class.name, class.start_line, class.end_line)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(
        CodeChunk::new(file_path, class.start_line, end_line, text, ChunkType::Class)
            .with_meta("name", class.name.as_str())
            .with_meta("methods", json!(class.methods))
            .with_meta("language", language),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FileSymbols;
    use crate::language::Language;
    use pretty_assertions::assert_eq;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig::new(size, overlap)).unwrap()
    }

    #[test]
    fn chunk_file_reads_from_disk() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/src/config.rs");
        let chunks = chunker(1000, 100).chunk_file(path, "src/config.rs").unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.file_path == "src/config.rs"));

        let missing = chunker(1000, 100).chunk_file("/nonexistent/devagent/x.py", "x.py");
        assert!(matches!(missing, Err(ChunkerError::IoError(_))));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        assert!(Chunker::new(ChunkerConfig::new(10, 10)).is_err());
        assert!(Chunker::new(ChunkerConfig::new(0, 0)).is_err());
    }

    #[test]
    fn windows_cover_content_with_exact_overlap() {
        for (len, size, overlap) in [(0, 5, 0), (1, 5, 4), (10, 4, 1), (23, 7, 3), (100, 10, 9), (9, 3, 0)] {
            let windows = chunker(size, overlap).windows(len);
            if len == 0 {
                assert!(windows.is_empty());
                continue;
            }
            assert_eq!(windows.first().map(|w| w.start), Some(0));
            assert_eq!(windows.last().map(|w| w.end), Some(len));
            for w in &windows {
                assert!(w.end > w.start && w.end - w.start <= size);
            }
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end - pair[1].start, overlap, "len={len} size={size}");
            }
        }
    }

    #[test]
    fn short_trailing_remainder_is_not_dropped() {
        // 1000 chars, size 600, overlap 100: second window must reach the end
        let windows = chunker(600, 100).windows(1000);
        assert_eq!(
            windows,
            vec![Window { start: 0, end: 600 }, Window { start: 500, end: 1000 }]
        );
    }

    #[test]
    fn small_file_is_one_file_chunk() {
        let content = "a = 1\nb = 2\n";
        let chunks = chunker(1000, 100).text_chunks("small.py", content);
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.chunk_type, ChunkType::File);
        assert_eq!((chunk.start_line, chunk.end_line), (1, 2));
        assert_eq!(chunk.content, content);
        assert_eq!(chunk.metadata["total_lines"], json!(2));
    }

    #[test]
    fn large_file_is_windowed_with_line_numbers() {
        let content: String = (1..=30).map(|i| format!("line {i:02}\n")).collect();
        // each line is 8 chars; 240 chars total
        let chunks = chunker(80, 16).text_chunks("big.txt", &content);
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::Text));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].metadata["chunk_number"], json!(0));
        assert_eq!(chunks[1].start_line, 9, "second window starts at char 64 = line 9");
        let last = chunks.last().unwrap();
        assert!(last.content.ends_with("line 30\n"));
        assert_eq!(last.end_line, 30);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata["chunk_number"], json!(i));
            assert!(chunk.end_line >= chunk.start_line);
        }
    }

    #[test]
    fn windows_respect_multibyte_characters() {
        let content = "αβγδεζηθικλμνξοπρστυφχψω".repeat(3);
        let chunks = chunker(20, 5).text_chunks("greek.txt", &content);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 20);
        }
    }

    #[test]
    fn python_file_yields_semantic_and_text_chunks() {
        let code = "def add(a, b):\n    return a + b\n\n\nclass Calc:\n    def mul(self, a, b):\n        return a * b\n";
        let chunks = chunker(1000, 100).extract_file("calc.py", code);
        let kinds: Vec<_> = chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(kinds, vec![ChunkType::Function, ChunkType::Class, ChunkType::File]);

        let add = &chunks[0];
        assert_eq!(add.name(), Some("add"));
        assert_eq!((add.start_line, add.end_line), (1, 2));
        assert_eq!(add.content, "def add(a, b):\n    return a + b");
        assert_eq!(add.metadata["parameters"], json!(["a", "b"]));
        assert_eq!(add.metadata["language"], json!("python"));

        let class = &chunks[1];
        assert_eq!(class.name(), Some("Calc"));
        assert_eq!((class.start_line, class.end_line), (5, 7));
        assert_eq!(class.metadata["methods"], json!(["mul"]));
        assert!(chunks.iter().all(|c| c.embedding.is_none()));
    }

    #[test]
    fn unknown_extension_only_gets_text_chunks() {
        let chunks = chunker(1000, 100).extract_file("notes.go", "package main\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::File);
    }

    #[test]
    fn empty_content_yields_nothing() {
        assert!(chunker(1000, 100).extract_file("empty.py", "  \n").is_empty());
    }

    struct BrokenAnalyzer;

    impl SymbolAnalyzer for BrokenAnalyzer {
        fn language(&self) -> Language {
            Language::Python
        }

        fn extract_functions(&self, _content: &str) -> Result<Vec<FunctionSymbol>> {
            Ok(vec![
                FunctionSymbol {
                    name: "ghost".into(),
                    start_line: 40,
                    end_line: 45,
                    parameters: vec![],
                    complexity: 1,
                },
                FunctionSymbol {
                    name: "real".into(),
                    start_line: 1,
                    end_line: 1,
                    parameters: vec![],
                    complexity: 1,
                },
            ])
        }

        fn extract_classes(&self, _content: &str) -> Option<Result<Vec<ClassSymbol>>> {
            Some(Err(ChunkerError::parse("boom")))
        }
    }

    /// Only answers the combined call
    struct SinglePassAnalyzer;

    impl SymbolAnalyzer for SinglePassAnalyzer {
        fn language(&self) -> Language {
            Language::Python
        }

        fn extract_functions(&self, _content: &str) -> Result<Vec<FunctionSymbol>> {
            unreachable!("chunker must use extract_symbols")
        }

        fn extract_classes(&self, _content: &str) -> Option<Result<Vec<ClassSymbol>>> {
            unreachable!("chunker must use extract_symbols")
        }

        fn extract_symbols(&self, _content: &str) -> FileSymbols {
            FileSymbols {
                functions: Ok(vec![FunctionSymbol {
                    name: "f".into(),
                    start_line: 1,
                    end_line: 1,
                    parameters: vec![],
                    complexity: 1,
                }]),
                classes: Some(Ok(vec![])),
            }
        }
    }

    #[test]
    fn symbols_come_from_one_analysis() {
        let chunks =
            chunker(1000, 100).extract("x.py", "def f(): pass\n", Some(&SinglePassAnalyzer));
        assert_eq!(chunks[0].name(), Some("f"));
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn bad_symbols_do_not_abort_the_file() {
        let chunks = chunker(1000, 100).extract("x.py", "def real(): pass\n", Some(&BrokenAnalyzer));
        let kinds: Vec<_> = chunks.iter().map(|c| (c.chunk_type, c.name())).collect();
        assert_eq!(
            kinds,
            vec![(ChunkType::Function, Some("real")), (ChunkType::File, None)]
        );
    }
}
