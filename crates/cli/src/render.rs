use anyhow::Result;
use devagent_indexer::{EngineStats, IndexReport};
use devagent_vector_store::{CodeChunk, SearchResult};
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn report(report: &IndexReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    eprintln!(
        "Indexed {} files, {} chunks in {}ms",
        report.files_indexed, report.chunks_indexed, report.elapsed_ms
    );
    if report.files_removed > 0 {
        eprintln!("Removed {} deleted files", report.files_removed);
    }
    if report.chunks_dropped > 0 {
        eprintln!("Dropped {} chunks that failed to embed", report.chunks_dropped);
    }
    for skipped in &report.skipped {
        eprintln!("Skipped {}: {}", skipped.path, skipped.reason);
    }
    Ok(())
}

/// Stored vectors are internal; never print them
fn strip_embedding(mut chunk: CodeChunk) -> CodeChunk {
    chunk.embedding = None;
    chunk
}

pub fn hits(hits: Vec<SearchResult>, json: bool) -> Result<()> {
    let hits: Vec<SearchResult> = hits
        .into_iter()
        .map(|hit| SearchResult {
            chunk: strip_embedding(hit.chunk),
            ..hit
        })
        .collect();
    if json {
        return print_json(&hits);
    }
    if hits.is_empty() {
        eprintln!("No results");
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "# {} {} lines {}-{} (score: {:.3}){}",
            i + 1,
            hit.chunk.file_path,
            hit.chunk.start_line,
            hit.chunk.end_line,
            hit.score,
            label(&hit.chunk)
        );
        println!("{}", hit.chunk.content);
        println!();
    }
    Ok(())
}

pub fn chunks(chunks: Vec<CodeChunk>, json: bool) -> Result<()> {
    let chunks: Vec<CodeChunk> = chunks.into_iter().map(strip_embedding).collect();
    if json {
        return print_json(&chunks);
    }
    for chunk in &chunks {
        println!(
            "# {} lines {}-{}{}",
            chunk.file_path,
            chunk.start_line,
            chunk.end_line,
            label(chunk)
        );
        println!("{}", chunk.content);
        println!();
    }
    Ok(())
}

pub fn files(files: &[String], json: bool) -> Result<()> {
    if json {
        return print_json(files);
    }
    for file in files {
        println!("{file}");
    }
    Ok(())
}

pub fn stats(stats: &EngineStats, json: bool) -> Result<()> {
    if json {
        return print_json(stats);
    }
    println!("Project:   {}", stats.project_path.display());
    println!("Index:     {}", stats.persist_directory.display());
    println!("Model:     {} ({} dims)", stats.model_id, stats.dimension);
    println!("Files:     {}", stats.indexed_files);
    println!("Chunks:    {}", stats.index.total_chunks);
    for (chunk_type, count) in &stats.index.chunk_type_counts {
        println!("  {chunk_type}: {count}");
    }
    Ok(())
}

fn label(chunk: &CodeChunk) -> String {
    match chunk.name() {
        Some(name) => format!(" [{} {}]", chunk.chunk_type, name),
        None => format!(" [{}]", chunk.chunk_type),
    }
}
