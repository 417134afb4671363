use devagent_code_chunker::{ChunkType, CodeChunk};
use devagent_vector_store::{
    EmbeddingProvider, HashingEmbedder, SearchFilter, VectorIndex, VectorStoreError,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn embedded(embedder: &HashingEmbedder, file: &str, line: usize, text: &str) -> CodeChunk {
    CodeChunk::new(file, line, line + 1, text, ChunkType::Function)
        .with_meta("name", text.split_whitespace().nth(1).unwrap_or(text))
        .with_meta("parameters", json!(["a", "b"]))
        .with_meta("complexity", 1)
        .with_meta("score_hint", 0.75)
        .with_meta("extra", json!({"nested": [1, null, "x"]}))
        .with_embedding(embedder.embed(text).unwrap())
}

#[test]
fn records_survive_reopen_with_metadata_intact() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(HashingEmbedder::new(32).unwrap());
    let chunk = embedded(&embedder, "src/math.py", 3, "def add a b");

    {
        let mut index =
            VectorIndex::open(tmp.path(), Some(embedder.clone() as Arc<dyn EmbeddingProvider>))
                .unwrap();
        index.add(vec![chunk.clone()]).unwrap();
    }

    let index = VectorIndex::open(tmp.path(), None).unwrap();
    assert_eq!(index.model_id(), Some("hashing-v1-32"));
    assert_eq!(index.dimension(), Some(32));
    let restored = index.get_by_file("src/math.py").unwrap();
    assert_eq!(restored, vec![chunk]);
}

#[test]
fn delete_and_clear_are_persisted() {
    let tmp = TempDir::new().unwrap();
    let embedder = HashingEmbedder::new(16).unwrap();
    {
        let mut index = VectorIndex::open(tmp.path(), None).unwrap();
        index
            .add(vec![
                embedded(&embedder, "a.py", 1, "def alpha x"),
                embedded(&embedder, "b.py", 1, "def beta y"),
            ])
            .unwrap();
        index.delete_by_file("a.py").unwrap();
    }
    let mut index = VectorIndex::open(tmp.path(), None).unwrap();
    assert_eq!(index.list_files(), vec!["b.py"]);

    index.clear().unwrap();
    assert!(VectorIndex::open(tmp.path(), None).unwrap().is_empty());
}

#[test]
fn corrupt_index_is_fatal() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("index.json"), b"{ not json").unwrap();
    let err = VectorIndex::open(tmp.path(), None).err().unwrap();
    assert!(matches!(err, VectorStoreError::CorruptIndex { .. }), "{err}");
}

#[test]
fn unknown_schema_version_is_fatal() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("index.json"),
        br#"{"schema_version": 99, "records": []}"#,
    )
    .unwrap();
    let err = VectorIndex::open(tmp.path(), None).err().unwrap();
    assert!(err.to_string().contains("schema_version 99"), "{err}");
}

#[test]
fn model_identity_mismatch_is_detectable() {
    let tmp = TempDir::new().unwrap();
    let small: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(16).unwrap());
    let large: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(24).unwrap());
    {
        let mut index = VectorIndex::open(tmp.path(), Some(small.clone())).unwrap();
        let text = "def f x";
        index
            .add(vec![CodeChunk::new("f.py", 1, 1, text, ChunkType::File)
                .with_embedding(small.embed(text).unwrap())])
            .unwrap();
    }
    let mut index = VectorIndex::open(tmp.path(), Some(large.clone())).unwrap();
    assert!(index.is_compatible_with(small.as_ref()));
    assert!(!index.is_compatible_with(large.as_ref()));

    index.clear().unwrap();
    assert!(index.is_compatible_with(large.as_ref()));
    assert_eq!(index.dimension(), Some(24));
    assert!(index
        .search("def f", 3, &SearchFilter::new())
        .unwrap()
        .is_empty());
}
