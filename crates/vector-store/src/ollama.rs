//! Embedding provider backed by a local Ollama server.

use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, VectorStoreError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama `/api/embeddings` client.
///
/// The API has no batch endpoint, so batches are embedded one text at a time. Each request
/// is retried up to `max_retries` times with exponential backoff.
pub struct OllamaEmbedder {
    endpoint: String,
    model: String,
    model_id: String,
    dimension: usize,
    max_retries: u32,
    client: Client,
}

impl OllamaEmbedder {
    /// # Arguments
    /// * `endpoint` - server base URL (e.g. `http://localhost:11434`)
    /// * `model` - embedding model name (e.g. `nomic-embed-text`)
    /// * `dimension` - vector length the model produces; responses are checked against it
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let model = model.into();
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model_id: format!("ollama:{model}"),
            model,
            dimension,
            max_retries,
            client,
        })
    }

    fn request(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.endpoint))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()?
            .error_for_status()?;
        let body: EmbeddingResponse = response.json()?;
        if body.embedding.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: body.embedding.len(),
            });
        }
        Ok(body.embedding)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 0;
        loop {
            match self.request(text) {
                Ok(vector) => return Ok(vector),
                // a wrong-sized vector will not fix itself on retry
                Err(err @ VectorStoreError::InvalidDimension { .. }) => return Err(err),
                Err(err) if attempt < self.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    log::warn!(
                        "Ollama embedding request failed (attempt {}/{}): {err}; retrying in {delay:?}",
                        attempt + 1,
                        self.max_retries + 1
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(VectorStoreError::embedding(format!(
                        "Ollama model '{}' at {} failed after {} attempts: {err}",
                        self.model,
                        self.endpoint,
                        attempt + 1
                    )))
                }
            }
        }
    }
}
