//! Shared text-to-vector step for ingestion and search.

use std::{sync::Arc, time::Duration};

use priorart_config::{Config, EmbeddingProviderConfig};
use priorart_domain::text;

use crate::{EmbeddingProvider, Error, Result};

const PROBE_TEXT: &str = "prior art embedder readiness probe";
const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct Embedder {
	provider: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
	max_chars: usize,
	retries: u32,
	backoff: Duration,
}
impl Embedder {
	pub fn new(provider: Arc<dyn EmbeddingProvider>, cfg: &Config) -> Self {
		Self {
			provider,
			cfg: cfg.providers.embedding.clone(),
			max_chars: cfg.ingest.max_embed_chars as usize,
			retries: cfg.ingest.embedding_retries,
			backoff: DEFAULT_BACKOFF,
		}
	}

	/// Initial delay between retries; doubles after every failed attempt.
	pub fn with_backoff(mut self, backoff: Duration) -> Self {
		self.backoff = backoff;

		self
	}

	/// One round trip with a fixed input. Callers treat failure as fatal.
	pub async fn probe(&self) -> Result<()> {
		let vectors = self.embed_batch(&[PROBE_TEXT.to_string()]).await?;

		tracing::info!(
			provider_id = %self.cfg.provider_id,
			model = %self.cfg.model,
			dimensions = vectors.first().map(Vec::len).unwrap_or(0),
			"Embedder probe succeeded."
		);

		Ok(())
	}

	pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		self.embed_batch(&[text.to_string()]).await?.pop().ok_or_else(|| Error::Embedding {
			message: "Embedding provider returned no vector.".to_string(),
		})
	}

	/// Embeds `texts` in a single provider call, retrying transient failures.
	pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(Vec::new());
		}

		let inputs: Vec<String> = texts
			.iter()
			.map(|text| text::truncate_chars(text, self.max_chars).to_string())
			.collect();
		let mut backoff = self.backoff;
		let mut attempt = 0_u32;

		loop {
			match self.provider.embed(&self.cfg, &inputs).await {
				Ok(vectors) => return self.finish(vectors, inputs.len()),
				Err(err) if attempt < self.retries => {
					attempt += 1;

					tracing::warn!(
						error = %err,
						attempt,
						max_retries = self.retries,
						"Embedding call failed. Retrying."
					);

					tokio::time::sleep(backoff).await;

					backoff = backoff.saturating_mul(2);
				},
				Err(err) => return Err(Error::Embedding { message: err.to_string() }),
			}
		}
	}

	fn finish(&self, vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
		if vectors.len() != expected {
			return Err(Error::Embedding {
				message: format!(
					"Embedding provider returned {} vectors for {expected} inputs.",
					vectors.len()
				),
			});
		}

		let dim = self.cfg.dimensions as usize;

		vectors
			.into_iter()
			.map(|vector| {
				if vector.len() != dim {
					return Err(Error::Embedding {
						message: format!(
							"Embedding dimension mismatch: expected {dim}, got {}.",
							vector.len()
						),
					});
				}

				Ok(l2_normalize(vector))
			})
			.collect()
	}
}

/// Zero vectors are returned unchanged.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > 0.0 && norm.is_finite() {
		for value in &mut vector {
			*value /= norm;
		}
	}

	vector
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_to_unit_length() {
		let vector = l2_normalize(vec![3.0, 4.0]);

		assert!((vector[0] - 0.6).abs() < 1e-6);
		assert!((vector[1] - 0.8).abs() < 1e-6);
		assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
	}
}
