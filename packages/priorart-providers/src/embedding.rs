use color_eyre::{Result, eyre};
use serde::Deserialize;

use crate::Endpoint;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// Embeds a batch in one request. The result has one vector per input, in input order.
pub async fn embed(
	cfg: &priorart_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let endpoint = Endpoint {
		api_base: &cfg.api_base,
		path: &cfg.path,
		api_key: &cfg.api_key,
		default_headers: &cfg.default_headers,
		timeout_ms: cfg.timeout_ms,
	};
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let response: EmbeddingResponse = endpoint.post(&body).await?;

	realign(response, texts.len())
}

/// Places each item at its reported `index`; items without one keep their position.
fn realign(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
	if response.data.len() != expected {
		return Err(eyre::eyre!(
			"Embedding provider returned {} vectors for {expected} inputs.",
			response.data.len()
		));
	}

	let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];

	for (position, item) in response.data.into_iter().enumerate() {
		let index = item.index.unwrap_or(position);
		let slot = slots
			.get_mut(index)
			.ok_or_else(|| eyre::eyre!("Embedding index {index} is out of range."))?;

		if slot.replace(item.embedding).is_some() {
			return Err(eyre::eyre!("Embedding index {index} appears twice."));
		}
	}

	// Every slot is filled: `expected` distinct in-range indices were placed.
	Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(json: serde_json::Value) -> EmbeddingResponse {
		serde_json::from_value(json).expect("decode failed")
	}

	#[test]
	fn realigns_by_reported_index() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});

		assert_eq!(
			realign(response(json), 2).expect("realign failed"),
			vec![vec![0.5, 1.5], vec![2.0, 3.0]]
		);
	}

	#[test]
	fn rejects_count_mismatch_and_duplicate_indices() {
		let short = serde_json::json!({ "data": [{ "index": 0, "embedding": [1.0] }] });
		let duplicated = serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [1.0] },
				{ "index": 0, "embedding": [2.0] }
			]
		});
		let out_of_range = serde_json::json!({ "data": [{ "index": 3, "embedding": [1.0] }] });

		assert!(realign(response(short), 2).is_err());
		assert!(realign(response(duplicated), 2).is_err());
		assert!(realign(response(out_of_range), 1).is_err());
	}

	#[test]
	fn non_numeric_values_fail_to_decode() {
		let json = serde_json::json!({ "data": [{ "embedding": ["x"] }] });

		assert!(serde_json::from_value::<EmbeddingResponse>(json).is_err());
	}
}
