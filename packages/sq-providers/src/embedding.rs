use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use sq_config::{EmbeddingProviderConfig, EmbeddingSpace};

/// Embeds `texts` with the model behind `space`, one vector per input in input order.
pub async fn embed(
	cfg: &EmbeddingProviderConfig,
	space: &EmbeddingSpace,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": space.model,
		"input": texts,
		"dimensions": space.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json = crate::read_json(res, "Embedding").await?;
	let vectors = parse_embedding_response(json)?;

	check_shape(space, texts.len(), &vectors)?;

	Ok(vectors)
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data array."))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| eyre::eyre!("Embedding item missing embedding array."))?;
		let vec = embedding
			.iter()
			.map(|value| {
				value
					.as_f64()
					.map(|number| number as f32)
					.ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))
			})
			.collect::<Result<Vec<_>>>()?;

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn check_shape(space: &EmbeddingSpace, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
	if vectors.len() != expected {
		return Err(eyre::eyre!(
			"Embedding space {} returned {} vectors for {expected} inputs.",
			space.name,
			vectors.len()
		));
	}
	if let Some(vector) = vectors.iter().find(|vector| vector.len() != space.dimensions as usize) {
		return Err(eyre::eyre!(
			"Embedding space {} expects {} dimensions but received {}.",
			space.name,
			space.dimensions,
			vector.len()
		));
	}

	Ok(())
}
