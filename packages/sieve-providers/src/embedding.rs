use crate::{Error, Result};

#[derive(Debug, serde::Serialize)]
struct EmbeddingRequest<'a> {
	model: &'a str,
	input: &'a [String],
	dimensions: u32,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingItem {
	index: Option<usize>,
	embedding: Vec<f32>,
}

pub async fn embed(
	cfg: &sieve_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let request =
		EmbeddingRequest { model: &cfg.model, input: texts, dimensions: cfg.dimensions };
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&request)
		.send()
		.await?;
	let response = res.error_for_status()?.json::<EmbeddingResponse>().await?;

	order_embeddings(response, texts.len())
}

/// Providers may return items out of order; the `index` field is
/// authoritative when present, the wire position otherwise.
fn order_embeddings(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
	if response.data.len() != expected {
		return Err(Error::invalid_response(format!(
			"Embedding response returned {} vectors for {expected} inputs.",
			response.data.len()
		)));
	}

	let mut indexed: Vec<(usize, Vec<f32>)> = response
		.data
		.into_iter()
		.enumerate()
		.map(|(position, item)| (item.index.unwrap_or(position), item.embedding))
		.collect();

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, embedding)| embedding).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(json: serde_json::Value) -> EmbeddingResponse {
		serde_json::from_value(json).expect("deserialize failed")
	}

	#[test]
	fn orders_embeddings_by_index() {
		let parsed = order_embeddings(
			response(serde_json::json!({
				"data": [
					{ "index": 1, "embedding": [2.0, 3.0] },
					{ "index": 0, "embedding": [0.5, 1.5] }
				]
			})),
			2,
		)
		.expect("ordering failed");

		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn falls_back_to_wire_position_without_indexes() {
		let parsed = order_embeddings(
			response(serde_json::json!({
				"data": [
					{ "embedding": [0.5, 1.5] },
					{ "embedding": [2.0, 3.0] }
				]
			})),
			2,
		)
		.expect("ordering failed");

		assert_eq!(parsed[0], vec![0.5, 1.5]);
	}

	#[test]
	fn rejects_count_mismatch() {
		let res = response(serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		}));

		assert!(order_embeddings(res, 2).is_err());
	}
}
