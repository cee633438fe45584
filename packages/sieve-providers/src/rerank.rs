use crate::Result;

#[derive(Debug, serde::Serialize)]
struct RerankRequest<'a> {
	model: &'a str,
	query: &'a str,
	documents: &'a [String],
}

/// Cohere-style endpoints answer under `results` with `relevance_score`;
/// OpenAI-compatible ones under `data` with `score`. Both shapes are accepted.
#[derive(Debug, serde::Deserialize)]
struct RerankResponse {
	#[serde(alias = "data")]
	results: Vec<RerankItem>,
}

#[derive(Debug, serde::Deserialize)]
struct RerankItem {
	index: usize,
	#[serde(alias = "score")]
	relevance_score: f32,
}

pub async fn rerank(
	cfg: &sieve_config::ProviderConfig,
	query: &str,
	docs: &[String],
) -> Result<Vec<f32>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let request = RerankRequest { model: &cfg.model, query, documents: docs };
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&request)
		.send()
		.await?;
	let response = res.error_for_status()?.json::<RerankResponse>().await?;

	Ok(align_scores(response, docs.len()))
}

/// One score slot per document; items the provider omitted or indexed out of
/// range stay at 0.
fn align_scores(response: RerankResponse, doc_count: usize) -> Vec<f32> {
	let mut scores = vec![0.0f32; doc_count];

	for item in response.results {
		if item.index < scores.len() {
			scores[item.index] = item.relevance_score;
		}
	}

	scores
}
