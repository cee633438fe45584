use std::{collections::BTreeMap, time::Duration};

use moka::sync::Cache;
use serde_json::Value;

use sieve_config::{Config, SearchCache};
use sieve_domain::SearchResult;

use crate::{Error, Result, search::SearchOptions};

const RESULT_KEY_SCHEMA_VERSION: i32 = 1;
const RERANK_KEY_SCHEMA_VERSION: i32 = 1;

pub(crate) fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Cache {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

/// Result cache key. The index generation rides along so any corpus or index
/// mutation naturally orphans every older entry, and the provider identities
/// keep results from different model versions apart.
pub(crate) fn build_result_cache_key(
	cfg: &Config,
	query: &str,
	filters: &BTreeMap<String, String>,
	top_k: usize,
	options: &SearchOptions,
	index_generation: u64,
) -> Result<String> {
	let payload = serde_json::json!({
		"kind": "result",
		"schema_version": RESULT_KEY_SCHEMA_VERSION,
		"query": query.trim(),
		"filters": filters,
		"top_k": top_k,
		"enable_vector": options.enable_vector,
		"enable_rerank": options.enable_rerank,
		"enable_answer": options.enable_answer,
		"expansion_enabled": cfg.search.expansion.enabled,
		"expansion_version": cfg.search.expansion.version,
		"embedding": format!("{}:{}", cfg.providers.embedding.provider_id, cfg.providers.embedding.model),
		"rerank": format!("{}:{}", cfg.providers.rerank.provider_id, cfg.providers.rerank.model),
		"generation_model": format!("{}:{}", cfg.providers.generation.provider_id, cfg.providers.generation.model),
		"index_generation": index_generation,
	});

	hash_cache_key(&payload)
}

pub(crate) fn build_rerank_cache_key(
	cfg: &Config,
	query: &str,
	candidate_id: &str,
) -> Result<String> {
	let payload = serde_json::json!({
		"kind": "rerank",
		"schema_version": RERANK_KEY_SCHEMA_VERSION,
		"query": query.trim(),
		"candidate_id": candidate_id,
		"provider_id": cfg.providers.rerank.provider_id,
		"model": cfg.providers.rerank.model,
	});

	hash_cache_key(&payload)
}

/// TTL cache over fully assembled results. Disabled caching is modeled as a
/// cache that is simply never there, so call sites stay branch-free.
pub(crate) struct ResultCache {
	inner: Option<Cache<String, SearchResult>>,
}

impl ResultCache {
	pub(crate) fn new(cfg: &SearchCache) -> Self {
		let inner = cfg.enabled.then(|| {
			Cache::builder()
				.max_capacity(cfg.result_capacity)
				.time_to_live(Duration::from_secs(cfg.result_ttl_secs))
				.build()
		});

		Self { inner }
	}

	pub(crate) fn get(&self, key: &str) -> Option<SearchResult> {
		self.inner.as_ref()?.get(key)
	}

	pub(crate) fn insert(&self, key: String, result: SearchResult) {
		if let Some(inner) = &self.inner {
			inner.insert(key, result);
		}
	}
}

pub(crate) struct RerankCache {
	inner: Option<Cache<String, f32>>,
}

impl RerankCache {
	pub(crate) fn new(cfg: &SearchCache) -> Self {
		let inner = cfg.enabled.then(|| {
			Cache::builder()
				.max_capacity(cfg.rerank_capacity)
				.time_to_live(Duration::from_secs(cfg.rerank_ttl_secs))
				.build()
		});

		Self { inner }
	}

	pub(crate) fn get(&self, key: &str) -> Option<f32> {
		self.inner.as_ref()?.get(key)
	}

	pub(crate) fn insert(&self, key: String, score: f32) {
		if let Some(inner) = &self.inner {
			inner.insert(key, score);
		}
	}
}
