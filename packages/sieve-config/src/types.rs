use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub index: Index,
	pub providers: Providers,
	pub search: Search,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Index {
	pub vector_dim: u32,
	/// Distance metric of the vector index. The snapshot artifact embeds the
	/// metric it was built with and loading fails fast on a mismatch.
	pub metric: String,
	#[serde(default)]
	pub lexical: Lexical,
	pub snapshot_path: Option<String>,
	pub embedding_cache_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Lexical {
	pub length_normalization: bool,
}
impl Default for Lexical {
	fn default() -> Self {
		Self { length_normalization: true }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub generation: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Search {
	/// How many candidates each retrieval leg fetches before fusion.
	pub candidate_k: u32,
	#[serde(default)]
	pub expansion: SearchExpansion,
	#[serde(default)]
	pub fusion: SearchFusion,
	#[serde(default)]
	pub rerank: SearchRerank,
	#[serde(default)]
	pub answer: SearchAnswer,
	#[serde(default)]
	pub cache: SearchCache,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchExpansion {
	pub enabled: bool,
	pub version: String,
}
impl Default for SearchExpansion {
	fn default() -> Self {
		Self { enabled: true, version: "v1".to_string() }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchFusion {
	pub lexical_weight: f32,
	pub vector_weight: f32,
	/// RRF damping constant; ~60 per the original RRF literature.
	pub damping: f32,
}
impl Default for SearchFusion {
	fn default() -> Self {
		Self { lexical_weight: 0.4, vector_weight: 0.6, damping: 60.0 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchRerank {
	/// Cap on how many fused candidates are sent to the rerank provider.
	pub top_n: u32,
}
impl Default for SearchRerank {
	fn default() -> Self {
		Self { top_n: 30 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchAnswer {
	pub max_candidates: u32,
	pub context_budget_chars: u32,
	pub target_chars: u32,
}
impl Default for SearchAnswer {
	fn default() -> Self {
		Self { max_candidates: 6, context_budget_chars: 12_000, target_chars: 800 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchCache {
	pub enabled: bool,
	pub result_ttl_secs: u64,
	pub rerank_ttl_secs: u64,
	pub result_capacity: u64,
	pub rerank_capacity: u64,
	pub embedding_capacity: u64,
}
impl Default for SearchCache {
	fn default() -> Self {
		Self {
			enabled: true,
			result_ttl_secs: 300,
			rerank_ttl_secs: 120,
			result_capacity: 4_096,
			rerank_capacity: 65_536,
			embedding_capacity: 65_536,
		}
	}
}
