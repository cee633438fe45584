mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Index, Lexical, LlmProviderConfig, ProviderConfig, Providers,
	Search, SearchAnswer, SearchCache, SearchExpansion, SearchFusion, SearchRerank, Service,
};

use std::{fs, path::Path};

pub const COSINE_METRIC: &str = "cosine";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation { message: "service.log_level must be non-empty.".to_string() });
	}
	if cfg.index.vector_dim == 0 {
		return Err(Error::Validation {
			message: "index.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.index.metric != COSINE_METRIC {
		return Err(Error::Validation {
			message: format!("index.metric must be {COSINE_METRIC:?}."),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.index.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match index.vector_dim.".to_string(),
		});
	}
	if cfg.search.candidate_k == 0 {
		return Err(Error::Validation {
			message: "search.candidate_k must be greater than zero.".to_string(),
		});
	}

	let fusion = &cfg.search.fusion;

	for (label, value) in [
		("search.fusion.lexical_weight", fusion.lexical_weight),
		("search.fusion.vector_weight", fusion.vector_weight),
		("search.fusion.damping", fusion.damping),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}
	if fusion.lexical_weight + fusion.vector_weight <= 0.0 {
		return Err(Error::Validation {
			message: "search.fusion weights must not both be zero.".to_string(),
		});
	}
	if fusion.damping <= 0.0 {
		return Err(Error::Validation {
			message: "search.fusion.damping must be greater than zero.".to_string(),
		});
	}

	if !(1..=100).contains(&cfg.search.rerank.top_n) {
		return Err(Error::Validation {
			message: "search.rerank.top_n must be in the range 1-100.".to_string(),
		});
	}
	if !(1..=10).contains(&cfg.search.answer.max_candidates) {
		return Err(Error::Validation {
			message: "search.answer.max_candidates must be in the range 1-10.".to_string(),
		});
	}
	if cfg.search.answer.context_budget_chars == 0 {
		return Err(Error::Validation {
			message: "search.answer.context_budget_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.search.answer.target_chars == 0 {
		return Err(Error::Validation {
			message: "search.answer.target_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.search.expansion.version.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.expansion.version must be non-empty.".to_string(),
		});
	}
	if cfg.search.cache.enabled {
		for (label, value) in [
			("search.cache.result_ttl_secs", cfg.search.cache.result_ttl_secs),
			("search.cache.rerank_ttl_secs", cfg.search.cache.rerank_ttl_secs),
			("search.cache.result_capacity", cfg.search.cache.result_capacity),
			("search.cache.rerank_capacity", cfg.search.cache.rerank_capacity),
			("search.cache.embedding_capacity", cfg.search.cache.embedding_capacity),
		] {
			if value == 0 {
				return Err(Error::Validation {
					message: format!("{label} must be greater than zero."),
				});
			}
		}
	}

	for (label, key, timeout) in [
		("embedding", &cfg.providers.embedding.api_key, cfg.providers.embedding.timeout_ms),
		("rerank", &cfg.providers.rerank.api_key, cfg.providers.rerank.timeout_ms),
		("generation", &cfg.providers.generation.api_key, cfg.providers.generation.timeout_ms),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
		if timeout == 0 {
			return Err(Error::Validation {
				message: format!("Provider {label} timeout_ms must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.index.snapshot_path.as_deref().map(|path| path.trim().is_empty()).unwrap_or(false) {
		cfg.index.snapshot_path = None;
	}
	if cfg
		.index
		.embedding_cache_path
		.as_deref()
		.map(|path| path.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.index.embedding_cache_path = None;
	}
}
