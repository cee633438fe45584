use std::{collections::HashMap, fs, path::Path, sync::Arc, time::Duration};

use moka::future::Cache;
use tokio::sync::RwLock;

use sieve_config::EmbeddingProviderConfig;

use crate::{EmbeddingProvider, Error, Result};

const EMBEDDING_KEY_SCHEMA_VERSION: i32 = 1;

/// Embedding adapter with two cache layers over the provider. The in-memory
/// layer coalesces concurrent requests for the same key into at most one
/// provider call; the persistent store survives restarts and is keyed by
/// content hash, so entries live until the provider or model changes.
pub struct EmbeddingAdapter {
	cfg: EmbeddingProviderConfig,
	provider: Arc<dyn EmbeddingProvider>,
	memory: Cache<String, Vec<f32>>,
	store: RwLock<HashMap<String, Vec<f32>>>,
}

impl EmbeddingAdapter {
	pub fn new(
		cfg: EmbeddingProviderConfig,
		provider: Arc<dyn EmbeddingProvider>,
		capacity: u64,
	) -> Self {
		Self {
			cfg,
			provider,
			memory: Cache::new(capacity.max(1)),
			store: RwLock::new(HashMap::new()),
		}
	}

	/// Embeds one text. A provider outage surfaces as [`Error::Provider`] and
	/// the caller decides whether that degrades or aborts; a broken cache key
	/// only costs the caching, never the request.
	pub async fn embed(&self, text: &str, task: &str) -> Result<Vec<f32>> {
		let key = match self.cache_key(text, task) {
			Ok(key) => key,
			Err(err) => {
				tracing::warn!(error = %err, "Embedding cache key failed; bypassing cache.");

				return self.fetch(None, text).await;
			},
		};

		self.memory
			.try_get_with(key.clone(), self.fetch(Some(key.clone()), text))
			.await
			.map_err(|err: Arc<Error>| Error::Provider { message: err.to_string() })
	}

	/// Batch embedding with per-item outcomes. One failing item never takes
	/// the rest of the batch down with it.
	pub async fn embed_batch(&self, texts: &[String], task: &str) -> Vec<Result<Vec<f32>>> {
		let mut out = Vec::with_capacity(texts.len());

		for text in texts {
			out.push(self.embed(text, task).await);
		}

		out
	}

	async fn fetch(&self, key: Option<String>, text: &str) -> Result<Vec<f32>> {
		if let Some(key) = &key
			&& let Some(vector) = self.store.read().await.get(key).cloned()
		{
			return Ok(vector);
		}

		let texts = [text.to_string()];
		let call = self.provider.embed(&self.cfg, &texts);
		let vectors = tokio::time::timeout(Duration::from_millis(self.cfg.timeout_ms), call)
			.await
			.map_err(|_| Error::Provider {
				message: format!("Embedding timed out after {}ms.", self.cfg.timeout_ms),
			})??;
		let vector = vectors.into_iter().next().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vector.".to_string(),
		})?;

		if vector.len() != self.cfg.dimensions as usize {
			return Err(Error::Provider {
				message: format!(
					"Embedding has dimension {}, configured dimension is {}.",
					vector.len(),
					self.cfg.dimensions
				),
			});
		}

		if let Some(key) = key {
			self.store.write().await.insert(key, vector.clone());
		}

		Ok(vector)
	}

	/// The model and provider ride along in the key so vectors from different
	/// model versions can never be mixed silently.
	fn cache_key(&self, text: &str, task: &str) -> Result<String> {
		let payload = serde_json::json!({
			"kind": "embedding",
			"schema_version": EMBEDDING_KEY_SCHEMA_VERSION,
			"text": text,
			"task": task,
			"provider_id": self.cfg.provider_id,
			"model": self.cfg.model,
			"dimensions": self.cfg.dimensions,
		});

		crate::cache::hash_cache_key(&payload)
	}

	pub async fn save_store(&self, path: &Path) -> Result<()> {
		let store = self.store.read().await;
		let raw = serde_json::to_vec(&*store).map_err(|err| Error::Cache {
			message: format!("Failed to encode embedding store: {err}"),
		})?;

		fs::write(path, raw).map_err(|err| Error::Cache {
			message: format!("Failed to write embedding store at {path:?}: {err}"),
		})?;

		Ok(())
	}

	/// Loads the persistent store, returning how many entries it held. A
	/// missing file is an empty store, not an error.
	pub async fn load_store(&self, path: &Path) -> Result<usize> {
		if !path.exists() {
			return Ok(0);
		}

		let raw = fs::read(path).map_err(|err| Error::Cache {
			message: format!("Failed to read embedding store at {path:?}: {err}"),
		})?;
		let entries: HashMap<String, Vec<f32>> =
			serde_json::from_slice(&raw).map_err(|err| Error::Cache {
				message: format!("Failed to parse embedding store at {path:?}: {err}"),
			})?;
		let count = entries.len();

		*self.store.write().await = entries;

		tracing::info!(entries = count, "Loaded embedding store.");

		Ok(count)
	}
}
