pub mod answer;
pub mod cache;
pub mod embed;
pub mod fusion;
pub mod rerank;
pub mod search;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use sieve_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use sieve_domain::Corpus;
use sieve_index::IndexManager;
use sieve_providers::{embedding, generate, rerank as rerank_http};

pub use embed::EmbeddingAdapter;
pub use search::{SearchOptions, SearchRequest};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<f32>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, sieve_providers::Result<Value>>;
}

/// Pipeline failure taxonomy. Only `Validation` and `Retrieval` abort a
/// request; `Provider` degrades the owning stage, `NotFound` skips the
/// candidate, and `Cache` downgrades to an always-miss.
#[derive(Debug)]
pub enum Error {
	Validation { message: String },
	Configuration { message: String },
	Provider { message: String },
	NotFound { id: String },
	Cache { message: String },
	Retrieval { message: String },
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Validation { message } => write!(f, "Invalid request: {message}"),
			Self::Configuration { message } => write!(f, "Configuration error: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::NotFound { id } => write!(f, "Record {id:?} not found."),
			Self::Cache { message } => write!(f, "Cache error: {message}"),
			Self::Retrieval { message } => write!(f, "Retrieval failed: {message}"),
		}
	}
}

impl std::error::Error for Error {}

impl From<sieve_providers::Error> for Error {
	fn from(err: sieve_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<sieve_index::Error> for Error {
	fn from(err: sieve_index::Error) -> Self {
		Self::Configuration { message: err.to_string() }
	}
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub generation: Arc<dyn GenerationProvider>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<f32>>> {
		Box::pin(rerank_http::rerank(cfg, query, docs))
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, sieve_providers::Result<Value>> {
		Box::pin(generate::generate_json(cfg, messages))
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		generation: Arc<dyn GenerationProvider>,
	) -> Self {
		Self { embedding, rerank, generation }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider.clone(), generation: provider }
	}
}

pub struct SearchPipeline {
	pub cfg: Config,
	pub indexes: Arc<IndexManager>,
	pub corpus: Arc<dyn Corpus>,
	pub providers: Providers,
	pub(crate) embedder: EmbeddingAdapter,
	pub(crate) result_cache: cache::ResultCache,
	pub(crate) rerank_cache: cache::RerankCache,
}

impl SearchPipeline {
	pub fn new(cfg: Config, corpus: Arc<dyn Corpus>) -> Self {
		Self::with_providers(cfg, corpus, Providers::default())
	}

	pub fn with_providers(cfg: Config, corpus: Arc<dyn Corpus>, providers: Providers) -> Self {
		let indexes = Arc::new(IndexManager::new(
			cfg.index.vector_dim as usize,
			&cfg.index.metric,
			cfg.index.lexical.length_normalization,
		));
		let embedder = EmbeddingAdapter::new(
			cfg.providers.embedding.clone(),
			providers.embedding.clone(),
			cfg.search.cache.embedding_capacity,
		);
		let result_cache = cache::ResultCache::new(&cfg.search.cache);
		let rerank_cache = cache::RerankCache::new(&cfg.search.cache);

		Self { cfg, indexes, corpus, providers, embedder, result_cache, rerank_cache }
	}

	/// Indexes every corpus record into both retrieval legs. Records carrying
	/// a precomputed embedding skip the provider; embedding failures skip the
	/// vector leg for that record only.
	pub async fn build_index(&self) -> Result<()> {
		let ids = self.corpus.list_all_ids();
		let mut indexed = 0usize;
		let mut skipped_vectors = 0usize;

		for id in ids {
			let Some(record) = self.corpus.get_record(&id) else {
				tracing::warn!(%id, "Corpus listed an id it cannot resolve.");

				continue;
			};
			let text = record.searchable_text();

			self.indexes.index_record(&id, &text);

			indexed += 1;

			let vector = match record.embedding {
				Some(vector) => vector,
				None => match self.embedder.embed(&text, "document").await {
					Ok(vector) => vector,
					Err(err) => {
						tracing::warn!(%id, error = %err, "Embedding failed; record stays lexical-only.");

						skipped_vectors += 1;

						continue;
					},
				},
			};

			if let Err(err) = self.indexes.upsert_vector(&id, vector) {
				tracing::warn!(%id, error = %err, "Rejected vector; record stays lexical-only.");

				skipped_vectors += 1;
			}
		}

		tracing::info!(indexed, skipped_vectors, "Index build finished.");

		Ok(())
	}

	pub fn save_snapshot(&self, path: &std::path::Path) -> Result<()> {
		Ok(self.indexes.save_snapshot(path)?)
	}

	pub fn load_snapshot(&self, path: &std::path::Path) -> Result<()> {
		Ok(self.indexes.load_snapshot(path)?)
	}

	pub async fn save_embedding_store(&self, path: &std::path::Path) -> Result<()> {
		self.embedder.save_store(path).await
	}

	pub async fn load_embedding_store(&self, path: &std::path::Path) -> Result<usize> {
		self.embedder.load_store(path).await
	}

	/// Loads whatever persisted artifacts the configuration points at. A
	/// missing file is an empty start; a snapshot that exists but disagrees
	/// with the configuration is fatal.
	pub async fn load_persisted(&self) -> Result<()> {
		if let Some(path) = &self.cfg.index.snapshot_path {
			let path = std::path::Path::new(path);

			if path.exists() {
				self.indexes.load_snapshot(path)?;
			}
		}
		if let Some(path) = &self.cfg.index.embedding_cache_path {
			self.embedder.load_store(std::path::Path::new(path)).await?;
		}

		Ok(())
	}

	pub async fn persist(&self) -> Result<()> {
		if let Some(path) = &self.cfg.index.snapshot_path {
			self.indexes.save_snapshot(std::path::Path::new(path))?;
		}
		if let Some(path) = &self.cfg.index.embedding_cache_path {
			self.embedder.save_store(std::path::Path::new(path)).await?;
		}

		Ok(())
	}
}
