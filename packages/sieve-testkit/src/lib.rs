//! Shared fixtures for pipeline tests: an in-memory corpus, a ready-made
//! configuration, and deterministic pseudo-embeddings.

use std::{collections::BTreeMap, sync::RwLock};

use serde_json::Map;

use sieve_config::{
	Config, EmbeddingProviderConfig, Index, Lexical, LlmProviderConfig, ProviderConfig, Providers,
	Search, SearchAnswer, SearchCache, SearchExpansion, SearchFusion, SearchRerank, Service,
};
use sieve_domain::{Corpus, Record};

/// In-memory corpus for tests. Mutations go through `&self` so a corpus can
/// change underneath a pipeline that holds it, which is exactly what the
/// vanished-record paths need to exercise.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
	records: RwLock<BTreeMap<String, Record>>,
}

impl MemoryCorpus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
		let corpus = Self::new();

		for record in records {
			corpus.insert(record);
		}

		corpus
	}

	pub fn insert(&self, record: Record) {
		self.records
			.write()
			.expect("Corpus lock is poisoned.")
			.insert(record.id.clone(), record);
	}

	pub fn remove(&self, id: &str) -> bool {
		self.records.write().expect("Corpus lock is poisoned.").remove(id).is_some()
	}

	pub fn len(&self) -> usize {
		self.records.read().expect("Corpus lock is poisoned.").len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Corpus for MemoryCorpus {
	fn get_record(&self, id: &str) -> Option<Record> {
		self.records.read().expect("Corpus lock is poisoned.").get(id).cloned()
	}

	fn list_all_ids(&self) -> Vec<String> {
		self.records.read().expect("Corpus lock is poisoned.").keys().cloned().collect()
	}
}

/// A unit vector derived from the text alone. Same text, same vector, across
/// processes and runs.
pub fn hashed_unit_vector(text: &str, dimension: usize) -> Vec<f32> {
	let digest = blake3::hash(text.as_bytes());
	let bytes = digest.as_bytes();
	let mut vector: Vec<f32> =
		(0..dimension).map(|i| bytes[i % bytes.len()] as f32 + 1.0).collect();
	let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();

	for value in &mut vector {
		*value /= magnitude;
	}

	vector
}

/// Three-record fixture: one synonym-reachable target, one near-topic decoy,
/// one off-topic record.
pub fn sample_records(dimension: usize) -> Vec<Record> {
	vec![
		Record::new(
			"rec-001",
			"Expression profiling of breast carcinoma biopsies",
			"Tumor and adjacent normal tissue were profiled by transcriptome sequencing \
			 across 48 breast carcinoma patients.",
		)
		.with_metadata("organism", "human")
		.with_metadata("assay", "rna-seq")
		.with_embedding_text(dimension),
		Record::new(
			"rec-002",
			"Lung adenocarcinoma drug response panel",
			"Microarray expression measurements of lung adenocarcinoma cell lines under \
			 erlotinib treatment.",
		)
		.with_metadata("organism", "human")
		.with_metadata("assay", "microarray")
		.with_embedding_text(dimension),
		Record::new(
			"rec-003",
			"Murine cardiac development atlas",
			"Single-cell profiles of mouse heart tissue collected across embryonic stages.",
		)
		.with_metadata("organism", "mouse")
		.with_metadata("assay", "scrna-seq")
		.with_embedding_text(dimension),
	]
}

trait WithEmbeddingText {
	fn with_embedding_text(self, dimension: usize) -> Self;
}

impl WithEmbeddingText for Record {
	fn with_embedding_text(mut self, dimension: usize) -> Self {
		self.embedding = Some(hashed_unit_vector(&self.searchable_text(), dimension));

		self
	}
}

/// A full configuration with loopback provider endpoints. Tests that hit real
/// providers never exist; stub providers ignore the endpoint fields entirely.
pub fn test_config(vector_dim: u32) -> Config {
	Config {
		service: Service { log_level: "debug".to_string() },
		index: Index {
			vector_dim,
			metric: "cosine".to_string(),
			lexical: Lexical::default(),
			snapshot_path: None,
			embedding_cache_path: None,
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test-embedding".to_string(),
				api_base: "http://127.0.0.1:0".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "test-embedding-model".to_string(),
				dimensions: vector_dim,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "test-rerank".to_string(),
				api_base: "http://127.0.0.1:0".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/rerank".to_string(),
				model: "test-rerank-model".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			generation: LlmProviderConfig {
				provider_id: "test-generation".to_string(),
				api_base: "http://127.0.0.1:0".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "test-generation-model".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		search: Search {
			candidate_k: 50,
			expansion: SearchExpansion::default(),
			fusion: SearchFusion::default(),
			rerank: SearchRerank::default(),
			answer: SearchAnswer::default(),
			cache: SearchCache::default(),
		},
	}
}
