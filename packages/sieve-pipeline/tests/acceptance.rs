use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use serde_json::Value;

use sieve_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use sieve_domain::{Record, SearchStatus};
use sieve_pipeline::{
	BoxFuture, EmbeddingProvider, Error, GenerationProvider, Providers, RerankProvider,
	SearchPipeline, SearchRequest,
};
use sieve_testkit::{MemoryCorpus, hashed_unit_vector, sample_records, test_config};

const DIM: u32 = 8;

struct StubEmbedding;

impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<Vec<f32>>>> {
		let dimension = cfg.dimensions as usize;

		Box::pin(async move {
			Ok(texts.iter().map(|text| hashed_unit_vector(text, dimension)).collect())
		})
	}
}

struct SpyEmbedding {
	calls: Arc<AtomicUsize>,
}

impl EmbeddingProvider for SpyEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let dimension = cfg.dimensions as usize;

		Box::pin(async move {
			Ok(texts.iter().map(|text| hashed_unit_vector(text, dimension)).collect())
		})
	}
}

struct FailingEmbedding;

impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async { Err(sieve_providers::Error::invalid_response("embedding backend offline")) })
	}
}

/// Scores any document containing the marker at 0.95 and everything else at
/// 0.1, which makes rerank-driven reordering easy to provoke.
struct MarkerRerank {
	marker: &'static str,
}

impl RerankProvider for MarkerRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<f32>>> {
		let scores =
			docs.iter().map(|doc| if doc.contains(self.marker) { 0.95 } else { 0.1 }).collect();

		Box::pin(async move { Ok(scores) })
	}
}

/// Succeeds on the first call, scoring murine documents highest, then fails
/// every call after that.
struct FlakyRerank {
	calls: Arc<AtomicUsize>,
}

impl RerankProvider for FlakyRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<f32>>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);
		let scores: Vec<f32> =
			docs.iter().map(|doc| if doc.contains("Murine") { 0.95 } else { 0.2 }).collect();

		Box::pin(async move {
			if call == 0 {
				Ok(scores)
			} else {
				Err(sieve_providers::Error::invalid_response("rerank backend offline"))
			}
		})
	}
}

struct FailingRerank;

impl RerankProvider for FailingRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<f32>>> {
		Box::pin(async { Err(sieve_providers::Error::invalid_response("rerank backend offline")) })
	}
}

struct SlowRerank;

impl RerankProvider for SlowRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, sieve_providers::Result<Vec<f32>>> {
		let count = docs.len();

		Box::pin(async move {
			tokio::time::sleep(std::time::Duration::from_millis(250)).await;

			Ok(vec![0.5; count])
		})
	}
}

struct StubGeneration {
	payload: Value,
}

impl GenerationProvider for StubGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
	) -> BoxFuture<'a, sieve_providers::Result<Value>> {
		let payload = self.payload.clone();

		Box::pin(async move { Ok(payload) })
	}
}

struct FailingGeneration;

impl GenerationProvider for FailingGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
	) -> BoxFuture<'a, sieve_providers::Result<Value>> {
		Box::pin(async { Err(sieve_providers::Error::invalid_response("generation backend offline")) })
	}
}

fn stub_providers() -> Providers {
	Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(MarkerRerank { marker: "\u{0}never-matches" }),
		Arc::new(FailingGeneration),
	)
}

async fn built_pipeline(cfg: Config, providers: Providers) -> SearchPipeline {
	let corpus = Arc::new(MemoryCorpus::with_records(sample_records(DIM as usize)));
	let pipeline = SearchPipeline::with_providers(cfg, corpus, providers);

	pipeline.build_index().await.expect("index build failed");

	pipeline
}

fn ids(result: &sieve_domain::SearchResult) -> Vec<&str> {
	result.candidates.iter().map(|candidate| candidate.id.as_str()).collect()
}

#[tokio::test]
async fn expansion_surfaces_synonym_only_records() {
	let mut request = SearchRequest::new("breast cancer RNA-seq", 3);

	request.options.enable_vector = false;
	request.options.enable_rerank = false;

	let expanded = built_pipeline(test_config(DIM), stub_providers()).await;
	let expanded_result = expanded.search(request.clone()).await.unwrap();

	let mut plain_cfg = test_config(DIM);

	plain_cfg.search.expansion.enabled = false;

	let plain = built_pipeline(plain_cfg, stub_providers()).await;
	let plain_result = plain.search(request).await.unwrap();

	assert_eq!(ids(&expanded_result)[0], "rec-001");

	let expanded_score = expanded_result.candidates[0].lexical_score.unwrap();
	let plain_score = plain_result
		.candidates
		.iter()
		.find(|candidate| candidate.id == "rec-001")
		.and_then(|candidate| candidate.lexical_score)
		.unwrap_or(0.0);

	// Synonyms ("breast carcinoma", "transcriptome sequencing") only match
	// when expansion is on, so the lexical evidence must strictly grow.
	assert!(expanded_score > plain_score);
}

#[tokio::test]
async fn vector_outage_degrades_to_lexical_order() {
	let failing = Providers::new(
		Arc::new(FailingEmbedding),
		Arc::new(FailingRerank),
		Arc::new(FailingGeneration),
	);
	let corpus = Arc::new(MemoryCorpus::with_records(sample_records(DIM as usize)));
	let pipeline = SearchPipeline::with_providers(test_config(DIM), corpus, failing);

	pipeline.build_index().await.unwrap();

	let mut request = SearchRequest::new("breast carcinoma expression", 3);

	request.options.enable_rerank = false;

	let degraded = pipeline.search(request.clone()).await.unwrap();

	request.options.enable_vector = false;

	let lexical_only = pipeline.search(request).await.unwrap();

	assert_eq!(degraded.status, SearchStatus::Degraded);
	assert!(degraded.degraded_stages.contains(&"vector".to_string()));
	assert_eq!(ids(&degraded), ids(&lexical_only));
}

#[tokio::test]
async fn rerank_timeout_keeps_fusion_order() {
	let mut cfg = test_config(DIM);

	cfg.providers.rerank.timeout_ms = 50;

	let slow = Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(SlowRerank),
		Arc::new(FailingGeneration),
	);
	let pipeline = built_pipeline(cfg, slow).await;
	let request = SearchRequest::new("expression profiling", 3);
	let timed_out = pipeline.search(request.clone()).await.unwrap();

	let mut unranked_request = request;

	unranked_request.options.enable_rerank = false;

	let fusion_only = pipeline.search(unranked_request).await.unwrap();

	assert!(!timed_out.reranked);
	assert!(timed_out.degraded_stages.contains(&"rerank".to_string()));
	assert_eq!(ids(&timed_out), ids(&fusion_only));
}

#[tokio::test]
async fn rerank_outage_with_warm_cache_keeps_fusion_order() {
	let providers = Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(FlakyRerank { calls: Arc::new(AtomicUsize::new(0)) }),
		Arc::new(FailingGeneration),
	);
	let corpus = Arc::new(MemoryCorpus::with_records(sample_records(DIM as usize)));
	let pipeline = SearchPipeline::with_providers(test_config(DIM), corpus.clone(), providers);

	pipeline.build_index().await.unwrap();

	let request = SearchRequest::new("expression profiling", 4);
	let warm = pipeline.search(request.clone()).await.unwrap();

	assert!(warm.reranked);

	// A new record invalidates the result cache but not the per-candidate
	// rerank cache, so the next search mixes cache hits with a provider call
	// that now fails.
	let newcomer = Record::new(
		"rec-004",
		"Hepatic fibrosis progression markers",
		"Liver biopsies were profiled to track fibrosis progression markers over time.",
	);
	let text = newcomer.searchable_text();

	corpus.insert(newcomer);
	pipeline.indexes.index_record("rec-004", &text);
	pipeline.indexes.upsert_vector("rec-004", hashed_unit_vector(&text, DIM as usize)).unwrap();

	let degraded = pipeline.search(request.clone()).await.unwrap();

	let mut fusion_request = request;

	fusion_request.options.enable_rerank = false;

	let fusion_only = pipeline.search(fusion_request).await.unwrap();

	assert!(!degraded.cache_hit);
	assert!(!degraded.reranked);
	assert!(degraded.degraded_stages.contains(&"rerank".to_string()));
	assert!(degraded.candidates.iter().all(|candidate| candidate.rerank_score.is_none()));
	assert_eq!(ids(&degraded), ids(&fusion_only));
}

#[tokio::test]
async fn rerank_score_overrides_fusion_order() {
	let providers = Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(MarkerRerank { marker: "Murine cardiac" }),
		Arc::new(FailingGeneration),
	);
	let pipeline = built_pipeline(test_config(DIM), providers).await;
	let result = pipeline.search(SearchRequest::new("expression profiling", 3)).await.unwrap();

	assert!(result.reranked);
	assert_eq!(result.candidates[0].id, "rec-003");
	assert_eq!(result.candidates[0].rerank_score, Some(0.95));
}

#[tokio::test]
async fn zero_top_k_returns_empty_result() {
	let pipeline = built_pipeline(test_config(DIM), stub_providers()).await;
	let result = pipeline.search(SearchRequest::new("anything", 0)).await.unwrap();

	assert!(result.candidates.is_empty());
	assert_eq!(result.status, SearchStatus::Done);
	assert!(!result.cache_hit);
}

#[tokio::test]
async fn empty_query_is_rejected_before_any_work() {
	let pipeline = built_pipeline(test_config(DIM), stub_providers()).await;
	let err = pipeline.search(SearchRequest::new("   ", 3)).await.unwrap_err();

	assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn concurrent_identical_queries_coalesce_embedding_calls() {
	let calls = Arc::new(AtomicUsize::new(0));
	let providers = Providers::new(
		Arc::new(SpyEmbedding { calls: calls.clone() }),
		Arc::new(FailingRerank),
		Arc::new(FailingGeneration),
	);
	let pipeline = built_pipeline(test_config(DIM), providers).await;

	// Sample records carry precomputed embeddings, so the build above did not
	// touch the provider and the counter starts clean.
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	let mut request = SearchRequest::new("murine heart development", 3);

	request.options.enable_rerank = false;

	let (first, second) =
		tokio::join!(pipeline.search(request.clone()), pipeline.search(request));
	let first = first.unwrap();
	let second = second.unwrap();

	assert!(calls.load(Ordering::SeqCst) <= 1);
	assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn repeat_queries_hit_the_result_cache() {
	let pipeline = built_pipeline(test_config(DIM), stub_providers()).await;
	let mut request = SearchRequest::new("breast carcinoma", 3);

	request.options.enable_rerank = false;

	let first = pipeline.search(request.clone()).await.unwrap();
	let second = pipeline.search(request).await.unwrap();

	assert!(!first.cache_hit);
	assert!(second.cache_hit);
	assert_eq!(first.trace_id, second.trace_id);
	assert_eq!(first.candidates, second.candidates);
}

#[tokio::test]
async fn degraded_results_are_never_cached() {
	let providers = Providers::new(
		Arc::new(FailingEmbedding),
		Arc::new(FailingRerank),
		Arc::new(FailingGeneration),
	);
	let corpus = Arc::new(MemoryCorpus::with_records(sample_records(DIM as usize)));
	let pipeline = SearchPipeline::with_providers(test_config(DIM), corpus, providers);

	pipeline.build_index().await.unwrap();

	let mut request = SearchRequest::new("breast carcinoma", 3);

	request.options.enable_rerank = false;

	let first = pipeline.search(request.clone()).await.unwrap();
	let second = pipeline.search(request).await.unwrap();

	assert_eq!(first.status, SearchStatus::Degraded);
	assert!(!second.cache_hit);
}

#[tokio::test]
async fn index_mutation_invalidates_cached_results() {
	let pipeline = built_pipeline(test_config(DIM), stub_providers()).await;
	let mut request = SearchRequest::new("breast carcinoma", 3);

	request.options.enable_rerank = false;

	let first = pipeline.search(request.clone()).await.unwrap();

	assert!(!first.cache_hit);

	pipeline.indexes.remove("rec-002");

	let second = pipeline.search(request).await.unwrap();

	assert!(!second.cache_hit);
}

#[tokio::test]
async fn metadata_filters_restrict_candidates() {
	let pipeline = built_pipeline(test_config(DIM), stub_providers()).await;
	let mut request = SearchRequest::new("expression profiling", 3);

	request.options.enable_rerank = false;
	request.filters.insert("organism".to_string(), "human".to_string());

	let result = pipeline.search(request).await.unwrap();

	assert!(!result.candidates.is_empty());
	assert!(ids(&result).iter().all(|id| *id != "rec-003"));
}

#[tokio::test]
async fn identical_pipelines_return_identical_rankings() {
	let mut request = SearchRequest::new("human cancer transcriptome", 3);

	request.options.enable_rerank = false;

	let first_pipeline = built_pipeline(test_config(DIM), stub_providers()).await;
	let second_pipeline = built_pipeline(test_config(DIM), stub_providers()).await;
	let first = first_pipeline.search(request.clone()).await.unwrap();
	let second = second_pipeline.search(request).await.unwrap();

	assert_eq!(ids(&first), ids(&second));

	for (a, b) in first.candidates.iter().zip(&second.candidates) {
		assert_eq!(a.fused_score, b.fused_score);
	}
}

#[tokio::test]
async fn verified_citations_survive_and_fabrications_are_dropped() {
	let payload = serde_json::json!({
		"answer": "Breast carcinoma cohorts were profiled by transcriptome sequencing.",
		"citations": [
			{
				"candidate_id": "rec-001",
				"quoted_span": "profiled by transcriptome sequencing",
				"relevance": 0.9
			},
			{
				"candidate_id": "rec-001",
				"quoted_span": "this sentence appears nowhere in the record",
				"relevance": 0.8
			},
			{
				"candidate_id": "rec-999",
				"quoted_span": "profiled by transcriptome sequencing",
				"relevance": 0.7
			}
		],
		"confidence": 0.8
	});
	let providers = Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(MarkerRerank { marker: "breast carcinoma" }),
		Arc::new(StubGeneration { payload }),
	);
	let pipeline = built_pipeline(test_config(DIM), providers).await;
	let mut request = SearchRequest::new("breast carcinoma sequencing", 3);

	request.options.enable_answer = true;

	let result = pipeline.search(request).await.unwrap();
	let answer = result.answer.expect("answer requested");

	assert_eq!(answer.citations.len(), 1);
	assert_eq!(answer.citations[0].candidate_id, "rec-001");
	assert!(!answer.grounding_complete);
	assert!(!result.degraded_stages.contains(&"answer".to_string()));
}

#[tokio::test]
async fn oversized_record_is_truncated_into_the_answer_context() {
	// The body alone dwarfs the context budget; it must be cut to fit, not
	// dropped, or generation would see an empty context.
	let body = format!(
		"Longitudinal hepatic fibrosis cohorts were profiled at scale. {}",
		"Serial liver biopsies were sequenced across repeated visits. ".repeat(400)
	);
	let mut record = Record::new("rec-101", "Hepatic fibrosis cohort profiling", body);

	record.embedding = Some(hashed_unit_vector(&record.searchable_text(), DIM as usize));

	let payload = serde_json::json!({
		"answer": "Fibrosis cohorts were profiled with serial liver biopsies.",
		"citations": [
			{
				"candidate_id": "rec-101",
				"quoted_span": "profiled at scale",
				"relevance": 0.9
			}
		],
		"confidence": 0.7
	});
	let providers = Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(MarkerRerank { marker: "fibrosis" }),
		Arc::new(StubGeneration { payload }),
	);
	let corpus = Arc::new(MemoryCorpus::with_records([record]));
	let pipeline = SearchPipeline::with_providers(test_config(DIM), corpus, providers);

	pipeline.build_index().await.unwrap();

	let mut request = SearchRequest::new("hepatic fibrosis biopsies", 1);

	request.options.enable_answer = true;

	let result = pipeline.search(request).await.unwrap();
	let answer = result.answer.expect("answer requested");

	assert_eq!(answer.text, "Fibrosis cohorts were profiled with serial liver biopsies.");
	assert!(answer.grounding_complete);
	assert!(result.degraded_stages.is_empty());
	assert_eq!(result.status, SearchStatus::Done);
}

#[tokio::test]
async fn generation_outage_yields_empty_answer_and_degrades() {
	let providers = Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(MarkerRerank { marker: "breast" }),
		Arc::new(FailingGeneration),
	);
	let pipeline = built_pipeline(test_config(DIM), providers).await;
	let mut request = SearchRequest::new("breast carcinoma sequencing", 3);

	request.options.enable_answer = true;

	let result = pipeline.search(request).await.unwrap();
	let answer = result.answer.expect("answer requested");

	assert!(answer.text.is_empty());
	assert!(!answer.grounding_complete);
	assert!(result.degraded_stages.contains(&"answer".to_string()));
	assert_eq!(result.status, SearchStatus::Degraded);
}

#[tokio::test]
async fn vanished_records_are_skipped_not_fatal() {
	let corpus = Arc::new(MemoryCorpus::with_records(sample_records(DIM as usize)));
	let pipeline =
		SearchPipeline::with_providers(test_config(DIM), corpus.clone(), stub_providers());

	pipeline.build_index().await.unwrap();

	// Drop a record from the corpus but not from the indexes.
	corpus.remove("rec-002");

	let mut request = SearchRequest::new("expression profiling", 3);

	request.options.enable_rerank = false;

	let result = pipeline.search(request).await.unwrap();

	assert!(ids(&result).iter().all(|id| *id != "rec-002"));
	assert_eq!(result.status, SearchStatus::Done);
}

#[tokio::test]
async fn persisted_embedding_store_survives_provider_outage() {
	let store_path = std::env::temp_dir()
		.join(format!("sieve-embed-store-{}.json", std::process::id()));
	let warm = built_pipeline(test_config(DIM), stub_providers()).await;
	let mut request = SearchRequest::new("murine heart development", 3);

	request.options.enable_rerank = false;

	let warm_result = warm.search(request.clone()).await.unwrap();

	assert_eq!(warm_result.status, SearchStatus::Done);

	warm.save_embedding_store(&store_path).await.unwrap();

	let cold_providers = Providers::new(
		Arc::new(FailingEmbedding),
		Arc::new(FailingRerank),
		Arc::new(FailingGeneration),
	);
	let corpus = Arc::new(MemoryCorpus::with_records(sample_records(DIM as usize)));
	let cold = SearchPipeline::with_providers(test_config(DIM), corpus, cold_providers);

	cold.build_index().await.unwrap();
	cold.load_embedding_store(&store_path).await.unwrap();

	let cold_result = cold.search(request).await.unwrap();

	assert_eq!(cold_result.status, SearchStatus::Done);
	assert_eq!(ids(&cold_result), ids(&warm_result));

	std::fs::remove_file(&store_path).ok();
}

#[tokio::test]
async fn snapshot_round_trip_preserves_vector_search() {
	let snapshot_path = std::env::temp_dir()
		.join(format!("sieve-snapshot-{}.json", std::process::id()));
	let pipeline = built_pipeline(test_config(DIM), stub_providers()).await;

	pipeline.save_snapshot(&snapshot_path).unwrap();

	let corpus = Arc::new(MemoryCorpus::with_records(sample_records(DIM as usize)));
	let restored =
		SearchPipeline::with_providers(test_config(DIM), corpus, stub_providers());

	restored.load_snapshot(&snapshot_path).unwrap();

	assert_eq!(restored.indexes.vector_len(), 3);

	let mut bad_cfg = test_config(DIM + 1);

	bad_cfg.providers.embedding.dimensions = DIM + 1;

	let mismatched = SearchPipeline::with_providers(
		bad_cfg,
		Arc::new(MemoryCorpus::new()),
		stub_providers(),
	);

	assert!(matches!(
		mismatched.load_snapshot(&snapshot_path),
		Err(Error::Configuration { .. })
	));

	std::fs::remove_file(&snapshot_path).ok();
}
