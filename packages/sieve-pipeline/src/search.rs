use std::{collections::BTreeMap, time::Instant};

use uuid::Uuid;

use sieve_domain::{
	Explanation, Query, SearchResult, SearchStatus, StageTimings, expansion, text,
};

use crate::{Error, Result, SearchPipeline, cache, fusion};

const MAX_QUERY_CHARS: usize = 1_024;
const MAX_QUERY_TERMS: usize = 32;
const MAX_EXPLAIN_TERMS: usize = 8;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub filters: BTreeMap<String, String>,
	pub top_k: usize,
	#[serde(default)]
	pub options: SearchOptions,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SearchOptions {
	pub enable_vector: bool,
	pub enable_rerank: bool,
	pub enable_answer: bool,
}

impl Default for SearchOptions {
	fn default() -> Self {
		Self { enable_vector: true, enable_rerank: true, enable_answer: false }
	}
}

impl SearchRequest {
	pub fn new(query: impl Into<String>, top_k: usize) -> Self {
		Self {
			query: query.into(),
			filters: BTreeMap::new(),
			top_k,
			options: SearchOptions::default(),
		}
	}

	fn validate(&self) -> Result<()> {
		if self.query.trim().is_empty() {
			return Err(Error::Validation { message: "Query must be non-empty.".to_string() });
		}
		if self.query.chars().count() > MAX_QUERY_CHARS {
			return Err(Error::Validation {
				message: format!("Query exceeds {MAX_QUERY_CHARS} characters."),
			});
		}

		for (key, value) in &self.filters {
			if key.trim().is_empty() || value.trim().is_empty() {
				return Err(Error::Validation {
					message: "Filter keys and values must be non-empty.".to_string(),
				});
			}
		}

		Ok(())
	}
}

impl SearchPipeline {
	/// The search entry point: expand, retrieve both legs concurrently, fuse,
	/// rerank, optionally synthesize, assemble. Single-stage failures degrade
	/// the result rather than the request; the request itself fails only on
	/// invalid input or when both retrieval legs fail.
	pub async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
		let trace_id = Uuid::new_v4();
		let started = Instant::now();

		request.validate()?;

		if request.top_k == 0 {
			return Ok(SearchResult::empty(trace_id));
		}

		let cache_key = match cache::build_result_cache_key(
			&self.cfg,
			&request.query,
			&request.filters,
			request.top_k,
			&request.options,
			self.indexes.generation(),
		) {
			Ok(key) => Some(key),
			Err(err) => {
				tracing::warn!(error = %err, "Result cache key failed; treating as miss.");

				None
			},
		};

		if let Some(key) = &cache_key
			&& let Some(mut hit) = self.result_cache.get(key)
		{
			hit.cache_hit = true;

			tracing::info!(%trace_id, cached_trace = %hit.trace_id, "Cache hit.");

			return Ok(hit);
		}

		let mut timings = StageTimings::default();
		let mut degraded: Vec<String> = Vec::new();

		// Expansion is deterministic and never fails the request.
		let expand_started = Instant::now();
		let query = if self.cfg.search.expansion.enabled {
			let expanded = expansion::expand(&request.query);

			Query {
				raw: request.query.clone(),
				expanded: expanded.expanded_text,
				entities: expanded.entities,
				filter_hints: expanded.filter_hints,
				top_k: request.top_k,
			}
		} else {
			Query::unexpanded(request.query.clone(), request.top_k)
		};

		timings.expand_ms = expand_started.elapsed().as_millis() as u64;

		// Both retrieval legs run concurrently; they share no mutable state.
		let retrieve_started = Instant::now();
		let terms = text::query_terms(&query.expanded, MAX_QUERY_TERMS);
		let candidate_k = self.cfg.search.candidate_k as usize;
		let lexical_leg = async { Ok::<_, Error>(self.indexes.search_lexical(&terms, candidate_k)) };
		let vector_leg = async {
			if !request.options.enable_vector {
				return Ok(Vec::new());
			}

			let vector = self.embedder.embed(&query.expanded, "query").await?;
			let hits = self.indexes.search_vector(&vector, candidate_k)?;

			// Distances become similarities so larger is better everywhere.
			Ok::<_, Error>(
				hits.into_iter().map(|(id, distance)| (id, 1.0 - distance)).collect::<Vec<_>>(),
			)
		};
		let (lexical_hits, vector_hits) = tokio::join!(lexical_leg, vector_leg);
		let lexical_hits = match lexical_hits {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(%trace_id, error = %err, "Lexical leg failed.");

				degraded.push("lexical".to_string());

				Vec::new()
			},
		};
		let vector_hits = match vector_hits {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(%trace_id, error = %err, "Vector leg failed.");

				degraded.push("vector".to_string());

				Vec::new()
			},
		};

		timings.retrieve_ms = retrieve_started.elapsed().as_millis() as u64;

		if degraded.len() == 2 {
			return Err(Error::Retrieval {
				message: "Both retrieval legs failed; no candidates producible.".to_string(),
			});
		}

		let fuse_started = Instant::now();
		let mut candidates = fusion::fuse(&lexical_hits, &vector_hits, &self.cfg.search.fusion);
		let considered = candidates.len();

		// Hydration: a candidate whose record vanished is skipped, and
		// explicit filters run against record metadata.
		candidates.retain(|candidate| {
			let Some(record) = self.corpus.get_record(&candidate.id) else {
				tracing::debug!(%trace_id, id = %candidate.id, "Skipping vanished record.");

				return false;
			};

			record.matches_filters(&request.filters)
		});

		timings.fuse_ms = fuse_started.elapsed().as_millis() as u64;

		let rerank_started = Instant::now();
		let reranked = if request.options.enable_rerank && !candidates.is_empty() {
			let ok = self.rerank_stage(&query, &mut candidates).await;

			if !ok {
				degraded.push("rerank".to_string());
			}

			ok
		} else {
			false
		};

		candidates.sort_by(|a, b| a.cmp_final(b));
		candidates.truncate(request.top_k);

		timings.rerank_ms = rerank_started.elapsed().as_millis() as u64;

		for candidate in &mut candidates {
			let Some(record_text) = self.corpus.get_record_text(&candidate.id) else {
				continue;
			};
			let matched_terms = text::match_terms_in_text(&terms, &record_text, MAX_EXPLAIN_TERMS);
			let mut flagged_issues = Vec::new();

			if request.options.enable_vector && candidate.vector_score.is_none() {
				flagged_issues.push("no_vector_match".to_string());
			}
			if candidate.lexical_score.is_none() {
				flagged_issues.push("no_lexical_match".to_string());
			}

			candidate.explanation = Some(Explanation { matched_terms, flagged_issues });
		}

		let answer_started = Instant::now();
		let answer = if request.options.enable_answer && !candidates.is_empty() {
			match self.answer_stage(&query, &candidates).await {
				Ok(answer) => Some(answer),
				Err(err) => {
					tracing::warn!(%trace_id, error = %err, "Answer stage failed.");

					degraded.push("answer".to_string());

					Some(sieve_domain::Answer::empty())
				},
			}
		} else {
			None
		};

		timings.answer_ms = answer_started.elapsed().as_millis() as u64;
		timings.total_ms = started.elapsed().as_millis() as u64;

		let status =
			if degraded.is_empty() { SearchStatus::Done } else { SearchStatus::Degraded };
		let result = SearchResult {
			trace_id,
			candidates,
			considered,
			timings,
			cache_hit: false,
			degraded_stages: degraded,
			reranked,
			answer,
			status,
		};

		// Degraded results are returned but never cached, so a transient
		// provider outage cannot pin a weaker result for a full TTL.
		if status == SearchStatus::Done
			&& let Some(key) = cache_key
		{
			self.result_cache.insert(key, result.clone());
		}

		tracing::info!(
			%trace_id,
			considered,
			returned = result.candidates.len(),
			reranked = result.reranked,
			degraded = result.degraded_stages.len(),
			total_ms = result.timings.total_ms,
			"Search finished."
		);

		Ok(result)
	}
}
