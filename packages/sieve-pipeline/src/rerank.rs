use std::time::Duration;

use sieve_domain::{Query, ScoredCandidate};

use crate::{SearchPipeline, cache};

impl SearchPipeline {
	/// Scores the fused head with the cross-encoder provider and writes the
	/// scores onto the candidates. Returns false when the provider fails or
	/// times out; the caller records the degradation and keeps fusion order.
	/// No score is committed before the provider outcome is known, so a
	/// failed call leaves every candidate unscored even when some of the
	/// head was already in the rerank cache.
	///
	/// Scores are clamped to [0,1] and cached per (query, candidate) pair, so
	/// a repeat query only pays for candidates it has not seen yet.
	pub(crate) async fn rerank_stage(
		&self,
		query: &Query,
		candidates: &mut [ScoredCandidate],
	) -> bool {
		let top_n = (self.cfg.search.rerank.top_n as usize).min(candidates.len());

		if top_n == 0 {
			return true;
		}

		let head = &mut candidates[..top_n];
		let mut resolved = Vec::new();
		let mut pending = Vec::new();
		let mut docs = Vec::new();

		for (position, candidate) in head.iter().enumerate() {
			match cache::build_rerank_cache_key(&self.cfg, &query.raw, &candidate.id) {
				Ok(key) =>
					if let Some(score) = self.rerank_cache.get(&key) {
						resolved.push((position, score));

						continue;
					},
				Err(err) => {
					tracing::warn!(error = %err, "Rerank cache key failed; treating as miss.");
				},
			}

			let Some(text) = self.corpus.get_record_text(&candidate.id) else {
				continue;
			};

			pending.push(position);
			docs.push(text);
		}

		if !pending.is_empty() {
			let cfg = &self.cfg.providers.rerank;
			let call = self.providers.rerank.rerank(cfg, &query.raw, &docs);
			let scores =
				match tokio::time::timeout(Duration::from_millis(cfg.timeout_ms), call).await {
					Ok(Ok(scores)) => scores,
					Ok(Err(err)) => {
						tracing::warn!(error = %err, "Rerank provider failed.");

						return false;
					},
					Err(_) => {
						tracing::warn!(timeout_ms = cfg.timeout_ms, "Rerank provider timed out.");

						return false;
					},
				};

			if scores.len() != docs.len() {
				tracing::warn!(
					expected = docs.len(),
					got = scores.len(),
					"Rerank provider returned a misaligned score list."
				);

				return false;
			}

			for (position, score) in pending.into_iter().zip(scores) {
				let score = score.clamp(0.0, 1.0);

				resolved.push((position, score));

				if let Ok(key) =
					cache::build_rerank_cache_key(&self.cfg, &query.raw, &head[position].id)
				{
					self.rerank_cache.insert(key, score);
				}
			}
		}

		for (position, score) in resolved {
			head[position].rerank_score = Some(score);
		}

		true
	}
}
