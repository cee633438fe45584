use std::time::Duration;

use sieve_domain::{Answer, Citation, Query, Record, ScoredCandidate, citation_matches};

use crate::{Error, Result, SearchPipeline};

#[derive(Debug, serde::Deserialize)]
struct RawAnswer {
	#[serde(default)]
	answer: String,
	#[serde(default)]
	citations: Vec<RawCitation>,
	#[serde(default)]
	confidence: f32,
}

#[derive(Debug, serde::Deserialize)]
struct RawCitation {
	candidate_id: String,
	quoted_span: String,
	#[serde(default)]
	relevance: f32,
}

impl SearchPipeline {
	/// Synthesizes a grounded answer over the top candidates. Context blocks
	/// that overflow the character budget are cut to the remaining budget, not
	/// dropped, so a single oversized record still contributes. Every citation
	/// the generator emits is verified against the cited record's body; a
	/// citation that fails verification is dropped and the answer is marked
	/// with `grounding_complete = false` instead of being trusted.
	pub(crate) async fn answer_stage(
		&self,
		query: &Query,
		candidates: &[ScoredCandidate],
	) -> Result<Answer> {
		let cfg = &self.cfg.search.answer;
		let budget = cfg.context_budget_chars as usize;
		let mut used = 0usize;
		let mut context = String::new();
		let mut sources: Vec<Record> = Vec::new();

		for candidate in candidates.iter().take(cfg.max_candidates as usize) {
			let remaining = budget - used;

			if remaining == 0 {
				break;
			}

			let Some(record) = self.corpus.get_record(&candidate.id) else {
				tracing::debug!(id = %candidate.id, "Skipping vanished record in answer context.");

				continue;
			};
			let mut block = format!("[{}] {}\n{}\n\n", record.id, record.title, record.body);
			let block_chars = block.chars().count();

			if block_chars > remaining {
				let cut = block
					.char_indices()
					.nth(remaining)
					.map(|(offset, _)| offset)
					.unwrap_or(block.len());

				block.truncate(cut);

				used += remaining;
			} else {
				used += block_chars;
			}

			context.push_str(&block);
			sources.push(record);
		}

		if sources.is_empty() {
			return Ok(Answer::empty());
		}

		let system = format!(
			"You answer questions about a record corpus using only the provided context. \
			 Respond with a single JSON object: {{\"answer\": string of at most {} characters, \
			 \"citations\": [{{\"candidate_id\": string, \"quoted_span\": string copied verbatim \
			 from the record body, \"relevance\": number in [0,1]}}], \"confidence\": number in \
			 [0,1]}}. Cite only records that appear in the context.",
			cfg.target_chars
		);
		let user = format!("Question: {}\n\nContext:\n{context}", query.raw);
		let messages = [
			serde_json::json!({ "role": "system", "content": system }),
			serde_json::json!({ "role": "user", "content": user }),
		];
		let provider_cfg = &self.cfg.providers.generation;
		let call = self.providers.generation.generate(provider_cfg, &messages);
		let json = tokio::time::timeout(Duration::from_millis(provider_cfg.timeout_ms), call)
			.await
			.map_err(|_| Error::Provider {
				message: format!("Generation timed out after {}ms.", provider_cfg.timeout_ms),
			})??;
		let raw: RawAnswer = serde_json::from_value(json).map_err(|err| Error::Provider {
			message: format!("Generation returned an unexpected shape: {err}"),
		})?;

		if raw.answer.trim().is_empty() {
			return Ok(Answer::empty());
		}

		let mut citations = Vec::new();
		let mut grounding_complete = true;

		for citation in raw.citations {
			let Some(record) = sources.iter().find(|record| record.id == citation.candidate_id)
			else {
				tracing::debug!(
					id = %citation.candidate_id,
					"Dropping citation of a record outside the context."
				);

				grounding_complete = false;

				continue;
			};

			if !citation_matches(&record.body, &citation.quoted_span) {
				tracing::debug!(id = %citation.candidate_id, "Dropping unverifiable citation.");

				grounding_complete = false;

				continue;
			}

			citations.push(Citation {
				candidate_id: citation.candidate_id,
				quoted_span: citation.quoted_span,
				relevance: citation.relevance.clamp(0.0, 1.0),
			});
		}

		if citations.is_empty() {
			grounding_complete = false;
		}

		Ok(Answer {
			text: raw.answer,
			citations,
			confidence: raw.confidence.clamp(0.0, 1.0),
			grounding_complete,
		})
	}
}
