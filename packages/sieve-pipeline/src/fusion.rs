use std::collections::BTreeMap;

use sieve_config::SearchFusion;
use sieve_domain::{ScoredCandidate, cmp_score_desc};

/// Weighted Reciprocal Rank Fusion over the two retrieval legs. Working on
/// ranks rather than raw scores makes the merge scale-invariant, so the TF-IDF
/// and cosine ranges never need calibration. A candidate absent from one leg
/// simply contributes nothing for that term, which also means an empty vector
/// leg reproduces the lexical order exactly.
pub fn fuse(
	lexical: &[(String, f32)],
	vector: &[(String, f32)],
	cfg: &SearchFusion,
) -> Vec<ScoredCandidate> {
	let mut merged: BTreeMap<String, ScoredCandidate> = BTreeMap::new();

	for (rank, (id, score)) in lexical.iter().enumerate() {
		let entry = merged.entry(id.clone()).or_insert_with(|| blank(id));

		entry.lexical_score = Some(*score);
		entry.fused_score += cfg.lexical_weight / (rank as f32 + 1.0 + cfg.damping);
	}
	for (rank, (id, score)) in vector.iter().enumerate() {
		let entry = merged.entry(id.clone()).or_insert_with(|| blank(id));

		entry.vector_score = Some(*score);
		entry.fused_score += cfg.vector_weight / (rank as f32 + 1.0 + cfg.damping);
	}

	let mut fused: Vec<ScoredCandidate> = merged.into_values().collect();

	fused.sort_by(|a, b| {
		cmp_score_desc(a.fused_score, b.fused_score).then_with(|| a.id.cmp(&b.id))
	});

	fused
}

fn blank(id: &str) -> ScoredCandidate {
	ScoredCandidate {
		id: id.to_string(),
		lexical_score: None,
		vector_score: None,
		fused_score: 0.0,
		rerank_score: None,
		explanation: None,
	}
}
