use std::cmp::Ordering;

use uuid::Uuid;

use crate::answer::Answer;

/// Per-candidate stage scores. Scores from different stages live on different
/// scales and are never compared directly; only `fused_score` (rank-derived)
/// and `rerank_score` (calibrated to [0,1]) order the final list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoredCandidate {
	pub id: String,
	pub lexical_score: Option<f32>,
	pub vector_score: Option<f32>,
	pub fused_score: f32,
	pub rerank_score: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub explanation: Option<Explanation>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Explanation {
	pub matched_terms: Vec<String>,
	pub flagged_issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StageTimings {
	pub expand_ms: u64,
	pub retrieve_ms: u64,
	pub fuse_ms: u64,
	pub rerank_ms: u64,
	pub answer_ms: u64,
	pub total_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
	Done,
	Degraded,
}

/// The load-bearing pipeline output. The candidate list is always present;
/// the answer is optional and its absence never signals failure on its own.
/// Degradation is explicit via `degraded_stages` and `reranked`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
	pub trace_id: Uuid,
	pub candidates: Vec<ScoredCandidate>,
	/// How many distinct candidates the fusion stage considered.
	pub considered: usize,
	pub timings: StageTimings,
	pub cache_hit: bool,
	pub degraded_stages: Vec<String>,
	pub reranked: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub answer: Option<Answer>,
	pub status: SearchStatus,
}

impl SearchResult {
	pub fn empty(trace_id: Uuid) -> Self {
		Self {
			trace_id,
			candidates: Vec::new(),
			considered: 0,
			timings: StageTimings::default(),
			cache_hit: false,
			degraded_stages: Vec::new(),
			reranked: false,
			answer: None,
			status: SearchStatus::Done,
		}
	}
}

/// Descending score order with NaN sorted last, so a stray NaN can never
/// float to the top of a ranking.
pub fn cmp_score_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

impl ScoredCandidate {
	/// Total order for the final list: `rerank_score` dominates `fused_score`
	/// whenever it is present, ties always break by ascending id.
	pub fn cmp_final(&self, other: &Self) -> Ordering {
		let ord = match (self.rerank_score, other.rerank_score) {
			(Some(a), Some(b)) => cmp_score_desc(a, b),
			(Some(_), None) => Ordering::Less,
			(None, Some(_)) => Ordering::Greater,
			(None, None) => cmp_score_desc(self.fused_score, other.fused_score),
		};

		ord.then_with(|| self.id.cmp(&other.id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(id: &str, fused: f32, rerank: Option<f32>) -> ScoredCandidate {
		ScoredCandidate {
			id: id.to_string(),
			lexical_score: None,
			vector_score: None,
			fused_score: fused,
			rerank_score: rerank,
			explanation: None,
		}
	}

	#[test]
	fn rerank_score_dominates_fused_score() {
		let low_fused = candidate("a", 0.1, Some(1.0));
		let high_fused = candidate("b", 0.9, Some(0.2));

		assert_eq!(low_fused.cmp_final(&high_fused), Ordering::Less);
	}

	#[test]
	fn reranked_candidates_sort_above_unreranked() {
		let reranked = candidate("b", 0.1, Some(0.3));
		let unreranked = candidate("a", 0.9, None);

		assert_eq!(reranked.cmp_final(&unreranked), Ordering::Less);
	}

	#[test]
	fn ties_break_by_ascending_id() {
		let a = candidate("a", 0.5, None);
		let b = candidate("b", 0.5, None);

		assert_eq!(a.cmp_final(&b), Ordering::Less);
	}

	#[test]
	fn nan_sorts_last() {
		let healthy = candidate("b", 0.1, None);
		let poisoned = candidate("a", f32::NAN, None);

		assert_eq!(healthy.cmp_final(&poisoned), Ordering::Less);
	}
}
