#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Citation {
	pub candidate_id: String,
	pub quoted_span: String,
	pub relevance: f32,
}

/// A generated answer. `grounding_complete` is false whenever any citation
/// the generator produced failed verification and was dropped, or when
/// generation itself failed (empty text, zero confidence).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Answer {
	pub text: String,
	pub citations: Vec<Citation>,
	pub confidence: f32,
	pub grounding_complete: bool,
}

impl Answer {
	pub fn empty() -> Self {
		Self { text: String::new(), citations: Vec::new(), confidence: 0.0, grounding_complete: false }
	}
}

/// A citation verifies only if its quoted span is a non-empty exact substring
/// of the cited record's body.
pub fn citation_matches(body: &str, quoted_span: &str) -> bool {
	if quoted_span.trim().is_empty() {
		return false;
	}

	body.contains(quoted_span)
}
