use unicode_segmentation::UnicodeSegmentation;

/// Lowercased word tokens in document order, duplicates preserved.
pub fn tokenize(text: &str) -> Vec<String> {
	text.unicode_words().map(|word| word.to_lowercase()).collect()
}

/// Query tokens deduplicated in first-seen order, capped at `max_terms`.
pub fn query_terms(text: &str, max_terms: usize) -> Vec<String> {
	let mut out = Vec::new();

	for token in tokenize(text) {
		if out.contains(&token) {
			continue;
		}

		out.push(token);

		if out.len() >= max_terms {
			break;
		}
	}

	out
}

/// Query terms that occur in `text`, capped at `max_terms`. Used to build
/// per-candidate explanations.
pub fn match_terms_in_text(terms: &[String], text: &str, max_terms: usize) -> Vec<String> {
	if terms.is_empty() {
		return Vec::new();
	}

	let haystack = text.to_lowercase();
	let mut matched = Vec::new();

	for term in terms {
		if haystack.contains(term.as_str()) {
			matched.push(term.clone());
		}
		if matched.len() >= max_terms {
			break;
		}
	}

	matched
}
