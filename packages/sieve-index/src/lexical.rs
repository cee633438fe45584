use std::collections::{BTreeMap, HashMap};

use sieve_domain::text;

/// Inverted index with TF-IDF scoring. Term frequency is normalized by
/// document length unless `length_normalization` is turned off; inverse
/// document frequency is `ln(1 + N / df)`.
#[derive(Debug, Default)]
pub struct LexicalIndex {
	postings: HashMap<String, BTreeMap<String, u32>>,
	doc_lens: HashMap<String, u32>,
	length_normalization: bool,
}

impl LexicalIndex {
	pub fn new(length_normalization: bool) -> Self {
		Self { postings: HashMap::new(), doc_lens: HashMap::new(), length_normalization }
	}

	pub fn len(&self) -> usize {
		self.doc_lens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.doc_lens.is_empty()
	}

	/// Indexes the text under the id, replacing any previous posting for it.
	pub fn index(&mut self, id: &str, text: &str) {
		self.remove(id);

		let tokens = text::tokenize(text);

		if tokens.is_empty() {
			return;
		}

		self.doc_lens.insert(id.to_string(), tokens.len() as u32);

		for token in tokens {
			*self.postings.entry(token).or_default().entry(id.to_string()).or_insert(0) += 1;
		}
	}

	pub fn remove(&mut self, id: &str) {
		if self.doc_lens.remove(id).is_none() {
			return;
		}

		self.postings.retain(|_, docs| {
			docs.remove(id);

			!docs.is_empty()
		});
	}

	/// Ranked search over the given terms. Results are ordered by descending
	/// score with ties broken by ascending id.
	pub fn search(&self, terms: &[String], k: usize) -> Vec<(String, f32)> {
		if k == 0 || self.doc_lens.is_empty() {
			return Vec::new();
		}

		let doc_count = self.doc_lens.len() as f32;
		let mut scores: BTreeMap<&str, f32> = BTreeMap::new();

		for term in terms {
			let Some(docs) = self.postings.get(term) else {
				continue;
			};
			let idf = (1.0 + doc_count / docs.len() as f32).ln();

			for (id, count) in docs {
				let tf = if self.length_normalization {
					*count as f32 / self.doc_lens[id.as_str()] as f32
				} else {
					*count as f32
				};

				*scores.entry(id.as_str()).or_insert(0.0) += tf * idf;
			}
		}

		let mut ranked: Vec<(String, f32)> =
			scores.into_iter().map(|(id, score)| (id.to_string(), score)).collect();

		// BTreeMap iteration already yields ascending ids, and the sort is
		// stable, so equal scores keep that order.
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
		ranked.truncate(k);

		ranked
	}
}
