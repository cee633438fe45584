use std::{
	path::Path,
	sync::{
		RwLock,
		atomic::{AtomicU64, Ordering},
	},
};

use crate::{Result, lexical::LexicalIndex, snapshot, vector::VectorIndex};

/// Shared handle over both retrieval indexes. Reads take shared locks so
/// concurrent searches never serialize; single-item writes take the exclusive
/// lock only for their own duration.
///
/// Every mutation bumps a generation counter. Result cache keys embed the
/// generation, so corpus updates invalidate stale cached results without any
/// explicit cache sweep.
#[derive(Debug)]
pub struct IndexManager {
	lexical: RwLock<LexicalIndex>,
	vector: RwLock<VectorIndex>,
	generation: AtomicU64,
	metric: String,
}

impl IndexManager {
	pub fn new(dimension: usize, metric: &str, length_normalization: bool) -> Self {
		Self {
			lexical: RwLock::new(LexicalIndex::new(length_normalization)),
			vector: RwLock::new(VectorIndex::new(dimension)),
			generation: AtomicU64::new(0),
			metric: metric.to_string(),
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	fn bump_generation(&self) {
		self.generation.fetch_add(1, Ordering::AcqRel);
	}

	pub fn index_record(&self, id: &str, text: &str) {
		self.lexical.write().expect("Lexical index lock is poisoned.").index(id, text);
		self.bump_generation();
	}

	pub fn upsert_vector(&self, id: &str, vector: Vec<f32>) -> Result<()> {
		self.vector.write().expect("Vector index lock is poisoned.").upsert(id, vector)?;
		self.bump_generation();

		Ok(())
	}

	pub fn remove(&self, id: &str) {
		self.lexical.write().expect("Lexical index lock is poisoned.").remove(id);
		self.vector.write().expect("Vector index lock is poisoned.").remove(id);
		self.bump_generation();
	}

	pub fn search_lexical(&self, terms: &[String], k: usize) -> Vec<(String, f32)> {
		self.lexical.read().expect("Lexical index lock is poisoned.").search(terms, k)
	}

	pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
		self.vector.read().expect("Vector index lock is poisoned.").search(query, k)
	}

	pub fn lexical_len(&self) -> usize {
		self.lexical.read().expect("Lexical index lock is poisoned.").len()
	}

	pub fn vector_len(&self) -> usize {
		self.vector.read().expect("Vector index lock is poisoned.").len()
	}

	pub fn save_snapshot(&self, path: &Path) -> Result<()> {
		let vector = self.vector.read().expect("Vector index lock is poisoned.");

		snapshot::save(&vector, &self.metric, path)?;

		tracing::info!(path = %path.display(), vectors = vector.len(), "Saved vector snapshot.");

		Ok(())
	}

	pub fn load_snapshot(&self, path: &Path) -> Result<()> {
		let dimension =
			self.vector.read().expect("Vector index lock is poisoned.").dimension();
		let restored = snapshot::load(path, dimension, &self.metric)?;

		tracing::info!(path = %path.display(), vectors = restored.len(), "Loaded vector snapshot.");

		*self.vector.write().expect("Vector index lock is poisoned.") = restored;

		self.bump_generation();

		Ok(())
	}
}
