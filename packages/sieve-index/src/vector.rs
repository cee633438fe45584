use std::collections::BTreeMap;

use crate::{Error, Result};

/// Exact-scan vector index over unit-normalized vectors. A full scan keeps
/// search deterministic for a fixed index state, with ties broken by
/// ascending id.
#[derive(Debug)]
pub struct VectorIndex {
	vectors: BTreeMap<String, Vec<f32>>,
	dimension: usize,
}

impl VectorIndex {
	pub fn new(dimension: usize) -> Self {
		Self { vectors: BTreeMap::new(), dimension }
	}

	pub fn dimension(&self) -> usize {
		self.dimension
	}

	pub fn len(&self) -> usize {
		self.vectors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vectors.is_empty()
	}

	/// Stores the vector under the id, normalizing it to unit length.
	/// Dimension mismatches and zero vectors are rejected before any state
	/// changes.
	pub fn upsert(&mut self, id: &str, vector: Vec<f32>) -> Result<()> {
		if vector.len() != self.dimension {
			return Err(Error::DimensionMismatch {
				id: id.to_string(),
				expected: self.dimension,
				got: vector.len(),
			});
		}

		let normalized =
			normalize(vector).ok_or_else(|| Error::ZeroVector { id: id.to_string() })?;

		self.vectors.insert(id.to_string(), normalized);

		Ok(())
	}

	pub fn remove(&mut self, id: &str) -> bool {
		self.vectors.remove(id).is_some()
	}

	/// Nearest neighbors by cosine distance, ascending. The query vector is
	/// normalized here, so callers may pass raw provider output.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
		if query.len() != self.dimension {
			return Err(Error::DimensionMismatch {
				id: "<query>".to_string(),
				expected: self.dimension,
				got: query.len(),
			});
		}
		if k == 0 || self.vectors.is_empty() {
			return Ok(Vec::new());
		}

		let query = normalize(query.to_vec())
			.ok_or_else(|| Error::ZeroVector { id: "<query>".to_string() })?;
		let mut ranked: Vec<(String, f32)> = self
			.vectors
			.iter()
			.map(|(id, vector)| (id.clone(), cosine_distance(&query, vector)))
			.collect();

		// BTreeMap iteration yields ascending ids; stable sort keeps that
		// order for equal distances.
		ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
		ranked.truncate(k);

		Ok(ranked)
	}

	pub(crate) fn entries(&self) -> &BTreeMap<String, Vec<f32>> {
		&self.vectors
	}

	pub(crate) fn restore(dimension: usize, vectors: BTreeMap<String, Vec<f32>>) -> Self {
		Self { vectors, dimension }
	}
}

fn normalize(mut vector: Vec<f32>) -> Option<Vec<f32>> {
	let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();

	if magnitude <= f32::EPSILON {
		return None;
	}

	for value in &mut vector {
		*value /= magnitude;
	}

	Some(vector)
}

/// Both inputs are unit vectors, so cosine distance reduces to `1 - dot`.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();

	1.0 - dot
}
