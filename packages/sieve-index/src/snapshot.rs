use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, vector::VectorIndex};

pub const FORMAT_VERSION: u32 = 1;

/// Single-artifact persistence for the vector index. The header travels with
/// the data so a snapshot built under one configuration can never be loaded
/// silently under another.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
	format_version: u32,
	dimension: usize,
	metric: String,
	vectors: BTreeMap<String, Vec<f32>>,
}

pub fn save(index: &VectorIndex, metric: &str, path: &Path) -> Result<()> {
	let snapshot = Snapshot {
		format_version: FORMAT_VERSION,
		dimension: index.dimension(),
		metric: metric.to_string(),
		vectors: index.entries().clone(),
	};
	let raw = serde_json::to_vec(&snapshot)
		.map_err(|err| Error::SnapshotParse { path: path.to_path_buf(), source: err })?;

	fs::write(path, raw)
		.map_err(|err| Error::SnapshotWrite { path: path.to_path_buf(), source: err })?;

	Ok(())
}

/// Loads a snapshot, failing fast when its header disagrees with the running
/// configuration.
pub fn load(path: &Path, expected_dimension: usize, expected_metric: &str) -> Result<VectorIndex> {
	let raw = fs::read(path)
		.map_err(|err| Error::SnapshotRead { path: path.to_path_buf(), source: err })?;
	let snapshot: Snapshot = serde_json::from_slice(&raw)
		.map_err(|err| Error::SnapshotParse { path: path.to_path_buf(), source: err })?;

	if snapshot.format_version != FORMAT_VERSION {
		return Err(Error::FormatVersion {
			expected: FORMAT_VERSION,
			got: snapshot.format_version,
		});
	}
	if snapshot.dimension != expected_dimension {
		return Err(Error::SnapshotDimension {
			expected: expected_dimension,
			got: snapshot.dimension,
		});
	}
	if snapshot.metric != expected_metric {
		return Err(Error::MetricMismatch {
			expected: expected_metric.to_string(),
			got: snapshot.metric,
		});
	}

	Ok(VectorIndex::restore(snapshot.dimension, snapshot.vectors))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn temp_path(name: &str) -> std::path::PathBuf {
		let mut path = std::env::temp_dir();

		path.push(format!("sieve-snapshot-{name}-{}", std::process::id()));

		path
	}

	#[test]
	fn round_trips_vectors_through_disk() {
		let path = temp_path("roundtrip");
		let mut index = VectorIndex::new(2);

		index.upsert("a", vec![1.0, 0.0]).unwrap();
		index.upsert("b", vec![0.0, 1.0]).unwrap();
		save(&index, "cosine", &path).unwrap();

		let restored = load(&path, 2, "cosine").unwrap();

		assert_eq!(restored.len(), 2);
		assert_eq!(restored.search(&[1.0, 0.0], 1).unwrap()[0].0, "a");

		fs::remove_file(&path).ok();
	}

	#[test]
	fn rejects_dimension_and_metric_mismatch() {
		let path = temp_path("mismatch");
		let mut index = VectorIndex::new(2);

		index.upsert("a", vec![1.0, 0.0]).unwrap();
		save(&index, "cosine", &path).unwrap();

		assert!(matches!(load(&path, 3, "cosine"), Err(Error::SnapshotDimension { .. })));
		assert!(matches!(load(&path, 2, "dot"), Err(Error::MetricMismatch { .. })));

		fs::remove_file(&path).ok();
	}

	#[test]
	fn missing_file_is_a_read_error() {
		assert!(matches!(
			load(Path::new("/nonexistent/sieve.snapshot"), 2, "cosine"),
			Err(Error::SnapshotRead { .. })
		));
	}
}
