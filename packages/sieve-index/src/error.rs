pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Vector for {id:?} has dimension {got}, index expects {expected}.")]
	DimensionMismatch { id: String, expected: usize, got: usize },
	#[error("Vector for {id:?} has zero magnitude.")]
	ZeroVector { id: String },
	#[error("Snapshot metric {got:?} does not match configured metric {expected:?}.")]
	MetricMismatch { expected: String, got: String },
	#[error("Snapshot format version {got} is not supported (expected {expected}).")]
	FormatVersion { expected: u32, got: u32 },
	#[error("Snapshot dimension {got} does not match configured dimension {expected}.")]
	SnapshotDimension { expected: usize, got: usize },
	#[error("Failed to read snapshot at {path:?}.")]
	SnapshotRead { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse snapshot at {path:?}.")]
	SnapshotParse { path: std::path::PathBuf, source: serde_json::Error },
	#[error("Failed to write snapshot at {path:?}.")]
	SnapshotWrite { path: std::path::PathBuf, source: std::io::Error },
}
