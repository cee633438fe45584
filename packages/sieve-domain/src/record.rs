use std::collections::BTreeMap;

/// A corpus record. Immutable once ingested; the embedding is populated
/// lazily by the embedding adapter and cached keyed by content and provider
/// version, so it is never authoritative here.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Record {
	pub id: String,
	pub title: String,
	pub body: String,
	pub metadata: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub embedding: Option<Vec<f32>>,
}

impl Record {
	pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			title: title.into(),
			body: body.into(),
			metadata: BTreeMap::new(),
			embedding: None,
		}
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.insert(key.into(), value.into());

		self
	}

	/// Text that feeds both indexes: title first, then body.
	pub fn searchable_text(&self) -> String {
		if self.title.trim().is_empty() {
			return self.body.clone();
		}

		format!("{}\n{}", self.title, self.body)
	}

	/// Whether this record satisfies every filter pair exactly.
	pub fn matches_filters(&self, filters: &BTreeMap<String, String>) -> bool {
		filters.iter().all(|(key, value)| self.metadata.get(key) == Some(value))
	}
}
