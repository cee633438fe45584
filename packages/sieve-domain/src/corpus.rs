use crate::record::Record;

/// Read-only corpus collaborator. The pipeline never owns record lifecycle:
/// it lists ids at index-build time and fetches records on demand while
/// assembling results. A missing record is not an error at this layer; the
/// caller decides whether to skip or fail.
pub trait Corpus
where
	Self: Send + Sync,
{
	fn get_record(&self, id: &str) -> Option<Record>;

	fn list_all_ids(&self) -> Vec<String>;

	fn get_record_text(&self, id: &str) -> Option<String> {
		self.get_record(id).map(|record| record.searchable_text())
	}
}
