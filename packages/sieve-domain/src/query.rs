use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Assay,
	Disease,
	Organism,
	Accession,
}

/// A typed entity extracted from the raw query by deterministic pattern
/// matching. Entities feed advisory filter suggestions; they never alter the
/// query on their own.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueryEntity {
	pub kind: EntityKind,
	pub value: String,
}

/// A parsed request-time query. `expanded` is derived from `raw` by the
/// expander; with expansion disabled the two are equal.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Query {
	pub raw: String,
	pub expanded: String,
	pub entities: Vec<QueryEntity>,
	pub filter_hints: BTreeMap<String, String>,
	pub top_k: usize,
}

impl Query {
	pub fn unexpanded(raw: impl Into<String>, top_k: usize) -> Self {
		let raw = raw.into();

		Self {
			expanded: raw.clone(),
			raw,
			entities: Vec::new(),
			filter_hints: BTreeMap::new(),
			top_k,
		}
	}
}
