pub mod answer;
pub mod corpus;
pub mod expansion;
pub mod query;
pub mod record;
pub mod result;
pub mod text;

pub use answer::{Answer, Citation, citation_matches};
pub use corpus::Corpus;
pub use expansion::{Expansion, expand};
pub use query::{EntityKind, Query, QueryEntity};
pub use record::Record;
pub use result::{
	Explanation, ScoredCandidate, SearchResult, SearchStatus, StageTimings, cmp_score_desc,
};
