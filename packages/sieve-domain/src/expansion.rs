use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;

use crate::{
	query::{EntityKind, QueryEntity},
	text,
};

/// Expansion never grows a query past this multiple of its original token
/// count; synonyms past the cap are dropped in ontology order.
pub const MAX_EXPANSION_RATIO: usize = 4;

/// Static ontology: normalized phrase → related terms. Phrases are one or two
/// tokens; lookups run over token unigrams and bigrams of the query.
const ONTOLOGY: &[(&str, &[&str])] = &[
	("breast cancer", &["breast carcinoma", "mammary tumor"]),
	("lung cancer", &["lung carcinoma", "nsclc"]),
	("liver cancer", &["hepatocellular carcinoma", "hcc"]),
	("leukemia", &["leukaemia", "aml"]),
	("tumor", &["tumour", "neoplasm"]),
	("cancer", &["carcinoma", "malignancy"]),
	("rna-seq", &["transcriptome sequencing", "rna sequencing"]),
	("scrna-seq", &["single-cell rna-seq", "single cell transcriptomics"]),
	("chip-seq", &["chromatin immunoprecipitation sequencing"]),
	("atac-seq", &["chromatin accessibility"]),
	("methylation", &["bisulfite sequencing", "epigenetic"]),
	("microarray", &["expression array"]),
	("proteomics", &["mass spectrometry"]),
	("human", &["homo sapiens"]),
	("mouse", &["mus musculus", "murine"]),
	("rat", &["rattus norvegicus"]),
	("heart", &["cardiac", "myocardium"]),
	("brain", &["neural", "cortex"]),
	("kidney", &["renal"]),
	("liver", &["hepatic"]),
];

const ASSAY_TERMS: &[&str] = &[
	"rna-seq",
	"scrna-seq",
	"chip-seq",
	"atac-seq",
	"wgs",
	"wes",
	"microarray",
	"proteomics",
	"methylation",
];

const ORGANISM_TERMS: &[&str] = &["human", "mouse", "rat", "zebrafish"];

const DISEASE_TERMS: &[&str] =
	&["cancer", "carcinoma", "tumor", "leukemia", "melanoma", "sarcoma", "glioma"];

static ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\b(?:GSE|GDS|GSM|SRP|SRR|PRJ[A-Z]{2})\d+\b").expect("Accession pattern is valid.")
});

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Expansion {
	pub expanded_text: String,
	pub added_terms: Vec<String>,
	pub entities: Vec<QueryEntity>,
	pub filter_hints: BTreeMap<String, String>,
}

/// Deterministic dictionary expansion plus light entity extraction. Original
/// tokens pass through unchanged and in order; deduplicated synonyms are
/// appended up to the [`MAX_EXPANSION_RATIO`] bound. Unknown tokens are left
/// alone and the function never fails.
pub fn expand(raw: &str) -> Expansion {
	let tokens = text::tokenize(raw);

	if tokens.is_empty() {
		return Expansion {
			expanded_text: raw.trim().to_string(),
			added_terms: Vec::new(),
			entities: Vec::new(),
			filter_hints: BTreeMap::new(),
		};
	}

	let phrases = candidate_phrases(&tokens);
	let mut budget = tokens.len() * MAX_EXPANSION_RATIO - tokens.len();
	let mut added = Vec::new();

	for phrase in &phrases {
		let Some((_, synonyms)) = ONTOLOGY.iter().find(|(key, _)| key == phrase) else {
			continue;
		};

		for synonym in *synonyms {
			let cost = text::tokenize(synonym).len();

			if cost > budget {
				continue;
			}
			if phrases.iter().any(|existing| existing == synonym)
				|| added.iter().any(|existing: &String| existing == synonym)
			{
				continue;
			}

			added.push(synonym.to_string());

			budget -= cost;
		}
	}

	let expanded_text = if added.is_empty() {
		raw.trim().to_string()
	} else {
		format!("{} {}", raw.trim(), added.join(" "))
	};
	let entities = extract_entities(raw, &phrases);
	let filter_hints = suggest_filters(&entities);

	Expansion { expanded_text, added_terms: added, entities, filter_hints }
}

/// Unigrams and bigrams over normalized tokens, joined the way ontology keys
/// are written. Hyphenated assay names tokenize to two words, so "rna seq"
/// is folded back to "rna-seq" before lookup.
fn candidate_phrases(tokens: &[String]) -> Vec<String> {
	let mut out = Vec::new();

	for token in tokens {
		push_unique(&mut out, token.clone());
	}
	for pair in tokens.windows(2) {
		push_unique(&mut out, format!("{} {}", pair[0], pair[1]));
		push_unique(&mut out, format!("{}-{}", pair[0], pair[1]));
	}

	out
}

fn push_unique(out: &mut Vec<String>, value: String) {
	if !out.contains(&value) {
		out.push(value);
	}
}

fn extract_entities(raw: &str, phrases: &[String]) -> Vec<QueryEntity> {
	let mut out = Vec::new();

	for phrase in phrases {
		let kind = if ASSAY_TERMS.contains(&phrase.as_str()) {
			Some(EntityKind::Assay)
		} else if ORGANISM_TERMS.contains(&phrase.as_str()) {
			Some(EntityKind::Organism)
		} else if DISEASE_TERMS.contains(&phrase.as_str()) {
			Some(EntityKind::Disease)
		} else {
			None
		};

		if let Some(kind) = kind {
			out.push(QueryEntity { kind, value: phrase.clone() });
		}
	}
	for capture in ACCESSION.find_iter(raw) {
		out.push(QueryEntity { kind: EntityKind::Accession, value: capture.as_str().to_string() });
	}

	out
}

/// Advisory only; the orchestrator decides whether any hint becomes a real
/// filter.
fn suggest_filters(entities: &[QueryEntity]) -> BTreeMap<String, String> {
	let mut out = BTreeMap::new();

	for entity in entities {
		let key = match entity.kind {
			EntityKind::Assay => "assay",
			EntityKind::Organism => "organism",
			EntityKind::Disease => "disease",
			EntityKind::Accession => "accession",
		};

		out.entry(key.to_string()).or_insert_with(|| entity.value.clone());
	}

	out
}
