use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SECTION_KEY: &str = "section";
pub const QUOTE_SPAN_CHARS: usize = 160;

/// A ranked chunk admitted as grounding evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
	pub chunk_id: String,
	pub doc_id: String,
	pub version_tag: String,
	pub chunk_index: u32,
	pub content: String,
	pub retrieval_score: f32,
	pub matched_terms: Vec<String>,
	pub metadata: BTreeMap<String, String>,
}
impl RetrievedChunk {
	/// Returns a copy carrying `score` clamped to the unit range.
	pub fn with_score(&self, score: f32) -> Self {
		Self { retrieval_score: clamp_unit(score), ..self.clone() }
	}

	pub fn citation(&self) -> Citation {
		let section = self
			.metadata
			.get(SECTION_KEY)
			.map(|value| value.trim())
			.filter(|value| !value.is_empty())
			.map(str::to_string)
			.unwrap_or_else(|| format!("chunk-{}", self.chunk_index));

		Citation {
			doc_id: self.doc_id.clone(),
			section,
			chunk_id: self.chunk_id.clone(),
			quote_span: self.content.chars().take(QUOTE_SPAN_CHARS).collect(),
			retrieval_score: self.retrieval_score,
			version: self.version_tag.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
	pub doc_id: String,
	pub section: String,
	pub chunk_id: String,
	pub quote_span: String,
	pub retrieval_score: f32,
	pub version: String,
}

/// Clamps to `[0, 1]`. NaN maps to zero.
pub fn clamp_unit(score: f32) -> f32 {
	if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}
