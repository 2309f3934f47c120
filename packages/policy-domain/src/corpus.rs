use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One chunk emitted by ingestion. Identity is `chunk_id`; ordering is `(doc_id, chunk_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
	pub chunk_id: String,
	pub doc_id: String,
	pub version_tag: String,
	pub chunk_index: u32,
	pub content: String,
	#[serde(default)]
	pub metadata: BTreeMap<String, String>,
}

/// Versioned corpus snapshot as written by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusManifest {
	pub version_tag: String,
	pub manifest_hash: String,
	pub doc_count: u32,
	pub chunk_count: u32,
	#[serde(default)]
	pub metadata_coverage: BTreeMap<String, f64>,
	#[serde(default)]
	pub chunks: Vec<ChunkRecord>,
}
