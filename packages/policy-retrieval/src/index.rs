use std::{
	collections::{BTreeSet, HashMap},
	fs,
	path::Path,
};

use policy_domain::{
	corpus::{ChunkRecord, CorpusManifest},
	text,
};

use crate::{EmbeddingProvider, Error, Result};

/// A chunk frozen into the index with its cached term set and optional embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
	pub record: ChunkRecord,
	pub tokens: Vec<String>,
	pub vector: Option<Vec<f32>>,
}
impl IndexedChunk {
	pub fn chunk_id(&self) -> &str {
		&self.record.chunk_id
	}
}

/// Immutable in-memory index. Chunks are held in `(doc_id, chunk_index, chunk_id)` order.
#[derive(Debug, Clone, Default)]
pub struct RetrievalIndex {
	version_tag: Option<String>,
	chunks: Vec<IndexedChunk>,
	postings: HashMap<String, Vec<String>>,
	lookup: HashMap<String, usize>,
	vector_dim: usize,
}
impl RetrievalIndex {
	pub fn version_tag(&self) -> Option<&str> {
		self.version_tag.as_deref()
	}

	pub fn chunks(&self) -> &[IndexedChunk] {
		&self.chunks
	}

	pub fn len(&self) -> usize {
		self.chunks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}

	pub fn chunk(&self, chunk_id: &str) -> Option<&IndexedChunk> {
		self.lookup.get(chunk_id).map(|&pos| &self.chunks[pos])
	}

	/// Chunk ids containing `token`, sorted ascending.
	pub fn postings(&self, token: &str) -> &[String] {
		self.postings.get(token).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Zero when no chunk carries a vector.
	pub fn vector_dim(&self) -> usize {
		self.vector_dim
	}

	pub fn has_vectors(&self) -> bool {
		self.vector_dim > 0
	}

	/// Chunks sharing at least one term with `tokens`, in index order.
	pub fn lexical_candidates(&self, tokens: &[String]) -> Vec<&IndexedChunk> {
		let mut positions = BTreeSet::new();

		for token in tokens {
			for chunk_id in self.postings(token) {
				if let Some(&pos) = self.lookup.get(chunk_id) {
					positions.insert(pos);
				}
			}
		}

		positions.into_iter().map(|pos| &self.chunks[pos]).collect()
	}
}

pub async fn build_index(
	chunks: Vec<ChunkRecord>,
	embedding: Option<&dyn EmbeddingProvider>,
) -> Result<RetrievalIndex> {
	let mut ordered = chunks;

	ordered.sort_by(|a, b| {
		a.doc_id
			.cmp(&b.doc_id)
			.then(a.chunk_index.cmp(&b.chunk_index))
			.then_with(|| a.chunk_id.cmp(&b.chunk_id))
	});

	let mut lookup = HashMap::with_capacity(ordered.len());

	for (pos, record) in ordered.iter().enumerate() {
		if lookup.insert(record.chunk_id.clone(), pos).is_some() {
			return Err(Error::DuplicateChunkId { chunk_id: record.chunk_id.clone() });
		}
	}

	let vectors = embed_chunks(&ordered, embedding).await?;
	let mut vector_dim = None;

	for (record, vector) in ordered.iter().zip(&vectors) {
		let Some(vector) = vector else { continue };

		match vector_dim {
			None => vector_dim = Some(vector.len()),
			Some(expected) if expected != vector.len() => {
				return Err(Error::VectorDimensionMismatch {
					chunk_id: record.chunk_id.clone(),
					expected,
					actual: vector.len(),
				});
			},
			Some(_) => {},
		}
	}

	let mut postings: HashMap<String, Vec<String>> = HashMap::new();
	let mut indexed = Vec::with_capacity(ordered.len());

	for (record, vector) in ordered.into_iter().zip(vectors) {
		let tokens = text::token_set(&record.content);

		for token in &tokens {
			postings.entry(token.clone()).or_default().push(record.chunk_id.clone());
		}

		indexed.push(IndexedChunk { record, tokens, vector });
	}

	for chunk_ids in postings.values_mut() {
		chunk_ids.sort();
	}

	let index = RetrievalIndex {
		version_tag: None,
		chunks: indexed,
		postings,
		lookup,
		vector_dim: vector_dim.unwrap_or(0),
	};

	tracing::info!(
		chunk_count = index.len(),
		term_count = index.postings.len(),
		vector_dim = index.vector_dim,
		"Built retrieval index."
	);

	Ok(index)
}

pub async fn build_index_from_manifest(
	manifest: CorpusManifest,
	embedding: Option<&dyn EmbeddingProvider>,
) -> Result<RetrievalIndex> {
	let CorpusManifest { version_tag, chunk_count, chunks, .. } = manifest;

	if chunk_count as usize != chunks.len() {
		tracing::warn!(
			version_tag = %version_tag,
			declared = chunk_count,
			actual = chunks.len(),
			"Manifest chunk_count does not match its chunk list."
		);
	}

	let mut index = build_index(chunks, embedding).await?;

	index.version_tag = Some(version_tag);

	Ok(index)
}

pub fn load_manifest(path: &Path) -> Result<CorpusManifest> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadManifest { path: path.to_path_buf(), source: err })?;

	serde_json::from_str(&raw)
		.map_err(|err| Error::ParseManifest { path: path.to_path_buf(), source: err })
}

async fn embed_chunks(
	ordered: &[ChunkRecord],
	embedding: Option<&dyn EmbeddingProvider>,
) -> Result<Vec<Option<Vec<f32>>>> {
	let Some(provider) = embedding else { return Ok(vec![None; ordered.len()]) };

	if ordered.is_empty() {
		return Ok(Vec::new());
	}

	let texts = ordered.iter().map(|record| record.content.clone()).collect::<Vec<_>>();
	let vectors = provider.embed_documents(&texts).await?;

	if vectors.len() != ordered.len() {
		return Err(Error::EmbeddingCountMismatch {
			expected: ordered.len(),
			actual: vectors.len(),
		});
	}

	Ok(vectors.into_iter().map(Some).collect())
}
