use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Embedding provider returned {actual} vectors for {expected} chunks.")]
	EmbeddingCountMismatch { expected: usize, actual: usize },
	#[error("Chunk {chunk_id} has a {actual}-dimensional vector but the index uses {expected}.")]
	VectorDimensionMismatch { chunk_id: String, expected: usize, actual: usize },
	#[error("Chunk id {chunk_id} appears more than once.")]
	DuplicateChunkId { chunk_id: String },
	#[error("Failed to read manifest at {path:?}.")]
	ReadManifest { path: PathBuf, source: std::io::Error },
	#[error("Failed to parse manifest at {path:?}.")]
	ParseManifest { path: PathBuf, source: serde_json::Error },
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	Provider(#[from] policy_providers::Error),
	#[error(transparent)]
	Config(#[from] policy_config::Error),
}
