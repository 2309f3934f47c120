//! Deterministic providers and a small policy corpus for retrieval tests.

use std::{
	collections::BTreeMap,
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration,
};

use policy_domain::{
	corpus::{ChunkRecord, CorpusManifest},
	metrics::ProviderCallMetrics,
};
use policy_providers::{Error, Result, rerank::RerankResult};
use policy_retrieval::{
	BoxFuture, EmbeddingProvider, QueryRewrite, QueryRewriter, RerankProvider, RerankResponse,
};

pub const SAMPLE_VERSION_TAG: &str = "week-03-v1";
pub const STUB_PROVIDER: &str = "siliconflow";

pub fn chunk(
	chunk_id: &str,
	doc_id: &str,
	chunk_index: u32,
	content: &str,
	metadata: &[(&str, &str)],
) -> ChunkRecord {
	ChunkRecord {
		chunk_id: chunk_id.to_string(),
		doc_id: doc_id.to_string(),
		version_tag: SAMPLE_VERSION_TAG.to_string(),
		chunk_index,
		content: content.to_string(),
		metadata: metadata
			.iter()
			.map(|(key, value)| (key.to_string(), value.to_string()))
			.collect::<BTreeMap<_, _>>(),
	}
}

/// Two expense chunks (US) and one vendor chunk (EU).
pub fn sample_chunks() -> Vec<ChunkRecord> {
	vec![
		chunk(
			"chunk-expense-0",
			"expense-policy-v1",
			0,
			"Expense reimbursement requires manager approval with receipt evidence.",
			&[("jurisdiction", "US"), ("policy_scope", "expense,reimbursement"), ("section", "4.2")],
		),
		chunk(
			"chunk-expense-1",
			"expense-policy-v1",
			1,
			"Travel expenses above threshold require director signoff.",
			&[("jurisdiction", "US"), ("policy_scope", "expense,travel"), ("section", "4.3")],
		),
		chunk(
			"chunk-vendor-0",
			"vendor-policy-v2",
			0,
			"Vendor data sharing in EU requires DPA and legal review.",
			&[("jurisdiction", "EU"), ("policy_scope", "vendor,privacy"), ("section", "7.1")],
		),
	]
}

pub fn sample_manifest() -> CorpusManifest {
	let chunks = sample_chunks();

	CorpusManifest {
		version_tag: SAMPLE_VERSION_TAG.to_string(),
		manifest_hash: "a".repeat(64),
		doc_count: 2,
		chunk_count: chunks.len() as u32,
		metadata_coverage: BTreeMap::from([
			("doc_id".to_string(), 1.0),
			("effective_date".to_string(), 1.0),
			("jurisdiction".to_string(), 1.0),
			("owner".to_string(), 1.0),
		]),
		chunks,
	}
}

/// Keyword vectors: expense content points at `[1, 0]`, travel content leans toward it, and
/// everything else points at `[0, 1]`. Queries mentioning vendors point at `[0, 1]`.
#[derive(Debug, Default)]
pub struct KeywordEmbedding;
impl KeywordEmbedding {
	fn document_vector(text: &str) -> Vec<f32> {
		if text.contains("Expense") {
			vec![1.0, 0.0]
		} else if text.contains("Travel") {
			vec![0.8, 0.2]
		} else {
			vec![0.0, 1.0]
		}
	}

	fn query_vector(text: &str) -> Vec<f32> {
		if text.to_lowercase().contains("vendor") { vec![0.0, 1.0] } else { vec![1.0, 0.0] }
	}
}
impl EmbeddingProvider for KeywordEmbedding {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"mock-embedding-model"
	}

	fn embed_documents<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|text| Self::document_vector(text)).collect()) })
	}

	fn embed_query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(Self::query_vector(text)) })
	}
}

/// Returns exactly the configured vectors, whatever the input.
#[derive(Debug, Clone)]
pub struct FixedEmbedding {
	pub documents: Vec<Vec<f32>>,
	pub query: Vec<f32>,
}
impl EmbeddingProvider for FixedEmbedding {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"fixed-embedding-model"
	}

	fn embed_documents<'a>(&'a self, _texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(self.documents.clone()) })
	}

	fn embed_query<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(self.query.clone()) })
	}
}

/// Keyword vectors for documents; query embedding fails whenever the query contains
/// `fail_on`.
#[derive(Debug, Clone)]
pub struct FlakyEmbedding {
	pub fail_on: String,
}
impl EmbeddingProvider for FlakyEmbedding {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"mock-embedding-model"
	}

	fn embed_documents<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			Ok(texts.iter().map(|text| KeywordEmbedding::document_vector(text)).collect())
		})
	}

	fn embed_query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			if text.contains(self.fail_on.as_str()) {
				return Err(Error::InvalidResponse {
					message: "Simulated embedding failure.".to_string(),
				});
			}

			Ok(KeywordEmbedding::query_vector(text))
		})
	}
}

/// Keyword vectors; query embedding sleeps for `delay` whenever the query contains `slow_on`.
#[derive(Debug, Clone)]
pub struct SlowEmbedding {
	pub slow_on: String,
	pub delay: Duration,
}
impl EmbeddingProvider for SlowEmbedding {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"mock-embedding-model"
	}

	fn embed_documents<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			Ok(texts.iter().map(|text| KeywordEmbedding::document_vector(text)).collect())
		})
	}

	fn embed_query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			if text.contains(self.slow_on.as_str()) {
				tokio::time::sleep(self.delay).await;
			}

			Ok(KeywordEmbedding::query_vector(text))
		})
	}
}

/// Returns the configured results and counts calls.
#[derive(Debug, Default)]
pub struct FixedRerank {
	results: Vec<RerankResult>,
	calls: AtomicUsize,
}
impl FixedRerank {
	pub fn new(results: Vec<RerankResult>) -> Self {
		Self { results, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl RerankProvider for FixedRerank {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"mock-rerank-model"
	}

	fn rerank<'a>(
		&'a self,
		_query: &'a str,
		_candidates: &'a [String],
		_top_n: usize,
	) -> BoxFuture<'a, Result<RerankResponse>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(RerankResponse {
				results: self.results.clone(),
				metrics: ProviderCallMetrics::ok(self.provider_name(), self.model(), 8.2),
			})
		})
	}
}

#[derive(Debug, Default)]
pub struct FailingRerank;
impl RerankProvider for FailingRerank {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"mock-rerank-model"
	}

	fn rerank<'a>(
		&'a self,
		_query: &'a str,
		_candidates: &'a [String],
		_top_n: usize,
	) -> BoxFuture<'a, Result<RerankResponse>> {
		Box::pin(async move {
			Err(Error::InvalidResponse {
				message: "Rerank response is missing results array.".to_string(),
			})
		})
	}
}

/// Sleeps for `delay` before answering with an empty result list.
#[derive(Debug, Clone)]
pub struct SlowRerank {
	pub delay: Duration,
}
impl RerankProvider for SlowRerank {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"mock-rerank-model"
	}

	fn rerank<'a>(
		&'a self,
		_query: &'a str,
		_candidates: &'a [String],
		_top_n: usize,
	) -> BoxFuture<'a, Result<RerankResponse>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			Ok(RerankResponse {
				results: Vec::new(),
				metrics: ProviderCallMetrics::ok(
					self.provider_name(),
					self.model(),
					self.delay.as_secs_f64() * 1_000.0,
				),
			})
		})
	}
}

#[derive(Debug, Clone)]
pub struct StaticRewriter {
	pub rewrite: QueryRewrite,
}
impl QueryRewriter for StaticRewriter {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"mock-chat-model"
	}

	fn rewrite<'a>(&'a self, _question: &'a str) -> BoxFuture<'a, Result<QueryRewrite>> {
		Box::pin(async move { Ok(self.rewrite.clone()) })
	}
}

#[derive(Debug, Default)]
pub struct FailingRewriter;
impl QueryRewriter for FailingRewriter {
	fn provider_name(&self) -> &str {
		STUB_PROVIDER
	}

	fn model(&self) -> &str {
		"mock-chat-model"
	}

	fn rewrite<'a>(&'a self, _question: &'a str) -> BoxFuture<'a, Result<QueryRewrite>> {
		Box::pin(async move {
			Err(Error::InvalidResponse {
				message: "Query rewrite response is not valid JSON.".to_string(),
			})
		})
	}
}
