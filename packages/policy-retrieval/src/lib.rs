pub mod benchmark;
pub mod index;
pub mod query;
pub mod ranking;
pub mod registry;
pub mod retrieve;

mod error;

pub use benchmark::{
	RetrievalBenchmarkCase, RetrievalBenchmarkReport, RetrievalBenchmarkResult,
	run_retrieval_benchmarks,
};
pub use error::{Error, Result};
pub use index::{
	IndexedChunk, RetrievalIndex, build_index, build_index_from_manifest, load_manifest,
};
pub use query::{QueryRewrite, fallback_query_rewrite};
pub use retrieve::{PolicyRetriever, RetrievalRequest, RetrievalResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use policy_domain::metrics::ProviderCallMetrics;
use policy_providers::rerank::RerankResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn provider_name(&self) -> &str;

	fn model(&self) -> &str;

	/// Returns one vector per input text, in input order.
	fn embed_documents<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, policy_providers::Result<Vec<Vec<f32>>>>;

	fn embed_query<'a>(
		&'a self,
		text: &'a str,
	) -> BoxFuture<'a, policy_providers::Result<Vec<f32>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn provider_name(&self) -> &str;

	fn model(&self) -> &str;

	/// Results reference positions in `candidates` and arrive in provider order.
	fn rerank<'a>(
		&'a self,
		query: &'a str,
		candidates: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, policy_providers::Result<RerankResponse>>;
}

pub trait QueryRewriter
where
	Self: Send + Sync,
{
	fn provider_name(&self) -> &str;

	fn model(&self) -> &str;

	fn rewrite<'a>(
		&'a self,
		question: &'a str,
	) -> BoxFuture<'a, policy_providers::Result<QueryRewrite>>;
}

#[derive(Debug, Clone)]
pub struct RerankResponse {
	pub results: Vec<RerankResult>,
	pub metrics: ProviderCallMetrics,
}

/// Optional scoring capabilities. A missing provider contributes no signal.
#[derive(Clone, Default)]
pub struct Providers {
	pub embedding: Option<Arc<dyn EmbeddingProvider>>,
	pub rerank: Option<Arc<dyn RerankProvider>>,
	pub query_rewriter: Option<Arc<dyn QueryRewriter>>,
}
impl Providers {
	pub fn new(
		embedding: Option<Arc<dyn EmbeddingProvider>>,
		rerank: Option<Arc<dyn RerankProvider>>,
		query_rewriter: Option<Arc<dyn QueryRewriter>>,
	) -> Self {
		Self { embedding, rerank, query_rewriter }
	}

	pub fn with_embedding(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
		self.embedding = Some(provider);

		self
	}

	pub fn with_rerank(mut self, provider: Arc<dyn RerankProvider>) -> Self {
		self.rerank = Some(provider);

		self
	}

	pub fn with_query_rewriter(mut self, provider: Arc<dyn QueryRewriter>) -> Self {
		self.query_rewriter = Some(provider);

		self
	}
}
