use std::{sync::Arc, time::Instant};

use policy_config::{Config, LlmProviderConfig, ProviderConfig};
use policy_domain::metrics::ProviderCallMetrics;
use policy_providers::{embedding, rerank, rewrite};

use crate::{
	BoxFuture, EmbeddingProvider, Providers, QueryRewrite, QueryRewriter, RerankProvider,
	RerankResponse, Result,
};

const DEFAULT_EMBEDDING_NAME: &str = "embedding-provider";
const DEFAULT_RERANK_NAME: &str = "rerank-provider";
const DEFAULT_REWRITER_NAME: &str = "query-rewriter";

pub struct HttpEmbeddingProvider {
	cfg: ProviderConfig,
}
impl HttpEmbeddingProvider {
	pub fn new(cfg: ProviderConfig) -> Self {
		Self { cfg }
	}
}
impl EmbeddingProvider for HttpEmbeddingProvider {
	fn provider_name(&self) -> &str {
		provider_label(&self.cfg.provider_id, DEFAULT_EMBEDDING_NAME)
	}

	fn model(&self) -> &str {
		&self.cfg.model
	}

	fn embed_documents<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, policy_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(&self.cfg, texts))
	}

	fn embed_query<'a>(
		&'a self,
		text: &'a str,
	) -> BoxFuture<'a, policy_providers::Result<Vec<f32>>> {
		Box::pin(async move {
			let vectors = embedding::embed(&self.cfg, &[text.to_string()]).await?;

			vectors.into_iter().next().ok_or_else(|| policy_providers::Error::InvalidResponse {
				message: "Embedding response contained no vectors.".to_string(),
			})
		})
	}
}

pub struct HttpRerankProvider {
	cfg: ProviderConfig,
}
impl HttpRerankProvider {
	pub fn new(cfg: ProviderConfig) -> Self {
		Self { cfg }
	}
}
impl RerankProvider for HttpRerankProvider {
	fn provider_name(&self) -> &str {
		provider_label(&self.cfg.provider_id, DEFAULT_RERANK_NAME)
	}

	fn model(&self) -> &str {
		&self.cfg.model
	}

	fn rerank<'a>(
		&'a self,
		query: &'a str,
		candidates: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, policy_providers::Result<RerankResponse>> {
		Box::pin(async move {
			let start = Instant::now();
			let results = rerank::rerank(&self.cfg, query, candidates, top_n).await?;
			let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;

			Ok(RerankResponse {
				results,
				metrics: ProviderCallMetrics::ok(self.provider_name(), self.model(), latency_ms),
			})
		})
	}
}

pub struct HttpQueryRewriter {
	cfg: LlmProviderConfig,
}
impl HttpQueryRewriter {
	pub fn new(cfg: LlmProviderConfig) -> Self {
		Self { cfg }
	}
}
impl QueryRewriter for HttpQueryRewriter {
	fn provider_name(&self) -> &str {
		provider_label(&self.cfg.provider_id, DEFAULT_REWRITER_NAME)
	}

	fn model(&self) -> &str {
		&self.cfg.model
	}

	fn rewrite<'a>(
		&'a self,
		question: &'a str,
	) -> BoxFuture<'a, policy_providers::Result<QueryRewrite>> {
		Box::pin(async move {
			let output = rewrite::rewrite(&self.cfg, question).await?;

			QueryRewrite::from_output(output).map_err(|err| policy_providers::Error::InvalidResponse {
				message: err.to_string(),
			})
		})
	}
}

impl Providers {
	/// Builds HTTP-backed providers for every endpoint whose mode enables it.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let providers = Self {
			embedding: resolve_embedding_provider(&cfg.providers.embedding)?,
			rerank: resolve_rerank_provider(&cfg.providers.rerank)?,
			query_rewriter: resolve_query_rewriter(&cfg.providers.query_rewriter)?,
		};

		tracing::info!(
			embedding = providers.embedding.is_some(),
			rerank = providers.rerank.is_some(),
			query_rewriter = providers.query_rewriter.is_some(),
			"Resolved retrieval providers."
		);

		Ok(providers)
	}
}

pub fn resolve_embedding_provider(
	cfg: &ProviderConfig,
) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
	if !is_enabled("embedding", &cfg.mode, &cfg.api_key)? {
		return Ok(None);
	}

	Ok(Some(Arc::new(HttpEmbeddingProvider::new(cfg.clone()))))
}

pub fn resolve_rerank_provider(cfg: &ProviderConfig) -> Result<Option<Arc<dyn RerankProvider>>> {
	if !is_enabled("rerank", &cfg.mode, &cfg.api_key)? {
		return Ok(None);
	}

	Ok(Some(Arc::new(HttpRerankProvider::new(cfg.clone()))))
}

pub fn resolve_query_rewriter(cfg: &LlmProviderConfig) -> Result<Option<Arc<dyn QueryRewriter>>> {
	if !is_enabled("query_rewriter", &cfg.mode, &cfg.api_key)? {
		return Ok(None);
	}

	Ok(Some(Arc::new(HttpQueryRewriter::new(cfg.clone()))))
}

/// `auto` enables the endpoint only when a key is present.
fn is_enabled(label: &str, mode: &str, api_key: &str) -> Result<bool> {
	match mode.trim().to_lowercase().as_str() {
		"none" => Ok(false),
		"http" => Ok(true),
		"auto" => Ok(!api_key.trim().is_empty()),
		other => Err(policy_config::Error::Validation {
			message: format!("providers.{label}.mode '{other}' must be one of auto, none, or http."),
		}
		.into()),
	}
}

fn provider_label<'a>(provider_id: &'a str, fallback: &'a str) -> &'a str {
	if provider_id.trim().is_empty() { fallback } else { provider_id }
}
