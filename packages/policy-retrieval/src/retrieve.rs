use std::{
	collections::HashMap,
	sync::Arc,
	time::{Duration, Instant},
};

use policy_config::{Config, RetrieverProfile};
use policy_domain::{
	audit::{
		self, AuditEvent, AuditEventArgs, STAGE_QUERY_REWRITE, STAGE_RETRIEVAL_RANK, STATUS_OK,
	},
	decision::{self, Decision},
	evidence::{Citation, RetrievedChunk},
	filter::RetrievalFilters,
	metrics::{ProviderCallMetrics, QUERY_REWRITE_FAILED},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
	Error, Providers, QueryRewrite, Result, RetrievalIndex, query,
	ranking::{self, VariantEmbedding},
};

pub const ACTOR_QUERY_REWRITER: &str = "retrieval.query_rewriter";
pub const ACTOR_RETRIEVER: &str = "retrieval.retriever";

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalRequest {
	pub question: String,
	#[serde(default)]
	pub filters: RetrievalFilters,
	/// Overrides the profile's `top_k`.
	#[serde(default)]
	pub top_k: Option<u32>,
	/// Overrides the profile's answer threshold.
	#[serde(default)]
	pub min_score_for_answer: Option<f32>,
	#[serde(default)]
	pub trace_id: Option<String>,
}
impl RetrievalRequest {
	pub fn new(question: impl Into<String>) -> Self {
		Self { question: question.into(), ..Self::default() }
	}

	pub fn with_filters(mut self, filters: RetrievalFilters) -> Self {
		self.filters = filters;

		self
	}

	pub fn with_top_k(mut self, top_k: u32) -> Self {
		self.top_k = Some(top_k);

		self
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResponse {
	pub trace_id: String,
	pub question: String,
	pub normalized_query: String,
	pub decision: Decision,
	pub citations: Vec<Citation>,
	pub retrieved_chunks: Vec<RetrievedChunk>,
	pub provider_metrics: Vec<ProviderCallMetrics>,
	pub audit_events: Vec<AuditEvent>,
}

/// Ranks evidence from a shared, read-only index.
#[derive(Clone)]
pub struct PolicyRetriever {
	index: Arc<RetrievalIndex>,
	providers: Providers,
	profile: RetrieverProfile,
	provider_timeout: Duration,
}
impl PolicyRetriever {
	pub fn new(index: Arc<RetrievalIndex>, providers: Providers) -> Self {
		Self {
			index,
			providers,
			profile: RetrieverProfile::default(),
			provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
		}
	}

	/// Uses the named profile, or the configured default when `profile` is `None`.
	pub fn from_config(
		cfg: &Config,
		index: Arc<RetrievalIndex>,
		providers: Providers,
		profile: Option<&str>,
	) -> Result<Self> {
		let profile = *cfg.profile(profile)?;

		Ok(Self::new(index, providers)
			.with_profile(profile)
			.with_provider_timeout(Duration::from_millis(cfg.retrieval.provider_timeout_ms)))
	}

	pub fn with_profile(mut self, profile: RetrieverProfile) -> Self {
		self.profile = profile;

		self
	}

	pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
		self.provider_timeout = timeout;

		self
	}

	pub fn index(&self) -> &RetrievalIndex {
		&self.index
	}

	pub fn profile(&self) -> RetrieverProfile {
		self.profile
	}

	pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResponse> {
		let RetrievalRequest { question, filters, top_k, min_score_for_answer, trace_id } = request;
		let question = query::normalize_question(&question)?;
		let top_k = top_k.unwrap_or(self.profile.top_k);

		if top_k == 0 {
			return Err(Error::InvalidRequest {
				message: "top_k must be greater than zero.".to_string(),
			});
		}

		let min_score = min_score_for_answer.unwrap_or(self.profile.min_score_for_answer);

		if !min_score.is_finite() || !(0.0..=1.0).contains(&min_score) {
			return Err(Error::InvalidRequest {
				message: "min_score_for_answer must be in the range 0.0-1.0.".to_string(),
			});
		}

		let trace_id = trace_id
			.map(|value| value.trim().to_string())
			.filter(|value| !value.is_empty())
			.unwrap_or_else(|| Uuid::new_v4().to_string());
		let mut provider_metrics = Vec::new();
		let rewrite = self.rewrite_query(&question, &mut provider_metrics).await?;
		let queries = ranking::dedupe_queries(&rewrite);
		let rewrite_output = audit::canonical_json(&serde_json::to_value(&rewrite)?);
		let mut audit_events = vec![audit::build_audit_event(AuditEventArgs {
			trace_id: &trace_id,
			stage: STAGE_QUERY_REWRITE,
			actor: ACTOR_QUERY_REWRITER,
			status: STATUS_OK,
			input_payload: &question,
			output_payload: &rewrite_output,
			metadata: Map::new(),
		})];
		let limit = top_k as usize;
		let pre_rerank = self.rank_variants(&queries, &filters, &mut provider_metrics).await;
		let fallback = pre_rerank.iter().take(limit).cloned().collect::<Vec<_>>();
		let retrieved_chunks = match self.providers.rerank.as_deref() {
			Some(provider) if !pre_rerank.is_empty() => {
				let window = ranking::rerank_window(&pre_rerank, limit);
				let outcome = ranking::rerank_candidates(
					provider,
					&rewrite.normalized_query,
					window,
					limit,
					self.provider_timeout,
				)
				.await;
				let (chunks, metrics) = outcome.resolve(fallback);

				provider_metrics.push(metrics);

				chunks
			},
			_ => fallback,
		};
		let decision = decision::choose_decision(
			retrieved_chunks.first().map(|chunk| chunk.retrieval_score),
			min_score,
		);
		let citations = retrieved_chunks.iter().map(RetrievedChunk::citation).collect::<Vec<_>>();
		let provider_errors = provider_metrics.iter().filter(|metrics| metrics.is_error()).count();
		let rank_input = serde_json::json!({
			"filters": serde_json::to_value(&filters)?,
			"queries": queries,
			"top_k": top_k,
		});
		let rank_output = serde_json::json!({
			"chunk_ids": retrieved_chunks.iter().map(|chunk| chunk.chunk_id.as_str()).collect::<Vec<_>>(),
			"decision": decision.as_str(),
		});
		let mut rank_metadata = Map::new();

		rank_metadata.insert("provider_call_count".to_string(), Value::from(provider_metrics.len()));
		rank_metadata.insert("provider_errors".to_string(), Value::from(provider_errors));

		audit_events.push(audit::build_audit_event(AuditEventArgs {
			trace_id: &trace_id,
			stage: STAGE_RETRIEVAL_RANK,
			actor: ACTOR_RETRIEVER,
			status: STATUS_OK,
			input_payload: &audit::canonical_json(&rank_input),
			output_payload: &audit::canonical_json(&rank_output),
			metadata: rank_metadata,
		}));

		tracing::info!(
			trace_id = %trace_id,
			decision = decision.as_str(),
			variants = queries.len(),
			candidates = pre_rerank.len(),
			returned = retrieved_chunks.len(),
			provider_errors,
			"Retrieval completed."
		);

		Ok(RetrievalResponse {
			trace_id,
			question,
			normalized_query: rewrite.normalized_query,
			decision,
			citations,
			retrieved_chunks,
			provider_metrics,
			audit_events,
		})
	}

	async fn rewrite_query(
		&self,
		question: &str,
		provider_metrics: &mut Vec<ProviderCallMetrics>,
	) -> Result<QueryRewrite> {
		let Some(rewriter) = self.providers.query_rewriter.as_deref() else {
			return query::fallback_query_rewrite(question);
		};
		let start = Instant::now();
		let result = tokio::time::timeout(self.provider_timeout, rewriter.rewrite(question)).await;
		let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;

		// Rewriter output is re-validated; public fields allow a blank query through.
		let outcome = match result {
			Ok(Ok(rewrite)) =>
				QueryRewrite::new(&rewrite.normalized_query, &rewrite.expanded_queries)
					.map_err(|err| err.to_string()),
			Ok(Err(err)) => Err(err.to_string()),
			Err(_) => Err(format!(
				"Timed out after {} ms.",
				self.provider_timeout.as_millis()
			)),
		};

		match outcome {
			Ok(rewrite) => {
				provider_metrics.push(ProviderCallMetrics::ok(
					rewriter.provider_name(),
					rewriter.model(),
					latency_ms,
				));

				Ok(rewrite)
			},
			Err(reason) => {
				tracing::warn!(
					error = %reason,
					provider = rewriter.provider_name(),
					"Query rewrite failed. Using rule-based rewrite."
				);

				provider_metrics.push(ProviderCallMetrics::error(
					rewriter.provider_name(),
					rewriter.model(),
					latency_ms,
					QUERY_REWRITE_FAILED,
				));

				query::fallback_query_rewrite(question)
			},
		}
	}

	async fn rank_variants(
		&self,
		queries: &[String],
		filters: &RetrievalFilters,
		provider_metrics: &mut Vec<ProviderCallMetrics>,
	) -> Vec<RetrievedChunk> {
		let embedding = self.providers.embedding.as_deref().filter(|_| self.index.has_vectors());
		let mut best = HashMap::new();

		for query in queries {
			let embedded = match embedding {
				Some(provider) => {
					let (embedded, metrics) =
						ranking::embed_variant(provider, query, self.provider_timeout).await;

					provider_metrics.push(metrics);

					embedded
				},
				None => VariantEmbedding::Skipped,
			};
			let scored = ranking::score_variant(&self.index, filters, query, embedded.vector());

			ranking::merge_best(&mut best, scored);
		}

		ranking::rank_candidates(best)
	}
}
