use std::{
	collections::HashMap,
	time::{Duration, Instant},
};

use policy_domain::{
	evidence::RetrievedChunk,
	metrics::{ProviderCallMetrics, RERANK_FAILED},
};
use policy_providers::rerank::RerankResult;

use crate::RerankProvider;

/// Result of one best-effort rerank pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
	/// The provider answered. `chunks` is empty when no result mapped onto a candidate.
	Reordered { chunks: Vec<RetrievedChunk>, metrics: ProviderCallMetrics },
	Failed { metrics: ProviderCallMetrics },
}
impl RerankOutcome {
	/// Final ranking plus the metric to record. `fallback` is used whenever the provider
	/// produced no usable ordering.
	pub fn resolve(
		self,
		fallback: Vec<RetrievedChunk>,
	) -> (Vec<RetrievedChunk>, ProviderCallMetrics) {
		match self {
			Self::Reordered { chunks, metrics } if !chunks.is_empty() => (chunks, metrics),
			Self::Reordered { metrics, .. } | Self::Failed { metrics } => (fallback, metrics),
		}
	}
}

/// Pre-rerank slice offered to the provider: `max(2 * top_k, top_k)` candidates.
pub fn rerank_window(pre_rerank: &[RetrievedChunk], top_k: usize) -> &[RetrievedChunk] {
	let limit = top_k.saturating_mul(2).max(top_k).min(pre_rerank.len());

	&pre_rerank[..limit]
}

/// Maps provider results back onto `candidates`.
///
/// Out-of-range indices are skipped and scores are clamped. A chunk returned more than once
/// keeps the position of its first occurrence and the score of its last.
pub fn apply_rerank(
	candidates: &[RetrievedChunk],
	results: &[RerankResult],
	top_k: usize,
) -> Vec<RetrievedChunk> {
	let mut positions = HashMap::new();
	let mut out: Vec<RetrievedChunk> = Vec::new();

	for result in results {
		let Some(candidate) = candidates.get(result.candidate_index) else {
			tracing::debug!(
				candidate_index = result.candidate_index,
				"Skipping out-of-range rerank result."
			);

			continue;
		};

		match positions.get(candidate.chunk_id.as_str()) {
			Some(&pos) => out[pos] = candidate.with_score(result.score),
			None => {
				positions.insert(candidate.chunk_id.as_str(), out.len());
				out.push(candidate.with_score(result.score));
			},
		}
	}

	out.truncate(top_k);

	out
}

/// Calls the provider under `timeout`. Every failure becomes `RerankOutcome::Failed`.
pub async fn rerank_candidates(
	provider: &dyn RerankProvider,
	query: &str,
	candidates: &[RetrievedChunk],
	top_k: usize,
	timeout: Duration,
) -> RerankOutcome {
	let docs = candidates.iter().map(|chunk| chunk.content.clone()).collect::<Vec<_>>();
	let start = Instant::now();
	let result = tokio::time::timeout(timeout, provider.rerank(query, &docs, top_k)).await;
	let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;
	let failed = || RerankOutcome::Failed {
		metrics: ProviderCallMetrics::error(
			provider.provider_name(),
			provider.model(),
			latency_ms,
			RERANK_FAILED,
		),
	};

	match result {
		Ok(Ok(response)) => RerankOutcome::Reordered {
			chunks: apply_rerank(candidates, &response.results, top_k),
			metrics: response.metrics,
		},
		Ok(Err(err)) => {
			tracing::warn!(
				error = %err,
				provider = provider.provider_name(),
				"Rerank failed. Keeping pre-rerank order."
			);

			failed()
		},
		Err(_) => {
			tracing::warn!(
				provider = provider.provider_name(),
				timeout_ms = timeout.as_millis() as u64,
				"Rerank timed out. Keeping pre-rerank order."
			);

			failed()
		},
	}
}
