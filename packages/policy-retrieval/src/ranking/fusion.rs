use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
	time::{Duration, Instant},
};

use policy_domain::{
	evidence::{RetrievedChunk, clamp_unit},
	filter::RetrievalFilters,
	metrics::{EMBED_QUERY_FAILED, ProviderCallMetrics},
	text,
};

use crate::{EmbeddingProvider, IndexedChunk, QueryRewrite, RetrievalIndex, ranking::scoring};

/// Per-variant query embedding. `Failed` and `Skipped` both score lexically.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantEmbedding {
	Skipped,
	Embedded(Vec<f32>),
	Failed,
}
impl VariantEmbedding {
	pub fn vector(&self) -> Option<&[f32]> {
		match self {
			Self::Embedded(vector) => Some(vector),
			Self::Skipped | Self::Failed => None,
		}
	}
}

/// Normalized query first, then paraphrases, with blanks and repeats dropped.
pub fn dedupe_queries(rewrite: &QueryRewrite) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for query in std::iter::once(&rewrite.normalized_query).chain(&rewrite.expanded_queries) {
		let normalized = text::normalize_whitespace(query);

		if normalized.is_empty() || !seen.insert(normalized.clone()) {
			continue;
		}

		out.push(normalized);
	}

	out
}

/// Embeds one query variant under `timeout`. Failures never propagate.
pub async fn embed_variant(
	provider: &dyn EmbeddingProvider,
	query: &str,
	timeout: Duration,
) -> (VariantEmbedding, ProviderCallMetrics) {
	let start = Instant::now();
	let result = tokio::time::timeout(timeout, provider.embed_query(query)).await;
	let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;

	match result {
		Ok(Ok(vector)) => (
			VariantEmbedding::Embedded(vector),
			ProviderCallMetrics::ok(provider.provider_name(), provider.model(), latency_ms),
		),
		Ok(Err(err)) => {
			tracing::warn!(error = %err, provider = provider.provider_name(), "Query embedding failed.");

			(VariantEmbedding::Failed, embed_failure(provider, latency_ms))
		},
		Err(_) => {
			tracing::warn!(
				provider = provider.provider_name(),
				timeout_ms = timeout.as_millis() as u64,
				"Query embedding timed out."
			);

			(VariantEmbedding::Failed, embed_failure(provider, latency_ms))
		},
	}
}

/// Filters and scores the index for one query variant. Only positive scores survive.
pub fn score_variant(
	index: &RetrievalIndex,
	filters: &RetrievalFilters,
	query: &str,
	query_vector: Option<&[f32]>,
) -> Vec<RetrievedChunk> {
	let query_tokens = text::token_set(query);
	let pool: Vec<&IndexedChunk> = if query_vector.is_some() && index.has_vectors() {
		index.chunks().iter().collect()
	} else {
		index.lexical_candidates(&query_tokens)
	};
	let mut out = Vec::new();

	for chunk in pool {
		if !filters.matches(&chunk.record.metadata) {
			continue;
		}

		let (lexical, matched_terms) = scoring::lexical_score(&query_tokens, &chunk.tokens);
		let vector = scoring::vector_score(query_vector, chunk.vector.as_deref());
		let score = scoring::fuse(lexical, vector);

		if score <= 0.0 || score.is_nan() {
			continue;
		}

		out.push(to_retrieved(chunk, score, matched_terms));
	}

	out
}

/// Keeps the best score per chunk. An equal score never replaces the earlier variant's entry.
pub fn merge_best(best: &mut HashMap<String, RetrievedChunk>, candidates: Vec<RetrievedChunk>) {
	for candidate in candidates {
		match best.get(&candidate.chunk_id) {
			Some(current) if candidate.retrieval_score <= current.retrieval_score => {},
			_ => {
				best.insert(candidate.chunk_id.clone(), candidate);
			},
		}
	}
}

/// Orders by descending score, then `(doc_id, chunk_index, chunk_id)`.
pub fn rank_candidates(best: HashMap<String, RetrievedChunk>) -> Vec<RetrievedChunk> {
	let mut ranked = best.into_values().collect::<Vec<_>>();

	ranked.sort_by(|a, b| {
		cmp_f32_desc(a.retrieval_score, b.retrieval_score)
			.then_with(|| a.doc_id.cmp(&b.doc_id))
			.then(a.chunk_index.cmp(&b.chunk_index))
			.then_with(|| a.chunk_id.cmp(&b.chunk_id))
	});

	ranked
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn to_retrieved(chunk: &IndexedChunk, score: f32, matched_terms: Vec<String>) -> RetrievedChunk {
	let record = &chunk.record;

	RetrievedChunk {
		chunk_id: record.chunk_id.clone(),
		doc_id: record.doc_id.clone(),
		version_tag: record.version_tag.clone(),
		chunk_index: record.chunk_index,
		content: record.content.clone(),
		retrieval_score: clamp_unit(score),
		matched_terms,
		metadata: record.metadata.clone(),
	}
}

fn embed_failure(provider: &dyn EmbeddingProvider, latency_ms: f64) -> ProviderCallMetrics {
	ProviderCallMetrics::error(
		provider.provider_name(),
		provider.model(),
		latency_ms,
		EMBED_QUERY_FAILED,
	)
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	fn chunk(chunk_id: &str, doc_id: &str, chunk_index: u32, score: f32) -> RetrievedChunk {
		RetrievedChunk {
			chunk_id: chunk_id.to_string(),
			doc_id: doc_id.to_string(),
			version_tag: "v1".to_string(),
			chunk_index,
			content: format!("content of {chunk_id}"),
			retrieval_score: score,
			matched_terms: Vec::new(),
			metadata: BTreeMap::new(),
		}
	}

	#[test]
	fn dedupe_keeps_first_occurrence_order() {
		let rewrite = QueryRewrite {
			normalized_query: "vendor  data sharing".to_string(),
			expanded_queries: vec![
				"vendor data sharing".to_string(),
				"  ".to_string(),
				"third party data sharing policy".to_string(),
			],
		};

		assert_eq!(
			dedupe_queries(&rewrite),
			vec!["vendor data sharing".to_string(), "third party data sharing policy".to_string()]
		);
	}

	#[test]
	fn merge_replaces_only_on_strictly_greater_score() {
		let mut best = HashMap::new();
		let mut first = chunk("c1", "doc-a", 0, 0.5);

		first.matched_terms = vec!["first".to_string()];

		merge_best(&mut best, vec![first]);

		let mut tie = chunk("c1", "doc-a", 0, 0.5);

		tie.matched_terms = vec!["tie".to_string()];

		merge_best(&mut best, vec![tie]);

		assert_eq!(best["c1"].matched_terms, vec!["first".to_string()]);

		merge_best(&mut best, vec![chunk("c1", "doc-a", 0, 0.75)]);

		assert_eq!(best["c1"].retrieval_score, 0.75);
	}

	#[test]
	fn ties_break_on_doc_then_chunk_index() {
		let best = HashMap::from([
			("c3".to_string(), chunk("c3", "doc-b", 0, 0.5)),
			("c2".to_string(), chunk("c2", "doc-a", 1, 0.5)),
			("c1".to_string(), chunk("c1", "doc-a", 0, 0.5)),
			("c4".to_string(), chunk("c4", "doc-z", 9, 0.9)),
		]);
		let ids = rank_candidates(best)
			.into_iter()
			.map(|item| item.chunk_id)
			.collect::<Vec<_>>();

		assert_eq!(ids, vec!["c4", "c1", "c2", "c3"]);
	}

	#[test]
	fn cmp_f32_desc_orders_nan_last() {
		let mut values = [0.2, f32::NAN, 0.9, 0.5];

		values.sort_by(|a, b| cmp_f32_desc(*a, *b));

		assert_eq!(&values[..3], &[0.9, 0.5, 0.2]);
		assert!(values[3].is_nan());
	}
}
