use std::{collections::BTreeSet, time::Instant};

use policy_config::Benchmark;
use policy_domain::{decision::Decision, filter::RetrievalFilters};
use serde::{Deserialize, Serialize};

use crate::{Error, PolicyRetriever, Result, RetrievalRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalBenchmarkCase {
	pub case_id: String,
	pub question: String,
	#[serde(default)]
	pub expected_doc_ids: Vec<String>,
	#[serde(default)]
	pub filters: RetrievalFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalBenchmarkResult {
	pub case_id: String,
	pub recall_at_k: f64,
	pub reciprocal_rank: f64,
	pub latency_ms: f64,
	pub decision: Decision,
	pub top_doc_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalBenchmarkReport {
	pub top_k: u32,
	pub avg_recall_at_k: f64,
	pub avg_reciprocal_rank: f64,
	pub p95_latency_ms: f64,
	pub recall_floor: f64,
	pub latency_ceiling_ms: f64,
	pub meets_quality_gate: bool,
	pub results: Vec<RetrievalBenchmarkResult>,
}

/// Runs every case sequentially and scores the retrieved documents against expectations.
pub async fn run_retrieval_benchmarks(
	retriever: &PolicyRetriever,
	cases: &[RetrievalBenchmarkCase],
	top_k: u32,
	gate: &Benchmark,
) -> Result<RetrievalBenchmarkReport> {
	if cases.is_empty() {
		return Err(Error::InvalidRequest {
			message: "Benchmark requires at least one case.".to_string(),
		});
	}

	let mut results = Vec::with_capacity(cases.len());

	for case in cases {
		let request = RetrievalRequest::new(case.question.as_str())
			.with_filters(case.filters.clone())
			.with_top_k(top_k);
		let start = Instant::now();
		let response = retriever.retrieve(request).await?;
		let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;
		let mut top_doc_ids: Vec<String> = Vec::new();

		for chunk in &response.retrieved_chunks {
			if !top_doc_ids.contains(&chunk.doc_id) {
				top_doc_ids.push(chunk.doc_id.clone());
			}
		}

		let (recall_at_k, reciprocal_rank) = score_case(&case.expected_doc_ids, &top_doc_ids);

		tracing::debug!(
			case_id = %case.case_id,
			recall_at_k,
			reciprocal_rank,
			latency_ms,
			"Benchmark case finished."
		);

		results.push(RetrievalBenchmarkResult {
			case_id: case.case_id.clone(),
			recall_at_k,
			reciprocal_rank,
			latency_ms,
			decision: response.decision,
			top_doc_ids,
		});
	}

	let count = results.len() as f64;
	let avg_recall_at_k = results.iter().map(|result| result.recall_at_k).sum::<f64>() / count;
	let avg_reciprocal_rank =
		results.iter().map(|result| result.reciprocal_rank).sum::<f64>() / count;
	let mut latencies = results.iter().map(|result| result.latency_ms).collect::<Vec<_>>();

	latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

	let p95_latency_ms = percentile(&latencies, 0.95);
	let meets_quality_gate =
		avg_recall_at_k >= gate.recall_floor && p95_latency_ms <= gate.latency_ceiling_ms;

	tracing::info!(
		cases = results.len(),
		avg_recall_at_k,
		p95_latency_ms,
		meets_quality_gate,
		"Retrieval benchmark finished."
	);

	Ok(RetrievalBenchmarkReport {
		top_k,
		avg_recall_at_k,
		avg_reciprocal_rank,
		p95_latency_ms,
		recall_floor: gate.recall_floor,
		latency_ceiling_ms: gate.latency_ceiling_ms,
		meets_quality_gate,
		results,
	})
}

/// Recall over distinct expected documents and the reciprocal rank of the first hit.
///
/// A case with no expected documents is vacuously satisfied.
pub fn score_case(expected_doc_ids: &[String], top_doc_ids: &[String]) -> (f64, f64) {
	let expected = expected_doc_ids.iter().map(String::as_str).collect::<BTreeSet<_>>();

	if expected.is_empty() {
		return (1.0, 1.0);
	}

	let hits =
		expected.iter().filter(|doc_id| top_doc_ids.iter().any(|id| id.as_str() == **doc_id)).count();
	let reciprocal_rank = top_doc_ids
		.iter()
		.position(|doc_id| expected.contains(doc_id.as_str()))
		.map(|pos| 1.0 / (pos as f64 + 1.0))
		.unwrap_or(0.0);

	(hits as f64 / expected.len() as f64, reciprocal_rank)
}

/// Linear interpolation over ascending `values`.
pub fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
