use policy_config::ProviderConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// One reranked candidate, addressed by its position in the request's document list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankResult {
	pub candidate_index: usize,
	pub score: f32,
}

/// Scores `docs` against `query` through a hosted `/rerank` endpoint.
///
/// Results keep the provider's order.
pub async fn rerank(
	cfg: &ProviderConfig,
	query: &str,
	docs: &[String],
	top_n: usize,
) -> Result<Vec<RerankResult>> {
	if top_n == 0 {
		return Err(Error::InvalidRequest {
			message: "top_n must be greater than zero.".to_string(),
		});
	}
	if docs.is_empty() {
		return Ok(Vec::new());
	}

	let client = crate::http_client(cfg.timeout_ms)?;
	let url = crate::endpoint_url(&cfg.api_base, &cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"query": query,
		"documents": docs,
		"top_n": top_n.min(docs.len()),
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json)
}

/// Malformed items are skipped; a missing results array fails the whole response.
pub fn parse_rerank_response(json: Value) -> Result<Vec<RerankResult>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Rerank response is missing results array.".to_string(),
		})?;
	let mut out = Vec::with_capacity(results.len());

	for item in results {
		let Some(index) = item.get("index").and_then(|v| v.as_u64()) else {
			tracing::debug!("Skipping rerank item without integer index.");

			continue;
		};
		let Some(score) =
			item.get("relevance_score").or_else(|| item.get("score")).and_then(score_value)
		else {
			tracing::debug!(index, "Skipping rerank item without numeric score.");

			continue;
		};

		out.push(RerankResult { candidate_index: index as usize, score });
	}

	Ok(out)
}

fn score_value(value: &Value) -> Option<f32> {
	match value {
		Value::Number(number) => number.as_f64().map(|v| v as f32),
		Value::String(raw) => raw.trim().parse::<f32>().ok().filter(|v| v.is_finite()),
		_ => None,
	}
}
