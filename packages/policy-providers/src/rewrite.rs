use policy_config::LlmProviderConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

pub const MAX_EXPANDED_QUERIES: usize = 2;

const MAX_ATTEMPTS: usize = 3;

/// Raw structured output of the rewrite model. Normalization happens in the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteOutput {
	pub normalized_query: String,
	#[serde(default)]
	pub expanded_queries: Vec<String>,
}

pub async fn rewrite(cfg: &LlmProviderConfig, question: &str) -> Result<RewriteOutput> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = crate::endpoint_url(&cfg.api_base, &cfg.path);
	let messages = build_rewrite_messages(question, MAX_EXPANDED_QUERIES);
	let mut last_err = None;

	for attempt in 1..=MAX_ATTEMPTS {
		let body = serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"messages": messages,
		});
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_rewrite_response(json) {
			Ok(parsed) => return Ok(parsed),
			Err(err) => {
				tracing::warn!(error = %err, attempt, "Query rewrite returned unusable content.");

				last_err = Some(err);
			},
		}
	}

	Err(last_err.unwrap_or_else(|| Error::InvalidResponse {
		message: "Query rewrite response is not valid JSON.".to_string(),
	}))
}

pub fn build_rewrite_messages(question: &str, max_expanded: usize) -> Vec<Value> {
	let schema = serde_json::json!({
		"normalized_query": "string",
		"expanded_queries": ["string"],
	});
	let schema_text = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| {
		"{\"normalized_query\": \"string\", \"expanded_queries\": [\"string\"]}".to_string()
	});
	let system_prompt = "You normalize compliance retrieval queries. \
Return compact JSON only and match the provided schema exactly. \
Keep the intent of the question unchanged. Do not add explanations or extra fields.";
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema_text}\nConstraints:\n- MAX_EXPANDED_QUERIES = {max_expanded}\nQuestion: {question}"
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

fn parse_rewrite_response(json: Value) -> Result<RewriteOutput> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"));
	let payload = match content {
		Some(Value::String(text)) => serde_json::from_str::<Value>(strip_code_fence(text))?,
		Some(Value::Array(parts)) => {
			let text = parts
				.iter()
				.filter_map(|part| part.get("text").and_then(|t| t.as_str()))
				.collect::<String>();

			serde_json::from_str::<Value>(strip_code_fence(&text))?
		},
		Some(_) =>
			return Err(Error::InvalidResponse {
				message: "Query rewrite content has an unsupported type.".to_string(),
			}),
		None if json.is_object() => json,
		None =>
			return Err(Error::InvalidResponse {
				message: "Query rewrite response is missing JSON content.".to_string(),
			}),
	};

	Ok(serde_json::from_value(payload)?)
}

fn strip_code_fence(text: &str) -> &str {
	let trimmed = text.trim();
	let Some(inner) = trimmed.strip_prefix("```") else { return trimmed };
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}
