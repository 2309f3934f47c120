use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

pub const STAGE_QUERY_REWRITE: &str = "query_rewrite";
pub const STAGE_RETRIEVAL_RANK: &str = "retrieval_rank";
pub const STATUS_OK: &str = "ok";

/// Immutable record of one pipeline stage. Payloads are kept only as BLAKE3 digests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
	pub event_id: Uuid,
	pub trace_id: String,
	pub stage: String,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	pub input_hash: String,
	pub output_hash: String,
	pub actor: String,
	pub status: String,
	pub metadata: Map<String, Value>,
}

pub struct AuditEventArgs<'a> {
	pub trace_id: &'a str,
	pub stage: &'a str,
	pub actor: &'a str,
	pub status: &'a str,
	pub input_payload: &'a str,
	pub output_payload: &'a str,
	pub metadata: Map<String, Value>,
}

pub fn build_audit_event(args: AuditEventArgs<'_>) -> AuditEvent {
	let AuditEventArgs { trace_id, stage, actor, status, input_payload, output_payload, metadata } =
		args;

	AuditEvent {
		event_id: Uuid::new_v4(),
		trace_id: trace_id.to_string(),
		stage: stage.to_string(),
		timestamp: OffsetDateTime::now_utc(),
		input_hash: hash_payload(input_payload),
		output_hash: hash_payload(output_payload),
		actor: actor.to_string(),
		status: status.to_string(),
		metadata,
	}
}

pub fn hash_payload(payload: &str) -> String {
	blake3::hash(payload.as_bytes()).to_hex().to_string()
}

/// Serializes `value` with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
	sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
	match value {
		Value::Object(map) => {
			let mut keys: Vec<&String> = map.keys().collect();

			keys.sort();

			let mut sorted = Map::with_capacity(map.len());

			for key in keys {
				sorted.insert(key.clone(), sort_keys(&map[key]));
			}

			Value::Object(sorted)
		},
		Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
		other => other.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn canonical_json_is_key_order_independent() {
		let a = serde_json::json!({ "top_k": 2, "queries": ["a"], "filters": { "z": 1, "a": 2 } });
		let mut b = Map::new();

		b.insert("filters".to_string(), serde_json::json!({ "a": 2, "z": 1 }));
		b.insert("queries".to_string(), serde_json::json!(["a"]));
		b.insert("top_k".to_string(), serde_json::json!(2));

		assert_eq!(canonical_json(&a), canonical_json(&Value::Object(b)));
		assert_eq!(
			canonical_json(&a),
			r#"{"filters":{"a":2,"z":1},"queries":["a"],"top_k":2}"#
		);
	}

	#[test]
	fn hashes_are_hex_digests() {
		let event = build_audit_event(AuditEventArgs {
			trace_id: "trace-1",
			stage: STAGE_QUERY_REWRITE,
			actor: "retrieval.query_rewriter",
			status: STATUS_OK,
			input_payload: "who approves expenses",
			output_payload: "{}",
			metadata: Map::new(),
		});

		assert_eq!(event.input_hash.len(), 64);
		assert!(event.input_hash.chars().all(|ch| ch.is_ascii_hexdigit()));
		assert_eq!(event.input_hash, hash_payload("who approves expenses"));
		assert_ne!(event.input_hash, event.output_hash);
	}
}
