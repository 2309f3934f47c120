use serde::{Deserialize, Serialize};

pub const EMBED_QUERY_FAILED: &str = "embed_query_failed";
pub const RERANK_FAILED: &str = "rerank_failed";
pub const QUERY_REWRITE_FAILED: &str = "query_rewrite_failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
	Ok,
	Error,
}

/// Telemetry for one external provider invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCallMetrics {
	pub provider: String,
	pub model: String,
	pub latency_ms: f64,
	pub status: ProviderStatus,
	pub error_code: Option<String>,
}
impl ProviderCallMetrics {
	pub fn ok(provider: &str, model: &str, latency_ms: f64) -> Self {
		Self {
			provider: provider.to_string(),
			model: model.to_string(),
			latency_ms: latency_ms.max(0.0),
			status: ProviderStatus::Ok,
			error_code: None,
		}
	}

	pub fn error(provider: &str, model: &str, latency_ms: f64, error_code: &str) -> Self {
		Self {
			provider: provider.to_string(),
			model: model.to_string(),
			latency_ms: latency_ms.max(0.0),
			status: ProviderStatus::Error,
			error_code: Some(error_code.to_string()),
		}
	}

	pub fn is_error(&self) -> bool {
		self.status == ProviderStatus::Error
	}
}
