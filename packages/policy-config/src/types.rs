use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

pub const PROFILE_BALANCED: &str = "balanced";
pub const PROFILE_HIGH_RECALL: &str = "high-recall";
pub const PROFILE_LOW_LATENCY: &str = "low-latency";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	#[serde(default)]
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub benchmark: Benchmark,
}
impl Config {
	pub fn profile(&self, name: Option<&str>) -> crate::Result<&RetrieverProfile> {
		let name = name.unwrap_or(self.retrieval.default_profile.as_str());

		self.retrieval.profiles.get(name).ok_or_else(|| crate::Error::UnknownProfile {
			name: name.to_string(),
			available: self.retrieval.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
		})
	}
}

#[derive(Debug, Deserialize, Clone)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: default_log_level() }
	}
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Providers {
	#[serde(default)]
	pub embedding: ProviderConfig,
	#[serde(default)]
	pub rerank: ProviderConfig,
	#[serde(default)]
	pub query_rewriter: LlmProviderConfig,
}

/// Hosted embedding or rerank endpoint.
///
/// `mode` is one of `auto`, `none` or `http`. `auto` enables the provider only when an API
/// key is configured.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
	#[serde(default = "default_provider_mode")]
	pub mode: String,
	#[serde(default)]
	pub provider_id: String,
	#[serde(default)]
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	#[serde(default)]
	pub path: String,
	#[serde(default)]
	pub model: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			mode: default_provider_mode(),
			provider_id: String::new(),
			api_base: String::new(),
			api_key: String::new(),
			path: String::new(),
			model: String::new(),
			timeout_ms: default_timeout_ms(),
			default_headers: Map::new(),
		}
	}
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmProviderConfig {
	#[serde(default = "default_provider_mode")]
	pub mode: String,
	#[serde(default)]
	pub provider_id: String,
	#[serde(default)]
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	#[serde(default)]
	pub path: String,
	#[serde(default)]
	pub model: String,
	#[serde(default)]
	pub temperature: f32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl Default for LlmProviderConfig {
	fn default() -> Self {
		Self {
			mode: default_provider_mode(),
			provider_id: String::new(),
			api_base: String::new(),
			api_key: String::new(),
			path: String::new(),
			model: String::new(),
			temperature: 0.0,
			timeout_ms: default_timeout_ms(),
			default_headers: Map::new(),
		}
	}
}

#[derive(Debug, Deserialize, Clone)]
pub struct Retrieval {
	#[serde(default = "default_profile_name")]
	pub default_profile: String,
	/// Upper bound for a single embedding, rerank or rewrite call made while ranking.
	#[serde(default = "default_timeout_ms")]
	pub provider_timeout_ms: u64,
	#[serde(default = "builtin_profiles")]
	pub profiles: BTreeMap<String, RetrieverProfile>,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			default_profile: default_profile_name(),
			provider_timeout_ms: default_timeout_ms(),
			profiles: builtin_profiles(),
		}
	}
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct RetrieverProfile {
	pub top_k: u32,
	pub min_score_for_answer: f32,
}
impl RetrieverProfile {
	pub const BALANCED: Self = Self { top_k: 4, min_score_for_answer: 0.3 };
	pub const HIGH_RECALL: Self = Self { top_k: 6, min_score_for_answer: 0.2 };
	pub const LOW_LATENCY: Self = Self { top_k: 3, min_score_for_answer: 0.35 };
}
impl Default for RetrieverProfile {
	fn default() -> Self {
		Self::BALANCED
	}
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Benchmark {
	#[serde(default = "default_recall_floor")]
	pub recall_floor: f64,
	#[serde(default = "default_latency_ceiling_ms")]
	pub latency_ceiling_ms: f64,
}
impl Default for Benchmark {
	fn default() -> Self {
		Self {
			recall_floor: default_recall_floor(),
			latency_ceiling_ms: default_latency_ceiling_ms(),
		}
	}
}

pub fn builtin_profiles() -> BTreeMap<String, RetrieverProfile> {
	BTreeMap::from([
		(PROFILE_BALANCED.to_string(), RetrieverProfile::BALANCED),
		(PROFILE_HIGH_RECALL.to_string(), RetrieverProfile::HIGH_RECALL),
		(PROFILE_LOW_LATENCY.to_string(), RetrieverProfile::LOW_LATENCY),
	])
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_provider_mode() -> String {
	"auto".to_string()
}

fn default_timeout_ms() -> u64 {
	30_000
}

fn default_profile_name() -> String {
	PROFILE_BALANCED.to_string()
}

fn default_recall_floor() -> f64 {
	0.5
}

fn default_latency_ceiling_ms() -> f64 {
	1_000.0
}
