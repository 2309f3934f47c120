mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Benchmark, Config, LlmProviderConfig, PROFILE_BALANCED, PROFILE_HIGH_RECALL,
	PROFILE_LOW_LATENCY, ProviderConfig, Providers, Retrieval, RetrieverProfile, Service,
	builtin_profiles,
};

use std::{fs, path::Path};

use serde_json::{Map, Value};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	for (label, provider) in
		[("embedding", &cfg.providers.embedding), ("rerank", &cfg.providers.rerank)]
	{
		validate_endpoint(
			label,
			Endpoint {
				mode: &provider.mode,
				api_base: &provider.api_base,
				api_key: &provider.api_key,
				path: &provider.path,
				model: &provider.model,
				timeout_ms: provider.timeout_ms,
				default_headers: &provider.default_headers,
			},
		)?;
	}

	let rewriter = &cfg.providers.query_rewriter;

	validate_endpoint(
		"query_rewriter",
		Endpoint {
			mode: &rewriter.mode,
			api_base: &rewriter.api_base,
			api_key: &rewriter.api_key,
			path: &rewriter.path,
			model: &rewriter.model,
			timeout_ms: rewriter.timeout_ms,
			default_headers: &rewriter.default_headers,
		},
	)?;

	if !rewriter.temperature.is_finite() || !(0.0..=2.0).contains(&rewriter.temperature) {
		return Err(Error::Validation {
			message: "providers.query_rewriter.temperature must be in the range 0.0-2.0."
				.to_string(),
		});
	}
	if cfg.retrieval.provider_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "retrieval.provider_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.profiles.is_empty() {
		return Err(Error::Validation {
			message: "retrieval.profiles must be non-empty.".to_string(),
		});
	}

	for (name, profile) in &cfg.retrieval.profiles {
		if name.trim().is_empty() {
			return Err(Error::Validation {
				message: "retrieval.profiles names must be non-empty.".to_string(),
			});
		}
		if profile.top_k == 0 {
			return Err(Error::Validation {
				message: format!("retrieval.profiles.{name}.top_k must be greater than zero."),
			});
		}
		if !profile.min_score_for_answer.is_finite()
			|| !(0.0..=1.0).contains(&profile.min_score_for_answer)
		{
			return Err(Error::Validation {
				message: format!(
					"retrieval.profiles.{name}.min_score_for_answer must be in the range 0.0-1.0."
				),
			});
		}
	}

	if !cfg.retrieval.profiles.contains_key(&cfg.retrieval.default_profile) {
		return Err(Error::Validation {
			message: format!(
				"retrieval.default_profile '{}' must name a configured profile.",
				cfg.retrieval.default_profile
			),
		});
	}
	if !cfg.benchmark.recall_floor.is_finite() || !(0.0..=1.0).contains(&cfg.benchmark.recall_floor)
	{
		return Err(Error::Validation {
			message: "benchmark.recall_floor must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !cfg.benchmark.latency_ceiling_ms.is_finite() || cfg.benchmark.latency_ceiling_ms < 0.0 {
		return Err(Error::Validation {
			message: "benchmark.latency_ceiling_ms must be zero or greater.".to_string(),
		});
	}

	Ok(())
}

struct Endpoint<'a> {
	mode: &'a str,
	api_base: &'a str,
	api_key: &'a str,
	path: &'a str,
	model: &'a str,
	timeout_ms: u64,
	default_headers: &'a Map<String, Value>,
}

fn validate_endpoint(label: &str, endpoint: Endpoint<'_>) -> Result<()> {
	if !matches!(endpoint.mode, "auto" | "none" | "http") {
		return Err(Error::Validation {
			message: format!("providers.{label}.mode must be one of auto, none, or http."),
		});
	}
	if endpoint.mode == "http" && endpoint.api_key.is_empty() {
		return Err(Error::Validation {
			message: format!("providers.{label}.api_key must be non-empty when mode is http."),
		});
	}
	if endpoint.mode == "none" || (endpoint.mode == "auto" && endpoint.api_key.is_empty()) {
		return Ok(());
	}

	for (field, value) in
		[("api_base", endpoint.api_base), ("path", endpoint.path), ("model", endpoint.model)]
	{
		if value.is_empty() {
			return Err(Error::Validation {
				message: format!("providers.{label}.{field} must be non-empty."),
			});
		}
	}

	if endpoint.timeout_ms == 0 {
		return Err(Error::Validation {
			message: format!("providers.{label}.timeout_ms must be greater than zero."),
		});
	}
	if endpoint.default_headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: format!("providers.{label}.default_headers values must be strings."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for provider in [&mut cfg.providers.embedding, &mut cfg.providers.rerank] {
		provider.mode = provider.mode.trim().to_lowercase();
		provider.api_key = provider.api_key.trim().to_string();
		provider.api_base = provider.api_base.trim().trim_end_matches('/').to_string();
		provider.model = provider.model.trim().to_string();
		provider.path = provider.path.trim().to_string();
	}

	let rewriter = &mut cfg.providers.query_rewriter;

	rewriter.mode = rewriter.mode.trim().to_lowercase();
	rewriter.api_key = rewriter.api_key.trim().to_string();
	rewriter.api_base = rewriter.api_base.trim().trim_end_matches('/').to_string();
	rewriter.model = rewriter.model.trim().to_string();
	rewriter.path = rewriter.path.trim().to_string();

	cfg.retrieval.default_profile = cfg.retrieval.default_profile.trim().to_string();
}
