use policy_domain::text::normalize_whitespace;
use policy_providers::rewrite::{MAX_EXPANDED_QUERIES, RewriteOutput};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const RETENTION_EXPANSION: &str = "record retention policy requirements";
const THIRD_PARTY_EXPANSION: &str = "third party data sharing policy";

/// Normalized query plus paraphrases. Serialized field order matches the audit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRewrite {
	pub normalized_query: String,
	pub expanded_queries: Vec<String>,
}
impl QueryRewrite {
	pub fn new<I, S>(normalized_query: &str, expanded_queries: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let normalized_query = normalize_whitespace(normalized_query);

		if normalized_query.is_empty() {
			return Err(Error::InvalidRequest {
				message: "normalized_query must not be blank.".to_string(),
			});
		}

		let mut expanded = Vec::new();

		for query in expanded_queries {
			let query = normalize_whitespace(query.as_ref());

			if query.is_empty() || query == normalized_query || expanded.contains(&query) {
				continue;
			}

			expanded.push(query);
		}

		Ok(Self { normalized_query, expanded_queries: expanded })
	}

	pub fn from_output(output: RewriteOutput) -> Result<Self> {
		let mut rewrite = Self::new(&output.normalized_query, output.expanded_queries)?;

		rewrite.expanded_queries.truncate(MAX_EXPANDED_QUERIES);

		Ok(rewrite)
	}
}

/// Collapses whitespace and rejects blank questions.
pub fn normalize_question(question: &str) -> Result<String> {
	let normalized = normalize_whitespace(question);

	if normalized.is_empty() {
		return Err(Error::InvalidRequest { message: "question must not be blank.".to_string() });
	}

	Ok(normalized)
}

/// Rule-based rewrite used when no rewriter is configured or the configured one fails.
pub fn fallback_query_rewrite(question: &str) -> Result<QueryRewrite> {
	let normalized = normalize_question(&question.to_lowercase())?;
	let mut expansions = Vec::new();

	if normalized.contains("retention") {
		expansions.push(RETENTION_EXPANSION);
	}
	if normalized.contains("vendor") || normalized.contains("third party") {
		expansions.push(THIRD_PARTY_EXPANSION);
	}

	QueryRewrite::new(&normalized, expansions)
}
