use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

pub const JURISDICTION_KEY: &str = "jurisdiction";
pub const POLICY_SCOPE_KEY: &str = "policy_scope";

/// Metadata constraints applied before scoring.
///
/// Values are stored trimmed and lowercased. An absent jurisdiction or an empty scope list
/// places no constraint on a chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FilterInput")]
pub struct RetrievalFilters {
	jurisdiction: Option<String>,
	policy_scope: Vec<String>,
}
impl RetrievalFilters {
	pub fn new<I, S>(jurisdiction: Option<&str>, policy_scope: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let jurisdiction = jurisdiction
			.map(|value| value.trim().to_lowercase())
			.filter(|value| !value.is_empty());
		let mut seen = HashSet::new();
		let mut scopes = Vec::new();

		for item in policy_scope {
			let token = item.as_ref().trim().to_lowercase();

			if !token.is_empty() && seen.insert(token.clone()) {
				scopes.push(token);
			}
		}

		Self { jurisdiction, policy_scope: scopes }
	}

	pub fn jurisdiction(&self) -> Option<&str> {
		self.jurisdiction.as_deref()
	}

	pub fn policy_scope(&self) -> &[String] {
		&self.policy_scope
	}

	pub fn is_empty(&self) -> bool {
		self.jurisdiction.is_none() && self.policy_scope.is_empty()
	}

	pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
		if let Some(expected) = self.jurisdiction.as_deref() {
			let actual = metadata
				.get(JURISDICTION_KEY)
				.map(|value| value.trim().to_lowercase())
				.unwrap_or_default();

			if actual != expected {
				return false;
			}
		}
		if !self.policy_scope.is_empty() {
			let chunk_scope = parse_policy_scope(metadata.get(POLICY_SCOPE_KEY).map(String::as_str));

			if chunk_scope.is_empty() {
				return false;
			}
			if !self.policy_scope.iter().any(|scope| chunk_scope.contains(scope)) {
				return false;
			}
		}

		true
	}
}

#[derive(Deserialize)]
struct FilterInput {
	#[serde(default)]
	jurisdiction: Option<String>,
	#[serde(default)]
	policy_scope: Vec<String>,
}
impl From<FilterInput> for RetrievalFilters {
	fn from(input: FilterInput) -> Self {
		Self::new(input.jurisdiction.as_deref(), input.policy_scope)
	}
}

/// Parses a chunk's `policy_scope` metadata. `,`, `|` and `;` all separate tags.
pub fn parse_policy_scope(raw: Option<&str>) -> BTreeSet<String> {
	let Some(raw) = raw else { return BTreeSet::new() };

	raw.split([',', '|', ';'])
		.map(|item| item.trim().to_lowercase())
		.filter(|item| !item.is_empty())
		.collect()
}
