/// Lowercases `text`, then splits it into runs of ASCII alphanumerics.
///
/// Every other character acts as a separator. Lowercasing is full Unicode, so a code point
/// such as the Kelvin sign folds into an ASCII letter first.
pub fn tokenize(text: &str) -> Vec<String> {
	text.to_lowercase()
		.split(|ch: char| !ch.is_ascii_alphanumeric())
		.filter(|term| !term.is_empty())
		.map(str::to_string)
		.collect()
}

/// Sorted, deduplicated term set used for index entries and query scoring.
pub fn token_set(text: &str) -> Vec<String> {
	let mut tokens = tokenize(text);

	tokens.sort();
	tokens.dedup();

	tokens
}

pub fn normalize_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}
