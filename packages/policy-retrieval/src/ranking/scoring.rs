/// Fraction of query terms present in the chunk, with the matched terms.
///
/// Both slices must be sorted and deduplicated; matched terms come back sorted.
pub fn lexical_score(query_tokens: &[String], chunk_tokens: &[String]) -> (f32, Vec<String>) {
	if query_tokens.is_empty() {
		return (0.0, Vec::new());
	}

	let matched = query_tokens
		.iter()
		.filter(|token| chunk_tokens.binary_search(*token).is_ok())
		.cloned()
		.collect::<Vec<_>>();

	if matched.is_empty() {
		return (0.0, matched);
	}

	let score = (matched.len() as f32 / query_tokens.len() as f32).min(1.0);

	(score, matched)
}

/// Raw cosine. `None` when either side is empty, the lengths differ or a norm is zero.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f32> {
	if left.is_empty() || right.is_empty() || left.len() != right.len() {
		return None;
	}

	let mut dot = 0.0_f64;
	let mut left_norm = 0.0_f64;
	let mut right_norm = 0.0_f64;

	for (a, b) in left.iter().zip(right) {
		let (a, b) = (f64::from(*a), f64::from(*b));

		dot += a * b;
		left_norm += a * a;
		right_norm += b * b;
	}

	let denom = left_norm.sqrt() * right_norm.sqrt();

	if denom == 0.0 || !denom.is_finite() {
		return None;
	}

	Some((dot / denom) as f32)
}

/// Cosine rescaled from `[-1, 1]` to `[0, 1]`. Missing or incompatible vectors score zero.
pub fn vector_score(query: Option<&[f32]>, chunk: Option<&[f32]>) -> f32 {
	let (Some(query), Some(chunk)) = (query, chunk) else { return 0.0 };
	let Some(cosine) = cosine_similarity(query, chunk) else { return 0.0 };

	((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Either signal alone is sufficient evidence.
pub fn fuse(lexical: f32, vector: f32) -> f32 {
	lexical.max(vector)
}
