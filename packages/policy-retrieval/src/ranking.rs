pub mod fusion;
pub mod rerank;
pub mod scoring;

pub use fusion::{
	VariantEmbedding, cmp_f32_desc, dedupe_queries, embed_variant, merge_best, rank_candidates,
	score_variant,
};
pub use rerank::{RerankOutcome, apply_rerank, rerank_candidates, rerank_window};
pub use scoring::{cosine_similarity, fuse, lexical_score, vector_score};
