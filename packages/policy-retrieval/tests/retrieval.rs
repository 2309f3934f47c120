use std::{sync::Arc, time::Duration};

use policy_domain::{
	audit::{self, STAGE_QUERY_REWRITE, STAGE_RETRIEVAL_RANK},
	decision::Decision,
	filter::RetrievalFilters,
	metrics::{EMBED_QUERY_FAILED, ProviderStatus, QUERY_REWRITE_FAILED, RERANK_FAILED},
};
use policy_providers::rerank::RerankResult;
use policy_retrieval::{
	Error, PolicyRetriever, Providers, QueryRewrite, RetrievalIndex, RetrievalRequest,
	RetrievalResponse, build_index, ranking,
	retrieve::{ACTOR_QUERY_REWRITER, ACTOR_RETRIEVER},
};
use policy_testkit::{
	FailingRerank, FailingRewriter, FixedEmbedding, FixedRerank, FlakyEmbedding, KeywordEmbedding,
	SlowEmbedding, SlowRerank, StaticRewriter, chunk, sample_chunks,
};

const EXPENSE_QUESTION: &str = "Who approves expense reimbursement requests?";

async fn lexical_index() -> Arc<RetrievalIndex> {
	Arc::new(build_index(sample_chunks(), None).await.expect("Index must build."))
}

async fn embedded_index() -> Arc<RetrievalIndex> {
	Arc::new(
		build_index(sample_chunks(), Some(&KeywordEmbedding)).await.expect("Index must build."),
	)
}

fn us_expense() -> RetrievalFilters {
	RetrievalFilters::new(Some("US"), ["expense"])
}

fn request(question: &str, filters: RetrievalFilters, top_k: u32) -> RetrievalRequest {
	RetrievalRequest::new(question).with_filters(filters).with_top_k(top_k)
}

fn chunk_ids(response: &RetrievalResponse) -> Vec<&str> {
	response.retrieved_chunks.iter().map(|chunk| chunk.chunk_id.as_str()).collect()
}

#[tokio::test]
async fn metadata_filters_restrict_out_of_scope_documents() {
	let retriever = PolicyRetriever::new(lexical_index().await, Providers::default());
	let mut req = request(EXPENSE_QUESTION, us_expense(), 3);

	req.min_score_for_answer = Some(0.2);
	req.trace_id = Some("trace-week3-filters".to_string());

	let response = retriever.retrieve(req).await.expect("Retrieval must succeed.");

	assert_eq!(response.trace_id, "trace-week3-filters");
	assert_eq!(response.decision, Decision::Answered);
	assert_eq!(chunk_ids(&response), vec!["chunk-expense-0"]);
	assert!((response.retrieved_chunks[0].retrieval_score - 0.4).abs() < 1e-6);
	assert_eq!(
		response.retrieved_chunks[0].matched_terms,
		vec!["expense".to_string(), "reimbursement".to_string()]
	);
	assert_eq!(response.citations.len(), 1);
	assert_eq!(response.citations[0].section, "4.2");
	assert_eq!(response.citations[0].chunk_id, "chunk-expense-0");
	assert_eq!(response.audit_events.len(), 2);
}

#[tokio::test]
async fn jurisdiction_filter_excludes_chunks_even_with_perfect_vectors() {
	let retriever = PolicyRetriever::new(
		embedded_index().await,
		Providers::default().with_embedding(Arc::new(KeywordEmbedding)),
	);
	let response = retriever
		.retrieve(request(
			"vendor data sharing",
			RetrievalFilters::new(Some("us"), Vec::<String>::new()),
			6,
		))
		.await
		.expect("Retrieval must succeed.");

	assert!(!response.retrieved_chunks.is_empty());
	assert!(
		response
			.retrieved_chunks
			.iter()
			.all(|chunk| chunk.metadata.get("jurisdiction").map(String::as_str) == Some("US"))
	);
	assert!(!chunk_ids(&response).contains(&"chunk-vendor-0"));
}

#[tokio::test]
async fn abstains_when_no_chunk_matches() {
	let retriever = PolicyRetriever::new(lexical_index().await, Providers::default());
	let response = retriever
		.retrieve(request(
			"What is the cryptography key rotation schedule?",
			RetrievalFilters::new(Some("US"), ["security"]),
			3,
		))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(response.decision, Decision::Abstained);
	assert!(response.retrieved_chunks.is_empty());
	assert!(response.citations.is_empty());
}

#[tokio::test]
async fn empty_index_abstains() {
	let index = Arc::new(build_index(Vec::new(), None).await.expect("Index must build."));
	let retriever = PolicyRetriever::new(index, Providers::default());
	let response = retriever
		.retrieve(RetrievalRequest::new("Who approves travel?"))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(response.decision, Decision::Abstained);
	assert!(response.retrieved_chunks.is_empty());
	assert!(response.citations.is_empty());
	assert_eq!(response.audit_events.len(), 2);
}

#[tokio::test]
async fn escalates_below_threshold_and_breaks_ties_by_chunk_index() {
	let retriever = PolicyRetriever::new(lexical_index().await, Providers::default());
	let mut req = request("manager threshold policy", us_expense(), 3);

	req.min_score_for_answer = Some(0.9);

	let response = retriever.retrieve(req).await.expect("Retrieval must succeed.");

	assert_eq!(response.decision, Decision::Escalate);
	assert_eq!(chunk_ids(&response), vec!["chunk-expense-0", "chunk-expense-1"]);
	assert_eq!(
		response.retrieved_chunks[0].retrieval_score,
		response.retrieved_chunks[1].retrieval_score
	);
}

#[tokio::test]
async fn threshold_is_inclusive() {
	let index = Arc::new(
		build_index(vec![chunk("c-1", "doc-1", 0, "expense approval manager", &[])], None)
			.await
			.expect("Index must build."),
	);
	let retriever = PolicyRetriever::new(index, Providers::default());
	let mut req = RetrievalRequest::new("manager travel");

	req.min_score_for_answer = Some(0.5);

	let response = retriever.retrieve(req).await.expect("Retrieval must succeed.");

	assert_eq!(response.retrieved_chunks[0].retrieval_score, 0.5);
	assert_eq!(response.decision, Decision::Answered);
}

#[tokio::test]
async fn lexical_only_scoring_answers() {
	let index = Arc::new(
		build_index(vec![chunk("c-1", "doc-1", 0, "expense approval manager", &[])], None)
			.await
			.expect("Index must build."),
	);
	let retriever = PolicyRetriever::new(index, Providers::default());
	let mut req = RetrievalRequest::new("manager approval");

	req.min_score_for_answer = Some(0.3);

	let response = retriever.retrieve(req).await.expect("Retrieval must succeed.");

	assert!(response.retrieved_chunks[0].retrieval_score > 0.0);
	assert_eq!(response.decision, Decision::Answered);
	assert!(response.provider_metrics.is_empty());
}

#[tokio::test]
async fn orthogonal_vectors_score_by_rescaled_cosine() {
	let chunks = vec![
		chunk("c-a", "doc-a", 0, "alpha", &[]),
		chunk("c-b", "doc-b", 0, "beta", &[]),
	];
	let embedding = Arc::new(FixedEmbedding {
		documents: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
		query: vec![1.0, 0.0],
	});
	let index =
		Arc::new(build_index(chunks, Some(&*embedding)).await.expect("Index must build."));

	assert_eq!(index.vector_dim(), 2);
	assert_eq!(ranking::cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
	assert_eq!(ranking::cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));

	let retriever = PolicyRetriever::new(index, Providers::default().with_embedding(embedding));
	let response =
		retriever.retrieve(RetrievalRequest::new("gamma")).await.expect("Retrieval must succeed.");
	let scores =
		response.retrieved_chunks.iter().map(|chunk| chunk.retrieval_score).collect::<Vec<_>>();

	assert_eq!(chunk_ids(&response), vec!["c-a", "c-b"]);
	assert_eq!(scores, vec![1.0, 0.5]);
	assert!(response.retrieved_chunks.iter().all(|chunk| chunk.matched_terms.is_empty()));
}

#[tokio::test]
async fn fused_score_is_max_of_signals() {
	let index = embedded_index().await;
	let retriever = PolicyRetriever::new(
		index.clone(),
		Providers::default().with_embedding(Arc::new(KeywordEmbedding)),
	);
	let response = retriever
		.retrieve(request(EXPENSE_QUESTION, us_expense(), 3))
		.await
		.expect("Retrieval must succeed.");
	let query_tokens = policy_domain::text::token_set(&EXPENSE_QUESTION.to_lowercase());
	let query_vector = vec![1.0_f32, 0.0];

	for retrieved in &response.retrieved_chunks {
		let indexed = index.chunk(&retrieved.chunk_id).expect("Chunk must be indexed.");
		let (lexical, _) = ranking::lexical_score(&query_tokens, &indexed.tokens);
		let vector = ranking::vector_score(Some(query_vector.as_slice()), indexed.vector.as_deref());

		assert_eq!(retrieved.retrieval_score, lexical.max(vector));
	}
}

#[tokio::test]
async fn provider_embeddings_and_rerank_reorder_results() {
	let rerank = Arc::new(FixedRerank::new(vec![RerankResult { candidate_index: 1, score: 0.95 }]));
	let retriever = PolicyRetriever::new(
		embedded_index().await,
		Providers::default().with_embedding(Arc::new(KeywordEmbedding)).with_rerank(rerank.clone()),
	);
	let mut req = request(EXPENSE_QUESTION, us_expense(), 2);

	req.min_score_for_answer = Some(0.2);

	let response = retriever.retrieve(req).await.expect("Retrieval must succeed.");

	assert_eq!(response.decision, Decision::Answered);
	assert_eq!(chunk_ids(&response), vec!["chunk-expense-1"]);
	assert!((response.retrieved_chunks[0].retrieval_score - 0.95).abs() < 1e-6);
	assert_eq!(rerank.calls(), 1);
	assert_eq!(response.provider_metrics.len(), 2);
	assert!(response.provider_metrics.iter().all(|metric| metric.status == ProviderStatus::Ok));
}

#[tokio::test]
async fn rerank_failure_keeps_pre_rerank_order() {
	let index = lexical_index().await;
	let baseline = PolicyRetriever::new(index.clone(), Providers::default())
		.retrieve(request("manager threshold policy", us_expense(), 2))
		.await
		.expect("Retrieval must succeed.");
	let retriever =
		PolicyRetriever::new(index, Providers::default().with_rerank(Arc::new(FailingRerank)));
	let response = retriever
		.retrieve(request("manager threshold policy", us_expense(), 2))
		.await
		.expect("Retrieval must succeed.");
	let errors =
		response.provider_metrics.iter().filter(|metric| metric.is_error()).collect::<Vec<_>>();

	assert_eq!(response.retrieved_chunks, baseline.retrieved_chunks);
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].error_code.as_deref(), Some(RERANK_FAILED));
}

#[tokio::test]
async fn rerank_timeout_falls_back() {
	let retriever = PolicyRetriever::new(
		lexical_index().await,
		Providers::default().with_rerank(Arc::new(SlowRerank { delay: Duration::from_millis(500) })),
	)
	.with_provider_timeout(Duration::from_millis(20));
	let response = retriever
		.retrieve(request(EXPENSE_QUESTION, us_expense(), 2))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(chunk_ids(&response), vec!["chunk-expense-0"]);
	assert_eq!(response.provider_metrics.len(), 1);
	assert_eq!(response.provider_metrics[0].error_code.as_deref(), Some(RERANK_FAILED));
}

#[tokio::test]
async fn rerank_with_unusable_results_keeps_pre_rerank_order() {
	let rerank = Arc::new(FixedRerank::new(vec![RerankResult { candidate_index: 42, score: 0.9 }]));
	let retriever =
		PolicyRetriever::new(lexical_index().await, Providers::default().with_rerank(rerank));
	let response = retriever
		.retrieve(request("manager threshold policy", us_expense(), 2))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(chunk_ids(&response), vec!["chunk-expense-0", "chunk-expense-1"]);
	assert_eq!(response.provider_metrics.len(), 1);
	assert_eq!(response.provider_metrics[0].status, ProviderStatus::Ok);
}

#[tokio::test]
async fn rerank_is_skipped_without_candidates() {
	let rerank = Arc::new(FixedRerank::new(Vec::new()));
	let retriever =
		PolicyRetriever::new(lexical_index().await, Providers::default().with_rerank(rerank.clone()));
	let response = retriever
		.retrieve(RetrievalRequest::new("cryptography key rotation"))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(response.decision, Decision::Abstained);
	assert_eq!(rerank.calls(), 0);
	assert!(response.provider_metrics.is_empty());
}

#[tokio::test]
async fn query_variants_union_keeps_best_score_per_chunk() {
	let rewriter = StaticRewriter {
		rewrite: QueryRewrite::new("manager approval", ["travel director approval"])
			.expect("Rewrite must be valid."),
	};
	let retriever = PolicyRetriever::new(
		lexical_index().await,
		Providers::default().with_query_rewriter(Arc::new(rewriter)),
	);
	let response = retriever
		.retrieve(request("Who signs off?", RetrievalFilters::default(), 4))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(response.normalized_query, "manager approval");
	assert_eq!(chunk_ids(&response), vec!["chunk-expense-0", "chunk-expense-1"]);
	assert_eq!(response.retrieved_chunks[0].retrieval_score, 1.0);
	assert_eq!(
		response.retrieved_chunks[0].matched_terms,
		vec!["approval".to_string(), "manager".to_string()]
	);
	assert!((response.retrieved_chunks[1].retrieval_score - 2.0 / 3.0).abs() < 1e-6);
	assert_eq!(response.provider_metrics.len(), 1);
	assert_eq!(response.provider_metrics[0].status, ProviderStatus::Ok);
}

#[tokio::test]
async fn failed_variant_embedding_degrades_to_lexical() {
	let embedding = Arc::new(FlakyEmbedding { fail_on: "third party".to_string() });
	let index = Arc::new(
		build_index(sample_chunks(), Some(&*embedding)).await.expect("Index must build."),
	);
	let retriever = PolicyRetriever::new(index, Providers::default().with_embedding(embedding));
	let response = retriever
		.retrieve(RetrievalRequest::new("Can vendors share data?"))
		.await
		.expect("Retrieval must succeed.");
	let statuses = response.provider_metrics.iter().map(|metric| metric.status).collect::<Vec<_>>();

	assert_eq!(statuses, vec![ProviderStatus::Ok, ProviderStatus::Error]);
	assert_eq!(response.provider_metrics[1].error_code.as_deref(), Some(EMBED_QUERY_FAILED));
	assert_eq!(response.retrieved_chunks[0].chunk_id, "chunk-vendor-0");
	assert_eq!(response.decision, Decision::Answered);

	let rank = &response.audit_events[1];

	assert_eq!(rank.metadata["provider_call_count"], serde_json::json!(2));
	assert_eq!(rank.metadata["provider_errors"], serde_json::json!(1));
}

#[tokio::test]
async fn timed_out_variant_embedding_degrades_to_lexical() {
	let embedding = Arc::new(SlowEmbedding {
		slow_on: "third party".to_string(),
		delay: Duration::from_millis(500),
	});
	let index = Arc::new(
		build_index(sample_chunks(), Some(&*embedding)).await.expect("Index must build."),
	);
	let retriever = PolicyRetriever::new(index, Providers::default().with_embedding(embedding))
		.with_provider_timeout(Duration::from_millis(20));
	let response = retriever
		.retrieve(RetrievalRequest::new("Can vendors share data?"))
		.await
		.expect("Retrieval must succeed.");
	let statuses = response.provider_metrics.iter().map(|metric| metric.status).collect::<Vec<_>>();

	assert_eq!(statuses, vec![ProviderStatus::Ok, ProviderStatus::Error]);
	assert_eq!(response.provider_metrics[1].error_code.as_deref(), Some(EMBED_QUERY_FAILED));
	assert_eq!(response.retrieved_chunks[0].chunk_id, "chunk-vendor-0");
	assert_eq!(response.decision, Decision::Answered);
}

#[tokio::test]
async fn blank_custom_rewrite_falls_back_to_rules() {
	let rewriter = StaticRewriter {
		rewrite: QueryRewrite { normalized_query: "  ".to_string(), expanded_queries: Vec::new() },
	};
	let retriever = PolicyRetriever::new(
		lexical_index().await,
		Providers::default().with_query_rewriter(Arc::new(rewriter)),
	);
	let response = retriever
		.retrieve(RetrievalRequest::new("Who approves Expense reimbursement?"))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(response.normalized_query, "who approves expense reimbursement?");
	assert_eq!(response.provider_metrics.len(), 1);
	assert_eq!(response.provider_metrics[0].status, ProviderStatus::Error);
	assert_eq!(response.provider_metrics[0].error_code.as_deref(), Some(QUERY_REWRITE_FAILED));
	assert!(!response.retrieved_chunks.is_empty());
}

#[tokio::test]
async fn failed_rewriter_falls_back_to_rules() {
	let retriever = PolicyRetriever::new(
		lexical_index().await,
		Providers::default().with_query_rewriter(Arc::new(FailingRewriter)),
	);
	let response = retriever
		.retrieve(RetrievalRequest::new("  What is the Vendor   retention period? "))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(response.question, "What is the Vendor retention period?");
	assert_eq!(response.normalized_query, "what is the vendor retention period?");
	assert_eq!(response.provider_metrics.len(), 1);
	assert_eq!(response.provider_metrics[0].error_code.as_deref(), Some(QUERY_REWRITE_FAILED));
}

#[tokio::test]
async fn audit_events_hash_stage_payloads() {
	let retriever = PolicyRetriever::new(lexical_index().await, Providers::default());
	let mut req = request(EXPENSE_QUESTION, us_expense(), 3);

	req.trace_id = Some("trace-audit".to_string());

	let response = retriever.retrieve(req).await.expect("Retrieval must succeed.");
	let [rewrite, rank] = response.audit_events.as_slice() else {
		panic!("Expected exactly two audit events.");
	};

	assert_eq!(rewrite.stage, STAGE_QUERY_REWRITE);
	assert_eq!(rewrite.actor, ACTOR_QUERY_REWRITER);
	assert_eq!(rewrite.input_hash, audit::hash_payload(EXPENSE_QUESTION));
	assert_eq!(
		rewrite.output_hash,
		audit::hash_payload(
			r#"{"expanded_queries":[],"normalized_query":"who approves expense reimbursement requests?"}"#
		)
	);
	assert_eq!(rank.stage, STAGE_RETRIEVAL_RANK);
	assert_eq!(rank.actor, ACTOR_RETRIEVER);
	assert_eq!(
		rank.output_hash,
		audit::hash_payload(r#"{"chunk_ids":["chunk-expense-0"],"decision":"ANSWERED"}"#)
	);
	assert!(response.audit_events.iter().all(|event| event.trace_id == "trace-audit"));
	assert!(response.audit_events.iter().all(|event| event.status == "ok"));
	assert_ne!(rewrite.event_id, rank.event_id);
}

#[tokio::test]
async fn repeated_calls_are_deterministic() {
	let retriever = PolicyRetriever::new(
		embedded_index().await,
		Providers::default().with_embedding(Arc::new(KeywordEmbedding)),
	);
	let first = retriever
		.retrieve(request("expense approval for travel", RetrievalFilters::default(), 3))
		.await
		.expect("Retrieval must succeed.");
	let second = retriever
		.retrieve(request("expense approval for travel", RetrievalFilters::default(), 3))
		.await
		.expect("Retrieval must succeed.");

	assert_eq!(first.retrieved_chunks, second.retrieved_chunks);
	assert_eq!(first.citations, second.citations);
	assert_eq!(first.decision, second.decision);
	assert_ne!(first.trace_id, second.trace_id);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
	let retriever = PolicyRetriever::new(lexical_index().await, Providers::default());
	let blank = retriever.retrieve(RetrievalRequest::new(" \t\n")).await;
	let zero_top_k = retriever.retrieve(RetrievalRequest::new("expense").with_top_k(0)).await;
	let mut out_of_range = RetrievalRequest::new("expense");

	out_of_range.min_score_for_answer = Some(1.5);

	let bad_threshold = retriever.retrieve(out_of_range).await;

	assert!(matches!(blank, Err(Error::InvalidRequest { .. })));
	assert!(matches!(zero_top_k, Err(Error::InvalidRequest { .. })));
	assert!(matches!(bad_threshold, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn profile_supplies_defaults() {
	let cfg = policy_config::Config::default();
	let retriever = PolicyRetriever::from_config(
		&cfg,
		lexical_index().await,
		Providers::default(),
		Some(policy_config::PROFILE_LOW_LATENCY),
	)
	.expect("Profile must resolve.");

	assert_eq!(retriever.profile(), policy_config::RetrieverProfile::LOW_LATENCY);

	let unknown =
		PolicyRetriever::from_config(&cfg, lexical_index().await, Providers::default(), Some("turbo"));

	assert!(matches!(unknown, Err(Error::Config(policy_config::Error::UnknownProfile { .. }))));
}
