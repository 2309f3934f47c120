use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};

use clap::Parser;
use color_eyre::eyre;
use policy_config::Config;
use policy_domain::filter::RetrievalFilters;
use policy_retrieval::{
	PolicyRetriever, Providers, RetrievalBenchmarkCase, RetrievalBenchmarkReport, RetrievalRequest,
	RetrievalResponse,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
	version = policy_cli::VERSION,
	rename_all = "kebab",
	styles = policy_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'm', value_name = "FILE")]
	pub manifest: PathBuf,
	#[arg(
		long,
		short = 'd',
		value_name = "FILE",
		required_unless_present = "question",
		conflicts_with = "question"
	)]
	pub dataset: Option<PathBuf>,
	#[arg(long, short = 'q', value_name = "TEXT")]
	pub question: Option<String>,
	#[arg(long, value_name = "CODE")]
	pub jurisdiction: Option<String>,
	#[arg(long, value_name = "TAG", num_args = 1..)]
	pub scope: Vec<String>,
	#[arg(long, short = 'p', value_name = "NAME")]
	pub profile: Option<String>,
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	#[arg(long, value_name = "SCORE")]
	pub min_score: Option<f32>,
	#[arg(long, value_name = "ID")]
	pub trace_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvalDataset {
	pub name: Option<String>,
	pub top_k: Option<u32>,
	pub cases: Vec<RetrievalBenchmarkCase>,
}

#[derive(Debug, Serialize)]
pub struct EvalOutput {
	pub dataset: EvalDatasetInfo,
	pub settings: EvalSettings,
	pub report: RetrievalBenchmarkReport,
}

#[derive(Debug, Serialize)]
pub struct EvalDatasetInfo {
	pub name: String,
	pub case_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalSettings {
	pub manifest_path: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub version_tag: Option<String>,
	pub profile: String,
	pub top_k: u32,
	pub chunk_count: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = policy_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let retriever = build_retriever(&config, &args).await?;

	if let Some(dataset_path) = &args.dataset {
		let dataset = load_dataset(dataset_path)?;
		let output = evaluate(&config, &retriever, &dataset, &args).await?;
		let json = serde_json::to_string_pretty(&output)?;

		println!("{json}");

		if !output.report.meets_quality_gate {
			let report = &output.report;

			return Err(eyre::eyre!(
				"Quality gate failed: recall {:.3} (floor {:.3}), p95 {:.1} ms (ceiling {:.1} ms).",
				report.avg_recall_at_k,
				report.recall_floor,
				report.p95_latency_ms,
				report.latency_ceiling_ms,
			));
		}

		return Ok(());
	}

	let question = args
		.question
		.as_deref()
		.ok_or_else(|| eyre::eyre!("Either --dataset or --question is required."))?;
	let response = answer(&retriever, question, &args).await?;
	let json = serde_json::to_string_pretty(&response)?;

	println!("{json}");

	Ok(())
}

/// Loads the manifest, resolves providers from `config`, and builds the shared index.
pub async fn build_retriever(config: &Config, args: &Args) -> color_eyre::Result<PolicyRetriever> {
	let providers = Providers::from_config(config)?;
	let manifest = policy_retrieval::load_manifest(&args.manifest)?;
	let index =
		policy_retrieval::build_index_from_manifest(manifest, providers.embedding.as_deref())
			.await?;

	tracing::info!(
		manifest = %args.manifest.display(),
		version_tag = index.version_tag().unwrap_or_default(),
		chunks = index.len(),
		"Loaded corpus manifest."
	);

	Ok(PolicyRetriever::from_config(config, Arc::new(index), providers, args.profile.as_deref())?)
}

pub fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.cases.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one case."));
	}

	Ok(dataset)
}

pub async fn evaluate(
	config: &Config,
	retriever: &PolicyRetriever,
	dataset: &EvalDataset,
	args: &Args,
) -> color_eyre::Result<EvalOutput> {
	let top_k = args.top_k.or(dataset.top_k).unwrap_or(retriever.profile().top_k);
	let report = policy_retrieval::run_retrieval_benchmarks(
		retriever,
		&dataset.cases,
		top_k,
		&config.benchmark,
	)
	.await?;
	let index = retriever.index();

	Ok(EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "dataset".to_string()),
			case_count: dataset.cases.len(),
		},
		settings: EvalSettings {
			manifest_path: args.manifest.display().to_string(),
			version_tag: index.version_tag().map(str::to_string),
			profile: args
				.profile
				.clone()
				.unwrap_or_else(|| config.retrieval.default_profile.clone()),
			top_k,
			chunk_count: index.len(),
		},
		report,
	})
}

pub async fn answer(
	retriever: &PolicyRetriever,
	question: &str,
	args: &Args,
) -> color_eyre::Result<RetrievalResponse> {
	let mut request = RetrievalRequest::new(question)
		.with_filters(RetrievalFilters::new(args.jurisdiction.as_deref(), &args.scope));

	request.top_k = args.top_k;
	request.min_score_for_answer = args.min_score;
	request.trace_id = args.trace_id.clone();

	Ok(retriever.retrieve(request).await?)
}
