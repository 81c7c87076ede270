//! CLI - Command Line Interface
//!
//! Available Commands:
//! - imds ask "question"      - Full pipeline: extract, match, recommend
//! - imds extract "question"  - Show rule, LLM and merged parameters
//! - imds match --feature ... - Match explicit parameters against the store
//!
//! Exit status: 0 success, 2 when the answer carries an error (an
//! unreachable knowledge store included), 1 when configuration or the
//! snapshot cannot be loaded.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use imds_core::extraction::{FeatureNormalizer, LlmExtractor, ParameterDefaulter};
use imds_core::llm::SharedLanguageModel;
use imds_core::{ConfigError, DimensionKey, ImdsConfig, Parameters, ProcessStage, RequestId};
use imds_decision::{AdvisoryAnswer, Explainer, MachiningAdvisor};
use imds_storage::{MemoryKnowledgeStore, SharedKnowledgeStore, StoreError};

use crate::output::{render_answer, render_extraction, render_match, render_match_error, OutputFormat};
use crate::provider_config::{create_language_model, open_store};

/// CLI Errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Knowledge store error: {0}")]
    Store(#[from] StoreError),

    #[error("Output error: {0}")]
    Output(String),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliStatus {
    Success,
    AnswerError,
}

impl CliStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            CliStatus::Success => 0,
            CliStatus::AnswerError => 2,
        }
    }
}

/// IMDS CLI
#[derive(Parser, Debug)]
#[command(name = "imds")]
#[command(author, version, about = "智能加工决策系统", long_about = None)]
pub(crate) struct Cli {
    /// Configuration file (default: ./imds.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge snapshot JSON for the memory backend
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    /// Disable the language model
    #[arg(long, global = true)]
    no_llm: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Ask a machining question
    Ask(QuestionArgs),

    /// Extract parameters without matching
    Extract(QuestionArgs),

    /// Match explicit parameters
    Match(MatchArgs),
}

#[derive(Args, Debug)]
pub(crate) struct QuestionArgs {
    /// Question text
    pub question: String,
}

#[derive(Args, Debug)]
pub(crate) struct MatchArgs {
    /// Feature name (synonyms are normalized)
    #[arg(long)]
    pub feature: Option<String>,

    /// Surface type
    #[arg(long)]
    pub surface: Option<String>,

    /// Process stage (粗加工 / 半精加工 / 精加工 / 清根, or English names)
    #[arg(long, value_parser = parse_stage)]
    pub stage: Option<ProcessStage>,

    #[arg(long)]
    pub diameter: Option<f64>,

    #[arg(long)]
    pub length: Option<f64>,

    #[arg(long)]
    pub width: Option<f64>,

    #[arg(long)]
    pub height: Option<f64>,

    #[arg(long)]
    pub depth: Option<f64>,
}

fn parse_stage(s: &str) -> Result<ProcessStage, String> {
    s.parse::<ProcessStage>().map_err(|e| e.to_string())
}

impl MatchArgs {
    fn into_parameters(self) -> Parameters {
        let normalizer = FeatureNormalizer::default();
        let mut params = Parameters {
            feature_name: self.feature.map(|f| normalizer.normalize(&f)),
            surface_type: self.surface,
            process_stage: self.stage,
            ..Parameters::default()
        };
        let dimensions = [
            (DimensionKey::Diameter, self.diameter),
            (DimensionKey::Length, self.length),
            (DimensionKey::Width, self.width),
            (DimensionKey::Height, self.height),
            (DimensionKey::Depth, self.depth),
        ];
        for (key, value) in dimensions {
            if let Some(value) = value {
                if !params.dimensions.set(key, value) {
                    warn!(%key, value, "Ignoring non-positive dimension");
                }
            }
        }
        params
    }
}

/// Global options shared by every command
struct Context {
    config: ImdsConfig,
    snapshot: Option<PathBuf>,
    no_llm: bool,
    format: OutputFormat,
}

impl Context {
    fn language_model(&self) -> Option<SharedLanguageModel> {
        if self.no_llm {
            return None;
        }
        let llm = self.config.active_llm()?;
        match create_language_model(llm) {
            Ok(service) => {
                info!(provider = %llm.provider, model = %llm.model, "Language model enabled");
                Some(service)
            }
            Err(e) => {
                warn!(error = %e, "Language model unavailable, continuing with rule extraction");
                None
            }
        }
    }

    fn advisor(&self, store: SharedKnowledgeStore) -> MachiningAdvisor {
        let timeout = self.config.pipeline.llm_timeout();
        let mut advisor = MachiningAdvisor::new(store);
        if let Some(service) = self.language_model() {
            if self.config.pipeline.explain {
                advisor = advisor.with_explainer(Explainer::new(service.clone(), timeout));
            }
            advisor = advisor.with_llm_extractor(LlmExtractor::new(service).with_timeout(timeout));
        }
        advisor
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse CLI arguments and execute commands
pub async fn run_cli() -> Result<CliStatus, CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ImdsConfig::load(cli.config.as_deref())?;
    let ctx = Context {
        config,
        snapshot: cli.snapshot,
        no_llm: cli.no_llm,
        format: cli.output.unwrap_or_default(),
    };

    match cli.command {
        Commands::Ask(args) => cmd_ask(args, &ctx).await,
        Commands::Extract(args) => cmd_extract(args, &ctx).await,
        Commands::Match(args) => cmd_match(args, &ctx).await,
    }
}

async fn cmd_ask(args: QuestionArgs, ctx: &Context) -> Result<CliStatus, CliError> {
    let answer = match open_store(&ctx.config.store, ctx.snapshot.clone()).await {
        Ok(store) => ctx.advisor(store).ask(&args.question).await,
        Err(CliError::Store(e @ StoreError::Connectivity(_))) => {
            warn!(error = %e, "Knowledge store unreachable");
            // extraction never touches the store, so it is still reported
            let report = ctx
                .advisor(Arc::new(MemoryKnowledgeStore::new()))
                .extract(&args.question)
                .await;
            AdvisoryAnswer::failed(
                RequestId::new(),
                &args.question,
                report.merged,
                report.llm.confidence,
                &e,
            )
        }
        Err(e) => return Err(e),
    };
    println!("{}", render_answer(&answer, ctx.format)?);

    Ok(if answer.is_error() {
        CliStatus::AnswerError
    } else {
        CliStatus::Success
    })
}

async fn cmd_extract(args: QuestionArgs, ctx: &Context) -> Result<CliStatus, CliError> {
    // extraction never touches the store
    let advisor = ctx.advisor(Arc::new(MemoryKnowledgeStore::new()));
    let report = advisor.extract(&args.question).await;
    println!("{}", render_extraction(&report, ctx.format)?);
    Ok(CliStatus::Success)
}

async fn cmd_match(args: MatchArgs, ctx: &Context) -> Result<CliStatus, CliError> {
    let request_id = RequestId::new();
    let params = ParameterDefaulter.complete(args.into_parameters());

    let result = match open_store(&ctx.config.store, ctx.snapshot.clone()).await {
        Ok(store) => MachiningAdvisor::new(store)
            .recommend(&params)
            .await
            .map_err(|e| e.to_string()),
        Err(CliError::Store(e @ StoreError::Connectivity(_))) => Err(e.to_string()),
        Err(e) => return Err(e),
    };

    match result {
        Ok(recommendation) => {
            println!("{}", render_match(request_id, &params, &recommendation, ctx.format)?);
            Ok(CliStatus::Success)
        }
        Err(error) => {
            warn!(%error, "Match failed");
            println!("{}", render_match_error(request_id, &params, &error, ctx.format)?);
            Ok(CliStatus::AnswerError)
        }
    }
}
