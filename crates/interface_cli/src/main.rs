//! Command-line runner for the coverage resolution engine
//!
//! Loads the tenant vocabulary and engine settings, reads a claim file
//! (line items) and a policy file, runs the analysis, and prints the
//! `CoverageAnalysisResult` as JSON. Without an `OPENAI_API_KEY` the engine
//! runs offline and unresolved items surface as REVIEW_NEEDED.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use core_kernel::ClaimId;
use domain_coverage::{
    CoverageAnalyzer, DisabledLanguageModel, LanguageModel, LineItem, OpenAiChat,
    TracingAuditSink,
};
use domain_policy::{ComponentVocabulary, EngineSettings, PolicyContext};

const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Parser, Debug)]
#[command(
    name = "coverage-engine",
    about = "Resolve line-item coverage for a vehicle-repair claim",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one claim and print the result as JSON
    Analyze {
        /// Claim file: JSON array of line items
        #[arg(long)]
        claim: PathBuf,
        /// Policy context file (JSON)
        #[arg(long)]
        policy: PathBuf,
        /// Tenant vocabulary file (JSON or YAML)
        #[arg(long)]
        vocabulary: PathBuf,
        /// Optional engine settings file; defaults + environment otherwise
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct ClaimFile {
    items: Vec<LineItem>,
}

fn init_telemetry() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn build_model(settings: &EngineSettings) -> Arc<dyn LanguageModel> {
    match std::env::var(ENV_OPENAI_API_KEY) {
        Ok(key) if !key.is_empty() => {
            let timeout = std::time::Duration::from_secs(settings.llm.request_timeout_secs);
            match OpenAiChat::new(settings.llm.api_base.clone(), key, timeout) {
                Ok(client) => return Arc::new(client),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to build chat client, running offline");
                }
            }
        }
        _ => {
            tracing::warn!(
                "{ENV_OPENAI_API_KEY} not set, running offline; unresolved items go to review"
            );
        }
    }
    Arc::new(DisabledLanguageModel)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_telemetry();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze {
            claim,
            policy,
            vocabulary,
            settings,
        } => {
            let vocabulary = ComponentVocabulary::from_file(&vocabulary)?;
            let settings = match settings {
                Some(path) => EngineSettings::from_file(&path)?,
                None => EngineSettings::from_env()?,
            };

            let claim: ClaimFile = serde_json::from_str(&std::fs::read_to_string(&claim)?)?;
            let policy: PolicyContext = serde_json::from_str(&std::fs::read_to_string(&policy)?)?;

            let model = build_model(&settings);
            let analyzer = CoverageAnalyzer::new(
                vocabulary,
                settings,
                model,
                Arc::new(TracingAuditSink),
            )?;

            let result = analyzer
                .analyze(ClaimId::new_v7(), &claim.items, &policy)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
