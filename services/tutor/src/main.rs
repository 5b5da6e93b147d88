//! Terminal client for the tutor.
//!
//! Talks to a running tutor API with `--server`, or calls the model
//! directly using the prompt templates under `--prompts`.

mod command;
mod render;
mod repl;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{Level, info, warn};
use tutor_core::{
    Mode, SessionOrchestrator,
    http_service::HttpTutorService,
    llm_client::{LLMClient, OpenAICompatibleClient, Provider},
    prompts::load_prompts,
    tutor_service::{LLMTutorService, TutorService},
};

#[derive(Parser, Debug)]
#[command(
    name = "tutor",
    version,
    about = "Interactive tutor for code review, algorithms, math and technical concepts"
)]
struct Args {
    /// Base URL of a tutor API server (omit to call the model directly)
    #[arg(long, env = "TUTOR_SERVER")]
    server: Option<String>,

    /// Directory of prompt templates, used without --server
    #[arg(long, env = "PROMPTS_PATH", default_value = "./prompts")]
    prompts: PathBuf,

    /// Model provider, used without --server
    #[arg(long, env = "LLM_PROVIDER", default_value = "anthropic")]
    provider: Provider,

    /// Upper bound on a single request, in seconds
    #[arg(long, default_value_t = 90)]
    timeout_secs: u64,

    /// Log level written to stderr
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    log_level: Level,

    /// Mode to start in
    #[arg(long)]
    mode: Option<Mode>,
}

fn build_service(args: &Args) -> Result<Arc<dyn TutorService>> {
    if let Some(server) = &args.server {
        info!(%server, "Using tutor server");
        return Ok(Arc::new(HttpTutorService::new(server.clone())));
    }

    let prompts = load_prompts(&args.prompts).context("Failed to load prompt templates")?;
    let key_var = args.provider.api_key_var();
    let client = std::env::var(key_var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(|key| {
            Arc::new(OpenAICompatibleClient::for_provider(args.provider, &key)) as Arc<dyn LLMClient>
        });
    let service = LLMTutorService::new(client, prompts);
    if service.is_configured() {
        info!(provider = %args.provider, model = args.provider.model(), "Calling model directly");
    } else {
        warn!("{} is not set", key_var);
        println!("{} is not set; requests will fail until it is.", key_var);
    }
    Ok(Arc::new(service))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let service = build_service(&args)?;

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let renderer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if let Some(text) = render::render_event(&event) {
                println!("{}", text);
            }
        }
    });

    let orchestrator = SessionOrchestrator::new(service)
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_events(events_tx);
    if let Some(mode) = args.mode {
        orchestrator.select(mode).await;
    }

    let mut repl = repl::Repl::new(orchestrator, BufReader::new(tokio::io::stdin()));
    repl.run().await?;

    renderer.abort();
    Ok(())
}
