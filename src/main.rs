use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use rankgap::core::app_state::AppState;
use rankgap::core::config;
use rankgap::embed::EmbeddingEngine;
use rankgap::fetch::ChromiumFetcher;
use rankgap::orchestrator::Orchestrator;
use rankgap::proxy::{ProxyPool, RotationStrategy};
use rankgap::serp::SerpApiProvider;
use rankgap::SeoError;

#[derive(Parser)]
#[command(name = "rankgap", about = "Competitive SEO gap analysis engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline for a project, end to end, resuming by default.
    Run {
        #[arg(long)]
        project: String,
        #[arg(long)]
        query: String,
        #[arg(long = "target-url")]
        target_url: String,
        #[arg(long = "top-n", default_value_t = 10)]
        top_n: u8,
        #[arg(long, conflicts_with = "fresh")]
        resume: bool,
        #[arg(long, conflicts_with = "resume")]
        fresh: bool,
    },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    let Command::Run { project, query, target_url, top_n, fresh, .. } = cli.command;

    let cfg = config::load_config();

    let serp_api_key = match cfg.serp.resolve_api_key() {
        Some(key) => key,
        None => {
            error!("missing SERP provider API key (set SERPAPI_KEY or rankgap.json's serp.api_key)");
            return 1;
        }
    };

    let http_client = match reqwest::Client::builder().timeout(std::time::Duration::from_secs(cfg.serp.resolve_timeout_secs())).build() {
        Ok(c) => c,
        Err(e) => {
            error!("failed to build HTTP client: {e}");
            return 1;
        }
    };

    let serp_client = Arc::new(SerpApiProvider::new(http_client.clone(), serp_api_key, cfg.serp.resolve_base_url()));

    info!("loading embedding model '{}'", cfg.embedding.resolve_model_id());
    let embedding_engine = match EmbeddingEngine::load(&cfg.embedding.resolve_model_id(), 32).await {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("failed to load embedding model: {e}");
            return 1;
        }
    };

    let (width, height) = cfg.fetch.resolve_viewport();
    let fetcher = match ChromiumFetcher::new(cfg.fetch.resolve_wait_ms(), (width, height)) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!("failed to initialize the fetcher: {e}");
            return 1;
        }
    };

    let mut state = AppState::new(http_client, cfg, embedding_engine, serp_client, fetcher);

    if let Some(proxy_path) = config::proxy_list_path() {
        match ProxyPool::load(&proxy_path, RotationStrategy::Sequential).await {
            Ok(pool) => state = state.with_proxy_pool(Arc::new(pool)),
            Err(e) => {
                error!("failed to load proxy list from {proxy_path}: {e}");
                return 1;
            }
        }
    }

    let orchestrator = Orchestrator::new(Arc::new(state), config::projects_root());

    match orchestrator.run(&project, &query, &target_url, top_n, fresh).await {
        Ok(outcome) => {
            if outcome.failed_urls.is_empty() {
                info!("project '{project}' completed");
                0
            } else {
                info!("project '{project}' completed with {} failed URL(s)", outcome.failed_urls.len());
                2
            }
        }
        Err(SeoError::LockHeld { .. }) => {
            error!("project '{project}' is locked by another orchestrator run");
            3
        }
        Err(e) => {
            error!("project '{project}' failed: {e}");
            1
        }
    }
}
