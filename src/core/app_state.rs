use std::sync::Arc;

use crate::core::config::RankGapConfig;
use crate::embed::Embedder;
use crate::fetch::Fetcher;
use crate::proxy::ProxyPool;
use crate::serp::SerpClient;

/// Shared runtime dependencies wired once at process start and threaded
/// through the orchestrator and every pipeline stage.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<RankGapConfig>,
    pub proxy_pool: Option<Arc<ProxyPool>>,
    pub embedding_engine: Arc<dyn Embedder>,
    pub serp_client: Arc<dyn SerpClient>,
    pub fetcher: Arc<dyn Fetcher>,
    /// Caps concurrent outbound fetches across the whole process, independent
    /// of the per-project worker concurrency knob.
    pub outbound_limit: Arc<tokio::sync::Semaphore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("proxy_pool_enabled", &self.proxy_pool.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(
        http_client: reqwest::Client,
        config: RankGapConfig,
        embedding_engine: Arc<dyn Embedder>,
        serp_client: Arc<dyn SerpClient>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let outbound_limit = std::env::var("OUTBOUND_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(32);

        Self {
            http_client,
            config: Arc::new(config),
            proxy_pool: None,
            embedding_engine,
            serp_client,
            fetcher,
            outbound_limit: Arc::new(tokio::sync::Semaphore::new(outbound_limit)),
        }
    }

    pub fn with_proxy_pool(mut self, pool: Arc<ProxyPool>) -> Self {
        self.proxy_pool = Some(pool);
        self
    }
}
