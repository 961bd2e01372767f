//! Orchestrator drives the project pipeline as one sequential-stage,
//! fan-out-within-stage state machine. Concurrency within stage 03 is
//! bounded with `futures::stream::buffer_unordered`, sized from
//! `FetchSubConfig::resolve_concurrency`.

pub mod project_store;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::antibot::RequestDelay;
use crate::core::app_state::AppState;
use crate::core::errors::{Result, SeoError};
use crate::core::types::{
    ContentScore, Embedding, ExtractionMethod, GapReport, PageSnapshot, PhraseSet, ProjectConfig, ProjectStatus,
    SerpRanking, SerpResult, Stage, SCHEMA_VERSION,
};
use crate::extract::Extractor;
use crate::fetch::FetchedPage;
use crate::gap::GapAnalyzer;
use crate::phrase::PhraseMiner;
use crate::score::Scorer;
use crate::serp::{self, Device};

use project_store::{slugify_url, ProjectStore};

/// Per-proxy retry attempts before a URL is given up on.
const MAX_FETCH_RETRIES: u32 = 3;
/// Base delay for the exponential backoff between retries (delay doubles
/// each attempt: 2s, 4s, ...).
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: ProjectStatus,
    pub failed_urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompetitorUrls {
    urls: Vec<String>,
    #[serde(default)]
    schema_version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct FailedScrape {
    url: String,
    reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotProcessing {
    url: String,
    snapshot_hash: u64,
    phrase_set: PhraseSet,
    embedding: Embedding,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompetitorProcessing {
    entries: Vec<SnapshotProcessing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UrlScore {
    url: String,
    score: ContentScore,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompetitiveAnalysis {
    target: UrlScore,
    competitors: Vec<UrlScore>,
    /// Cache key (PhraseSet hash, query). Not meant to be read by
    /// downstream consumers, only compared against on resume.
    #[serde(default)]
    query: String,
    #[serde(default)]
    target_hash: u64,
    #[serde(default)]
    competitor_hashes: Vec<u64>,
    #[serde(default)]
    schema_version: u32,
}

pub struct Orchestrator {
    state: Arc<AppState>,
    store: ProjectStore,
}

impl Orchestrator {
    pub fn new(state: Arc<AppState>, projects_root: impl Into<std::path::PathBuf>) -> Self {
        Self { state, store: ProjectStore::new(projects_root) }
    }

    /// Runs every stage for `project_name`, in order, skipping a stage whose
    /// artifact already satisfies its cache key unless `fresh` is set.
    /// SERP failure is stage-fatal and propagates; per-URL
    /// fetch failures are recorded and the run continues.
    pub async fn run(&self, project_name: &str, query: &str, target_url: &str, top_n: u8, fresh: bool) -> Result<RunOutcome> {
        let _lock = self.store.lock(project_name).await?;

        let mut config = match self.store.load_config(project_name).await? {
            Some(existing) if !fresh => existing,
            _ => ProjectConfig::new(project_name, query, target_url, top_n),
        };
        config.query = query.to_string();
        config.target_url = target_url.to_string();
        config.top_n = top_n.clamp(1, 20);
        config.status = ProjectStatus::Running;
        self.store.save_config(&config).await?;

        let run_result = self.run_stages(&mut config, fresh).await;

        match &run_result {
            Ok(outcome) => {
                config.status = outcome.status;
                config.last_error = None;
            }
            Err(e) => {
                config.status = ProjectStatus::Failed;
                config.last_error = Some(e.to_string());
            }
        }
        config.last_updated = chrono::Utc::now();
        self.store.save_config(&config).await?;

        run_result
    }

    async fn run_stages(&self, config: &mut ProjectConfig, fresh: bool) -> Result<RunOutcome> {
        let project = config.project_name.clone();
        let query = config.query.clone();
        let target_url = config.target_url.clone();

        let serp_result = self.stage_serp_results(&project, &query, &target_url, config.top_n, fresh).await?;
        config.steps_completed.insert(Stage::SerpResults);
        config.current_step = Some(Stage::CompetitorContent);

        let competitor_urls: Vec<String> = serp_result
            .organic_results
            .iter()
            .map(|r| r.url.clone())
            .filter(|u| !serp::same_page(u, &target_url))
            .take(config.top_n as usize)
            .collect();

        let (target_snapshot, competitor_snapshots, failed_urls) = self.stage_competitor_content(&project, &query, &target_url, &competitor_urls, &serp_result).await?;
        config.steps_completed.insert(Stage::CompetitorContent);
        config.current_step = Some(Stage::ContentProcessing);

        let (target_processing, competitor_processing) = self.stage_content_processing(&project, &target_snapshot, &competitor_snapshots).await?;
        config.steps_completed.insert(Stage::ContentProcessing);
        config.current_step = Some(Stage::CompetitiveAnalysis);

        let analysis = self
            .stage_competitive_analysis(&project, &query, &target_snapshot, &target_processing, &competitor_snapshots, &competitor_processing)
            .await?;
        config.steps_completed.insert(Stage::CompetitiveAnalysis);
        config.current_step = Some(Stage::Optimization);

        let gap_report = self
            .stage_optimization(&project, &query, &target_processing, &competitor_processing)
            .await?;
        config.steps_completed.insert(Stage::Optimization);
        config.current_step = Some(Stage::FinalReports);

        self.stage_final_reports(&project, &target_url, &analysis, &gap_report).await?;
        config.steps_completed.insert(Stage::FinalReports);
        config.current_step = None;

        // Partial success (some URLs failed) is still a completed project.
        // `failed_urls` is what the CLI inspects to choose exit code 2.
        Ok(RunOutcome { status: ProjectStatus::Completed, failed_urls })
    }

    async fn stage_serp_results(&self, project: &str, query: &str, target_url: &str, top_n: u8, fresh: bool) -> Result<SerpResult> {
        if !fresh {
            if let Some(cached) = self.store.read_stage_artifact::<SerpResult>(project, Stage::SerpResults, "serp_results.json").await? {
                if cached.query == query {
                    info!("stage 02_serp_results: cache hit for query '{}'", query);
                    return Ok(cached);
                }
            }
        }

        let mut result = self
            .state
            .serp_client
            .search(query, "us", "en", top_n, Device::Desktop)
            .await
            .map_err(|e| SeoError::Serp { provider: "serp".to_string(), status: None, reason: e.to_string() })?;
        result.target_ranking = serp::find_target_ranking(&result, target_url);

        self.store.write_stage_artifact(project, Stage::SerpResults, "serp_results.json", &result).await?;
        let competitor_urls = CompetitorUrls { urls: result.organic_results.iter().map(|r| r.url.clone()).collect(), schema_version: SCHEMA_VERSION };
        self.store.write_stage_artifact(project, Stage::SerpResults, "competitor_urls.json", &competitor_urls).await?;

        Ok(result)
    }

    async fn stage_competitor_content(
        &self,
        project: &str,
        query: &str,
        target_url: &str,
        competitor_urls: &[String],
        serp_result: &SerpResult,
    ) -> Result<(PageSnapshot, Vec<PageSnapshot>, Vec<String>)> {
        let mut all_urls = vec![target_url.to_string()];
        all_urls.extend(competitor_urls.iter().cloned());

        let concurrency = self.state.config.fetch.resolve_concurrency();
        let rate_limit_ms = self.state.config.fetch.resolve_rate_limit_ms();

        let results: Vec<std::result::Result<PageSnapshot, (String, SeoError)>> = stream::iter(all_urls.into_iter())
            .map(|url| {
                let state = Arc::clone(&self.state);
                let store = self.store.clone();
                let project = project.to_string();
                let query = query.to_string();
                let serp_result = serp_result.clone();
                let delay = RequestDelay::fixed(rate_limit_ms);
                async move { fetch_and_extract_one(state, store, &project, &url, &query, &serp_result, &delay).await }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut failed_urls = Vec::new();
        let mut snapshots = Vec::new();
        for r in results {
            match r {
                Ok(snap) => snapshots.push(snap),
                Err((url, error)) => {
                    if !error.is_per_item() {
                        // Stage-fatal: a proxy-pool/config failure, not something
                        // local to this one URL. Escalate instead of recording it
                        // as a per-URL failure and moving on.
                        return Err(error);
                    }
                    let reason = error.to_string();
                    warn!("stage 03_competitor_content: {} failed: {}", url, reason);
                    failed_urls.push(url.clone());
                    let slug = slugify_url(&url);
                    let _ = self.store.write_stage_artifact(project, Stage::CompetitorContent, &format!("failed_scrapes/{slug}"), &FailedScrape { url, reason }).await;
                }
            }
        }

        if snapshots.is_empty() {
            return Err(SeoError::Fetch { url: target_url.to_string(), reason: "no snapshot captured, including the target URL".to_string() });
        }

        let target_snapshot = snapshots
            .iter()
            .position(|s| s.url == target_url)
            .map(|i| snapshots.remove(i))
            .ok_or_else(|| SeoError::Fetch { url: target_url.to_string(), reason: "target URL could not be fetched".to_string() })?;

        Ok((target_snapshot, snapshots, failed_urls))
    }


    async fn stage_content_processing(&self, project: &str, target: &PageSnapshot, competitors: &[PageSnapshot]) -> Result<(SnapshotProcessing, Vec<SnapshotProcessing>)> {
        if let Some(cached) = self.cached_content_processing(project, target, competitors).await? {
            info!("stage 04_content_processing: cache hit for {} snapshot(s)", competitors.len() + 1);
            return Ok(cached);
        }

        let miner = PhraseMiner::new();

        let target_processing = self.process_one(project, &miner, target).await?;
        self.store.write_stage_artifact(project, Stage::ContentProcessing, "target_processing.json", &target_processing).await?;

        let mut competitor_processing = Vec::with_capacity(competitors.len());
        for snapshot in competitors {
            competitor_processing.push(self.process_one(project, &miner, snapshot).await?);
        }
        self.store
            .write_stage_artifact(project, Stage::ContentProcessing, "competitor_processing.json", &CompetitorProcessing { entries: competitor_processing.clone() })
            .await?;

        Ok((target_processing, competitor_processing))
    }

    /// Cache key is the `PageSnapshot` hash. Returns `Some`
    /// only when the stored target and competitor hashes match the current
    /// snapshots exactly, including set membership (a competitor dropping
    /// out of the top-N is a cache miss).
    async fn cached_content_processing(&self, project: &str, target: &PageSnapshot, competitors: &[PageSnapshot]) -> Result<Option<(SnapshotProcessing, Vec<SnapshotProcessing>)>> {
        let Some(target_processing) = self.store.read_stage_artifact::<SnapshotProcessing>(project, Stage::ContentProcessing, "target_processing.json").await? else {
            return Ok(None);
        };
        if target_processing.snapshot_hash != hash_snapshot(target) {
            return Ok(None);
        }

        let Some(stored) = self.store.read_stage_artifact::<CompetitorProcessing>(project, Stage::ContentProcessing, "competitor_processing.json").await? else {
            return Ok(None);
        };
        if stored.entries.len() != competitors.len() {
            return Ok(None);
        }

        let mut by_url: std::collections::HashMap<&str, &SnapshotProcessing> = stored.entries.iter().map(|e| (e.url.as_str(), e)).collect();
        let mut competitor_processing = Vec::with_capacity(competitors.len());
        for snapshot in competitors {
            let Some(entry) = by_url.remove(snapshot.url.as_str()) else { return Ok(None) };
            if entry.snapshot_hash != hash_snapshot(snapshot) {
                return Ok(None);
            }
            competitor_processing.push(entry.clone());
        }

        Ok(Some((target_processing, competitor_processing)))
    }

    async fn process_one(&self, _project: &str, miner: &PhraseMiner, snapshot: &PageSnapshot) -> Result<SnapshotProcessing> {
        let phrase_set = miner.extract(&snapshot.text);
        let embedding_vec = self.state.embedding_engine.encode_one(&snapshot.text).await?;
        Ok(SnapshotProcessing { url: snapshot.url.clone(), snapshot_hash: hash_snapshot(snapshot), phrase_set, embedding: Embedding { vector: embedding_vec } })
    }

    async fn stage_competitive_analysis(
        &self,
        project: &str,
        query: &str,
        target: &PageSnapshot,
        target_processing: &SnapshotProcessing,
        competitors: &[PageSnapshot],
        competitor_processing: &[SnapshotProcessing],
    ) -> Result<CompetitiveAnalysis> {
        let mut competitor_hashes: Vec<u64> = competitor_processing.iter().map(|c| c.snapshot_hash).collect();
        competitor_hashes.sort_unstable();

        if let Some(cached) = self.store.read_stage_artifact::<CompetitiveAnalysis>(project, Stage::CompetitiveAnalysis, "competitive_analysis.json").await? {
            let mut cached_hashes = cached.competitor_hashes.clone();
            cached_hashes.sort_unstable();
            if cached.query == query && cached.target_hash == target_processing.snapshot_hash && cached_hashes == competitor_hashes {
                info!("stage 05_competitive_analysis: cache hit for query '{}'", query);
                return Ok(cached);
            }
        }

        let scorer = Scorer::new(Arc::clone(&self.state.embedding_engine));

        let target_score = scorer.score(&target.title, &target.meta_description, &target.text, Some(query)).await?;
        let mut competitor_scores = Vec::with_capacity(competitors.len());
        for snapshot in competitors {
            let score = scorer.score(&snapshot.title, &snapshot.meta_description, &snapshot.text, Some(query)).await?;
            competitor_scores.push(UrlScore { url: snapshot.url.clone(), score });
        }

        let analysis = CompetitiveAnalysis {
            target: UrlScore { url: target.url.clone(), score: target_score },
            competitors: competitor_scores,
            query: query.to_string(),
            target_hash: target_processing.snapshot_hash,
            competitor_hashes,
            schema_version: SCHEMA_VERSION,
        };
        self.store.write_stage_artifact(project, Stage::CompetitiveAnalysis, "competitive_analysis.json", &analysis).await?;
        Ok(analysis)
    }

    async fn stage_optimization(&self, project: &str, query: &str, target: &SnapshotProcessing, competitors: &[SnapshotProcessing]) -> Result<GapReport> {
        let analyzer = GapAnalyzer::new(Arc::clone(&self.state.embedding_engine));
        let competitor_phrase_sets: Vec<(String, PhraseSet)> = competitors.iter().map(|c| (c.url.clone(), c.phrase_set.clone())).collect();
        let report = analyzer.analyze(&target.phrase_set, &competitor_phrase_sets, query).await?;

        self.store.write_stage_artifact(project, Stage::Optimization, "semantic_gaps.json", &report).await?;
        let recommendation_phrases: Vec<String> = report.gaps.iter().map(|g| g.phrase.clone()).collect();
        self.store.write_stage_artifact(project, Stage::Optimization, "recommendations.json", &recommendation_phrases).await?;

        Ok(report)
    }

    async fn stage_final_reports(&self, project: &str, target_url: &str, analysis: &CompetitiveAnalysis, gap_report: &GapReport) -> Result<()> {
        let summary = render_executive_summary(target_url, analysis, gap_report);
        self.store.write_text(project, Stage::FinalReports, "executive_summary/executive_summary.md", &summary).await?;

        let guide = render_implementation_guide(analysis, gap_report);
        self.store.write_text(project, Stage::FinalReports, "implementation_guide/implementation_guide.md", &guide).await?;

        Ok(())
    }
}

async fn fetch_and_extract_one(
    state: Arc<AppState>,
    store: ProjectStore,
    project: &str,
    url: &str,
    query: &str,
    serp_result: &SerpResult,
    delay: &RequestDelay,
) -> std::result::Result<PageSnapshot, (String, SeoError)> {
    let slug = slugify_url(url);

    if let Ok(Some(existing)) = store.read_stage_artifact::<PageSnapshot>(project, Stage::CompetitorContent, &format!("extracted_content/{slug}")).await {
        if existing.reusable_for(url, query) {
            info!("stage 03_competitor_content: cache hit for {}", url);
            return Ok(existing);
        }
    }

    delay.wait().await;
    let fetched = fetch_with_retry(&state, url, RETRY_BASE_DELAY).await.map_err(|e| (url.to_string(), e))?;

    let extractor = Extractor::new();
    let extracted = extractor.extract(url, &fetched.html).map_err(|e| (url.to_string(), e))?;

    let serp_ranking = serp::find_target_ranking(serp_result, url).map(SerpRanking::Position).unwrap_or_else(SerpRanking::not_ranking);

    let snapshot = PageSnapshot {
        url: url.to_string(),
        final_url: fetched.final_url,
        title: extracted.title,
        meta_description: extracted.meta_description,
        text: extracted.text,
        headings: extracted.headings,
        raw_html: Some(fetched.html),
        serp_ranking,
        query: query.to_string(),
        scraping_timestamp: chrono::Utc::now(),
        extraction_method: extracted.method,
        schema_version: SCHEMA_VERSION,
    };

    let _ = store.write_stage_artifact(project, Stage::CompetitorContent, &format!("extracted_content/{slug}"), &snapshot).await;
    let _ = store.write_stage_artifact(project, Stage::CompetitorContent, &format!("raw_backups/{slug}"), &snapshot).await;

    Ok(snapshot)
}

/// Fetches `url` with a fresh proxy from the pool on each attempt, up to
/// `MAX_FETCH_RETRIES` attempts. A proxy that fails a fetch is marked failed
/// before the next attempt, so retries rotate onto a different proxy rather
/// than hammering the same dead one. Delay between attempts doubles each
/// time starting from `RETRY_BASE_DELAY`. A pool with every proxy already
/// failed surfaces `SeoError::ProxyExhausted` immediately rather than being
/// retried, since no attempt would have a proxy to try.
async fn fetch_with_retry(state: &Arc<AppState>, url: &str, base_delay: Duration) -> Result<FetchedPage> {
    let mut backoff = ExponentialBackoff {
        current_interval: base_delay,
        initial_interval: base_delay,
        multiplier: 2.0,
        randomization_factor: 0.0,
        max_interval: Duration::from_secs(60),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    };

    let mut last_err = None;
    for attempt in 0..MAX_FETCH_RETRIES {
        let proxy = match &state.proxy_pool {
            Some(pool) => Some(pool.next()?),
            None => None,
        };

        let _permit = state.outbound_limit.acquire().await.expect("semaphore closed");
        match state.fetcher.fetch(url, proxy.as_deref()).await {
            Ok(page) => return Ok(page),
            Err(e) => {
                if let (Some(pool), Some(p)) = (&state.proxy_pool, &proxy) {
                    pool.mark_failed(p);
                }
                warn!("fetch attempt {} of {} failed for {}: {}", attempt + 1, MAX_FETCH_RETRIES, url, e);
                last_err = Some(e);
                if attempt + 1 < MAX_FETCH_RETRIES {
                    if let Some(wait) = backoff.next_backoff() {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
    }

    Err(last_err.unwrap_or(SeoError::Fetch { url: url.to_string(), reason: "exhausted retries".to_string() }))
}

fn hash_snapshot(snapshot: &PageSnapshot) -> u64 {
    let mut hasher = DefaultHasher::new();
    snapshot.url.hash(&mut hasher);
    snapshot.query.hash(&mut hasher);
    snapshot.text.hash(&mut hasher);
    hasher.finish()
}

fn render_executive_summary(target_url: &str, analysis: &CompetitiveAnalysis, gap_report: &GapReport) -> String {
    let score = &analysis.target.score;
    let mut out = String::new();
    out.push_str(&format!("# Executive Summary — {target_url}\n\n"));
    out.push_str(&format!("SEO score: {:.1}\n\n", score.seo_score));
    out.push_str(&format!("Composite score: {:.1}\n\n", score.composite_score));
    out.push_str(&format!(
        "Semantic gaps found: {} ({} high impact)\n\n",
        gap_report.coverage.semantic_gaps_found, gap_report.coverage.high_impact_recommendations
    ));
    if !score.recommendations.is_empty() {
        out.push_str("## Recommendations\n\n");
        for rec in &score.recommendations {
            out.push_str(&format!("- {rec}\n"));
        }
    }
    out
}

fn render_implementation_guide(analysis: &CompetitiveAnalysis, gap_report: &GapReport) -> String {
    let mut out = String::new();
    out.push_str("# Implementation Guide\n\n");
    out.push_str("## Semantic gaps to close, ranked by estimated impact\n\n");
    for gap in &gap_report.gaps {
        out.push_str(&format!(
            "- **{}** — impact {:.2}, used by {} competitor(s)\n",
            gap.phrase, gap.estimated_impact, gap.competitor_usage
        ));
    }
    out.push_str("\n## Competitor scores\n\n");
    for competitor in &analysis.competitors {
        out.push_str(&format!("- {} — SEO score {:.1}\n", competitor.url, competitor.score.seo_score));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Heading as HeadingType;
    use crate::fetch::Fetcher;
    use crate::proxy::{ProxyPool, RotationStrategy};

    /// Fails every call made with `fails_on_proxy`, succeeds otherwise.
    /// Lets a test drive a specific proxy through a failing attempt without
    /// depending on `ProxyPool`'s rotation order.
    struct FlakyFetcher {
        fails_on_proxy: &'static str,
    }

    #[async_trait::async_trait]
    impl Fetcher for FlakyFetcher {
        async fn fetch(&self, url: &str, proxy: Option<&str>) -> Result<crate::fetch::FetchedPage> {
            if proxy == Some(self.fails_on_proxy) {
                return Err(SeoError::Fetch { url: url.to_string(), reason: "proxy refused connection".to_string() });
            }
            Ok(crate::fetch::FetchedPage { final_url: url.to_string(), html: "<html><body>ok</body></html>".to_string() })
        }
    }

    fn state_with_flaky_fetcher(fails_on_proxy: &'static str) -> Arc<AppState> {
        use crate::embed::StubEmbedder;
        use crate::serp::StubSerpClient;
        let serp_result = SerpResult { query: "q".into(), organic_results: vec![], target_ranking: None, schema_version: SCHEMA_VERSION };
        let pool = ProxyPool::from_lines("p1\np2\n", RotationStrategy::Sequential).unwrap();
        let state = AppState::new(
            reqwest::Client::new(),
            crate::core::config::RankGapConfig::default(),
            Arc::new(StubEmbedder::new(8)),
            Arc::new(StubSerpClient::new(serp_result)),
            Arc::new(FlakyFetcher { fails_on_proxy }),
        )
        .with_proxy_pool(Arc::new(pool));
        Arc::new(state)
    }

    #[tokio::test]
    async fn retries_onto_next_proxy_after_first_fails() {
        let state = state_with_flaky_fetcher("p1");
        let page = fetch_with_retry(&state, "https://c1.test", Duration::from_millis(1)).await.unwrap();
        assert!(page.html.contains("ok"));
    }

    #[tokio::test]
    async fn gives_up_after_max_retries_when_every_proxy_fails() {
        // A fetcher that rejects every proxy forces all MAX_FETCH_RETRIES
        // attempts to fail; the caller gets the last error back instead of
        // retrying forever.
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl Fetcher for AlwaysFails {
            async fn fetch(&self, url: &str, _proxy: Option<&str>) -> Result<crate::fetch::FetchedPage> {
                Err(SeoError::Fetch { url: url.to_string(), reason: "down".to_string() })
            }
        }
        let pool = ProxyPool::from_lines("p1\np2\n", RotationStrategy::Sequential).unwrap();
        let state = Arc::new(
            AppState::new(
                reqwest::Client::new(),
                crate::core::config::RankGapConfig::default(),
                Arc::new(crate::embed::StubEmbedder::new(8)),
                Arc::new(crate::serp::StubSerpClient::new(SerpResult { query: "q".into(), organic_results: vec![], target_ranking: None, schema_version: SCHEMA_VERSION })),
                Arc::new(AlwaysFails),
            )
            .with_proxy_pool(Arc::new(pool)),
        );
        let err = fetch_with_retry(&state, "https://c1.test", Duration::from_millis(1)).await.unwrap_err();
        assert!(err.is_per_item());
    }

    #[test]
    fn hash_snapshot_changes_with_text() {
        let base = PageSnapshot {
            url: "https://a.test".into(),
            final_url: "https://a.test".into(),
            title: "t".into(),
            meta_description: "".into(),
            text: "hello world".into(),
            headings: vec![HeadingType { level: 1, text: "t".into() }],
            raw_html: None,
            serp_ranking: SerpRanking::not_ranking(),
            query: "q".into(),
            scraping_timestamp: chrono::Utc::now(),
            extraction_method: ExtractionMethod::Primary,
            schema_version: SCHEMA_VERSION,
        };
        let mut changed = base.clone();
        changed.text = "different text entirely".into();
        assert_ne!(hash_snapshot(&base), hash_snapshot(&changed));
    }
}
