//! End-to-end orchestrator scenarios: a fresh run, a resume after an
//! intermediate stage's artifacts are deleted, and a query change that must
//! invalidate downstream stages. Run against `StubSerpClient` +
//! `StaticFetcher` + `StubEmbedder` doubles so no network or browser is
//! needed. Other scenarios (proxy exhaustion, extraction fallback, gap
//! scoring edge cases) are covered as focused unit tests closer to the
//! components they exercise (`proxy::tests`, `extract::tests`, `gap::tests`).

use std::collections::HashMap;
use std::sync::Arc;

use rankgap::core::app_state::AppState;
use rankgap::core::config::RankGapConfig;
use rankgap::core::types::{OrganicResult, SerpResult, Stage, SCHEMA_VERSION};
use rankgap::embed::StubEmbedder;
use rankgap::fetch::StaticFetcher;
use rankgap::orchestrator::project_store::ProjectStore;
use rankgap::orchestrator::Orchestrator;
use rankgap::serp::StubSerpClient;

const TARGET_URL: &str = "https://example.com/a";
const COMPETITOR_1: &str = "https://c1.test";
const COMPETITOR_2: &str = "https://c2.test";

fn target_html() -> String {
    "<html><head><title>Acme Widgets</title><meta name=\"description\" content=\"Durable widget framework for teams.\">\
     </head><body><h1>Acme Widgets</h1><p>Our widget framework gives fast setup and a clean template for any team size.</p></body></html>"
        .to_string()
}

fn competitor_html() -> String {
    "<html><head><title>Best Widgets Co</title><meta name=\"description\" content=\"Widget framework with onboarding.\">\
     </head><body><h1>Best Widgets Co</h1><p>Our onboarding checklist walks new teams through setup in minutes, start to finish.</p></body></html>"
        .to_string()
}

fn build_state(query: &str) -> Arc<AppState> {
    let mut pages = HashMap::new();
    pages.insert(TARGET_URL.to_string(), target_html());
    pages.insert(COMPETITOR_1.to_string(), competitor_html());
    pages.insert(COMPETITOR_2.to_string(), competitor_html());

    let serp_result = SerpResult {
        query: query.to_string(),
        organic_results: vec![
            OrganicResult { position: 1, url: COMPETITOR_1.to_string(), title: "C1".to_string(), snippet: "".to_string() },
            OrganicResult { position: 2, url: COMPETITOR_2.to_string(), title: "C2".to_string(), snippet: "".to_string() },
        ],
        target_ranking: None,
        schema_version: SCHEMA_VERSION,
    };

    Arc::new(AppState::new(
        reqwest::Client::new(),
        RankGapConfig::default(),
        Arc::new(StubEmbedder::new(32)),
        Arc::new(StubSerpClient::new(serp_result)),
        Arc::new(StaticFetcher::new(pages)),
    ))
}

#[tokio::test]
async fn scenario_1_fresh_run_two_competitors() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state("onboarding checklist");
    let orchestrator = Orchestrator::new(state, dir.path());

    let outcome = orchestrator.run("demo", "onboarding checklist", TARGET_URL, 10, true).await.unwrap();
    assert!(outcome.failed_urls.is_empty());

    let store = ProjectStore::new(dir.path());

    let serp: SerpResult = store.read_stage_artifact("demo", Stage::SerpResults, "serp_results.json").await.unwrap().unwrap();
    assert_eq!(serp.target_ranking, None);

    let extracted_dir = store.project_dir("demo").join(Stage::CompetitorContent.dir_name()).join("extracted_content");
    let snapshot_count = std::fs::read_dir(&extracted_dir).unwrap().count();
    assert_eq!(snapshot_count, 3, "expected target + 2 competitor snapshots");

    let gap_report: rankgap::core::types::GapReport = store.read_stage_artifact("demo", Stage::Optimization, "semantic_gaps.json").await.unwrap().unwrap();
    assert!(gap_report.gaps.iter().any(|g| g.phrase.to_lowercase().contains("onboarding") || g.phrase.to_lowercase().contains("checklist")));

    let analysis: serde_json::Value = store
        .read_stage_artifact("demo", Stage::CompetitiveAnalysis, "competitive_analysis.json")
        .await
        .unwrap()
        .unwrap();
    assert!(analysis["target"]["score"]["composite_score"].as_f64().is_some());
}

#[tokio::test]
async fn scenario_2_resume_after_optimization_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state("onboarding checklist");
    let orchestrator = Orchestrator::new(Arc::clone(&state), dir.path());

    orchestrator.run("demo", "onboarding checklist", TARGET_URL, 10, true).await.unwrap();

    let store = ProjectStore::new(dir.path());
    let analysis_path = store.project_dir("demo").join(Stage::CompetitiveAnalysis.dir_name()).join("competitive_analysis.json");
    let mtime_before = std::fs::metadata(&analysis_path).unwrap().modified().unwrap();

    let optimization_dir = store.project_dir("demo").join(Stage::Optimization.dir_name());
    std::fs::remove_dir_all(&optimization_dir).unwrap();

    let outcome = orchestrator.run("demo", "onboarding checklist", TARGET_URL, 10, false).await.unwrap();
    assert!(outcome.failed_urls.is_empty());

    let mtime_after = std::fs::metadata(&analysis_path).unwrap().modified().unwrap();
    assert_eq!(mtime_before, mtime_after, "stage 05 should have been a cache hit, not rewritten");

    let gap_report: rankgap::core::types::GapReport = store.read_stage_artifact("demo", Stage::Optimization, "semantic_gaps.json").await.unwrap().unwrap();
    assert!(!gap_report.gaps.is_empty());
}

#[tokio::test]
async fn scenario_3_query_change_invalidates_downstream_stages() {
    let dir = tempfile::tempdir().unwrap();
    let state = build_state("onboarding checklist");
    let orchestrator = Orchestrator::new(Arc::clone(&state), dir.path());

    orchestrator.run("demo", "onboarding checklist", TARGET_URL, 10, true).await.unwrap();

    let store = ProjectStore::new(dir.path());
    let snapshot_path = store
        .project_dir("demo")
        .join(Stage::CompetitorContent.dir_name())
        .join("extracted_content")
        .join(rankgap::orchestrator::project_store::slugify_url(COMPETITOR_1));
    let first_snapshot: rankgap::core::types::PageSnapshot = serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(first_snapshot.query, "onboarding checklist");

    orchestrator.run("demo", "sprocket parts", TARGET_URL, 10, false).await.unwrap();

    let second_snapshot: rankgap::core::types::PageSnapshot = serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(second_snapshot.query, "sprocket parts", "snapshot bound to the old query must not be reused after a query change");

    let config = store.load_config("demo").await.unwrap().unwrap();
    assert_eq!(config.query, "sprocket parts");
}
