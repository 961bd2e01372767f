//! Job API: a thin interface only. The HTTP layer, persistence, and report
//! templating that would sit in front of this are external collaborators and
//! out of scope here. `OrchestratorJobRunner` is one in-process
//! implementation over `Orchestrator`, kept mainly so the trait has a
//! tested caller.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::core::app_state::AppState;
use crate::core::errors::{Result, SeoError};
use crate::core::types::{ContentScore, JobStatus, Stage};
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone)]
pub struct JobStatusView {
    pub status: JobStatus,
    pub progress_percent: u8,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub content_score: ContentScore,
    pub gaps: Vec<crate::core::types::SemanticGap>,
    pub recommendations: Vec<String>,
}

#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    async fn submit(&self, target_url: String, keyword: String, optimize: bool, max_iterations: Option<u32>) -> Result<Uuid>;
    async fn status(&self, job_id: Uuid) -> Result<JobStatusView>;
    async fn results(&self, job_id: Uuid) -> Result<JobResult>;
}

/// Publishes the rendered reports once a project finishes, a seam for
/// whatever external system actually emails/stores them.
#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, project_name: &str, executive_summary: &str, implementation_guide: &str) -> Result<()>;
}

/// Drops reports into the log. Good enough for a CLI run with no external
/// collaborator wired in.
pub struct TracingReportSink;

#[async_trait::async_trait]
impl ReportSink for TracingReportSink {
    async fn publish(&self, project_name: &str, executive_summary: &str, _implementation_guide: &str) -> Result<()> {
        tracing::info!("project '{}' reports ready ({} bytes)", project_name, executive_summary.len());
        Ok(())
    }
}

struct JobRecord {
    project_name: String,
    status: JobStatus,
    progress_percent: u8,
    error_message: Option<String>,
}

pub struct OrchestratorJobRunner {
    state: Arc<AppState>,
    projects_root: std::path::PathBuf,
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl OrchestratorJobRunner {
    pub fn new(state: Arc<AppState>, projects_root: impl Into<std::path::PathBuf>) -> Self {
        Self { state, projects_root: projects_root.into(), jobs: Arc::new(RwLock::new(HashMap::new())) }
    }
}

#[async_trait::async_trait]
impl JobRunner for OrchestratorJobRunner {
    async fn submit(&self, target_url: String, keyword: String, _optimize: bool, _max_iterations: Option<u32>) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let project_name = format!("job-{job_id}");

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(
                job_id,
                JobRecord { project_name: project_name.clone(), status: JobStatus::Pending, progress_percent: 0, error_message: None },
            );
        }

        let state = Arc::clone(&self.state);
        let projects_root = self.projects_root.clone();
        let jobs = Arc::clone(&self.jobs);

        tokio::spawn(async move {
            {
                let mut jobs = jobs.write().await;
                if let Some(record) = jobs.get_mut(&job_id) {
                    record.status = JobStatus::Processing;
                }
            }

            let orchestrator = Orchestrator::new(state, projects_root);
            let run_result = orchestrator.run(&project_name, &keyword, &target_url, 10, false).await;

            let mut jobs = jobs.write().await;
            if let Some(record) = jobs.get_mut(&job_id) {
                match run_result {
                    Ok(outcome) => {
                        record.status = JobStatus::Completed;
                        record.progress_percent = 100;
                        if !outcome.failed_urls.is_empty() {
                            warn!("job {} completed with {} failed competitor fetch(es)", job_id, outcome.failed_urls.len());
                        }
                    }
                    Err(e) => {
                        record.status = JobStatus::Failed;
                        record.error_message = Some(e.to_string());
                    }
                }
            }
        });

        Ok(job_id)
    }

    async fn status(&self, job_id: Uuid) -> Result<JobStatusView> {
        let jobs = self.jobs.read().await;
        let record = jobs.get(&job_id).ok_or_else(|| SeoError::ProjectNotFound(job_id.to_string()))?;
        Ok(JobStatusView { status: record.status, progress_percent: record.progress_percent, error_message: record.error_message.clone() })
    }

    async fn results(&self, job_id: Uuid) -> Result<JobResult> {
        let project_name = {
            let jobs = self.jobs.read().await;
            let record = jobs.get(&job_id).ok_or_else(|| SeoError::ProjectNotFound(job_id.to_string()))?;
            if record.status != JobStatus::Completed {
                return Err(SeoError::Config(format!("job {job_id} is not completed yet")));
            }
            record.project_name.clone()
        };

        let store = crate::orchestrator::project_store::ProjectStore::new(&self.projects_root);

        #[derive(serde::Deserialize)]
        struct StoredUrlScore {
            score: ContentScore,
        }
        #[derive(serde::Deserialize)]
        struct StoredAnalysis {
            target: StoredUrlScore,
        }

        let analysis: StoredAnalysis = store
            .read_stage_artifact(&project_name, Stage::CompetitiveAnalysis, "competitive_analysis.json")
            .await?
            .ok_or_else(|| SeoError::ProjectNotFound(project_name.clone()))?;

        let gap_report: crate::core::types::GapReport = store
            .read_stage_artifact(&project_name, Stage::Optimization, "semantic_gaps.json")
            .await?
            .ok_or_else(|| SeoError::ProjectNotFound(project_name.clone()))?;

        let recommendations = analysis.target.score.recommendations.clone();

        Ok(JobResult { content_score: analysis.target.score, gaps: gap_report.gaps, recommendations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RankGapConfig;
    use crate::embed::StubEmbedder;
    use crate::fetch::StaticFetcher;
    use crate::serp::StubSerpClient;
    use crate::core::types::{OrganicResult, SerpResult, SCHEMA_VERSION};

    fn test_state(tmp: &std::path::Path) -> Arc<AppState> {
        let html = "<html><head><title>Widgets</title></head><body><h1>Widgets</h1><p>We sell the best widget framework on the market today for teams.</p></body></html>";
        let mut pages = std::collections::HashMap::new();
        pages.insert("https://target.test".to_string(), html.to_string());
        pages.insert("https://competitor-a.test".to_string(), html.to_string());

        let serp = SerpResult {
            query: "widget framework".to_string(),
            organic_results: vec![OrganicResult { position: 1, url: "https://competitor-a.test".to_string(), title: "A".to_string(), snippet: "".to_string() }],
            target_ranking: None,
            schema_version: SCHEMA_VERSION,
        };

        let http_client = reqwest::Client::new();
        let state = AppState::new(
            http_client,
            RankGapConfig::default(),
            Arc::new(StubEmbedder::new(16)),
            Arc::new(StubSerpClient::new(serp)),
            Arc::new(StaticFetcher::new(pages)),
        );
        let _ = tmp;
        Arc::new(state)
    }

    #[tokio::test]
    async fn unknown_job_id_status_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let runner = OrchestratorJobRunner::new(test_state(dir.path()), dir.path());
        let result = runner.status(Uuid::new_v4()).await;
        assert!(matches!(result, Err(SeoError::ProjectNotFound(_))));
    }

    #[tokio::test]
    async fn submit_then_poll_reaches_completed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = OrchestratorJobRunner::new(test_state(dir.path()), dir.path());
        let job_id = runner.submit("https://target.test".to_string(), "widget framework".to_string(), false, None).await.unwrap();

        let mut view = runner.status(job_id).await.unwrap();
        for _ in 0..50 {
            if view.status == JobStatus::Completed || view.status == JobStatus::Failed {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            view = runner.status(job_id).await.unwrap();
        }

        assert_eq!(view.status, JobStatus::Completed, "job did not complete: {:?}", view.error_message);
        let results = runner.results(job_id).await.unwrap();
        assert!(results.content_score.seo_score >= 0.0);
    }
}
