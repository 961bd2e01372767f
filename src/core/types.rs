//! Data model shared across stages. Plain tagged records with named fields
//! rather than dynamic dicts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// On-disk JSON artifacts carry a schema version so a future reader can
/// detect format drift. This crate writes version 1 and does not migrate.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Initialized,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SerpResults,
    CompetitorContent,
    ContentProcessing,
    CompetitiveAnalysis,
    Optimization,
    FinalReports,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::SerpResults,
        Stage::CompetitorContent,
        Stage::ContentProcessing,
        Stage::CompetitiveAnalysis,
        Stage::Optimization,
        Stage::FinalReports,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::SerpResults => "02_serp_results",
            Stage::CompetitorContent => "03_competitor_content",
            Stage::ContentProcessing => "04_content_processing",
            Stage::CompetitiveAnalysis => "05_competitive_analysis",
            Stage::Optimization => "06_optimization",
            Stage::FinalReports => "07_final_reports",
        }
    }
}

/// Project configuration. `query` is the identity key used for content reuse
/// across stages; `project_name` keys the on-disk directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_name: String,
    pub query: String,
    pub target_url: String,
    pub top_n: u8,
    pub status: ProjectStatus,
    pub steps_completed: BTreeSet<Stage>,
    pub current_step: Option<Stage>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl ProjectConfig {
    pub fn new(
        project_name: impl Into<String>,
        query: impl Into<String>,
        target_url: impl Into<String>,
        top_n: u8,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            project_name: project_name.into(),
            query: query.into(),
            target_url: target_url.into(),
            top_n: top_n.clamp(1, 20),
            status: ProjectStatus::Initialized,
            steps_completed: BTreeSet::new(),
            current_step: None,
            created_at: now,
            last_updated: now,
            last_error: None,
            schema_version: SCHEMA_VERSION,
        }
    }
}

/// One organic SERP result row. Positions are dense, unique, start at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganicResult {
    pub position: u8,
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpResult {
    pub query: String,
    pub organic_results: Vec<OrganicResult>,
    pub target_ranking: Option<u8>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Primary,
    Secondary,
    Tertiary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// Either a dense SERP position or the literal `"not ranking"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerpRanking {
    Position(u8),
    NotRanking(String),
}

impl SerpRanking {
    pub fn not_ranking() -> Self {
        SerpRanking::NotRanking("not ranking".to_string())
    }
}

/// One captured page. `query` is bound at capture time; a snapshot is only
/// reusable for a later run if both `url` and `query` still match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub meta_description: String,
    pub text: String,
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub raw_html: Option<String>,
    pub serp_ranking: SerpRanking,
    pub query: String,
    pub scraping_timestamp: chrono::DateTime<chrono::Utc>,
    pub extraction_method: ExtractionMethod,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl PageSnapshot {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn content_length(&self) -> usize {
        self.text.chars().count()
    }

    /// A cached snapshot is reusable only if both the url and the bound
    /// query still match. A query change invalidates it.
    pub fn reusable_for(&self, url: &str, query: &str) -> bool {
        self.url == url && self.query == query
    }
}

/// A phrase occurrence, with optional hierarchical placement (the heading it
/// appeared under).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseEntry {
    /// Lowercased; used for matching and dedup.
    pub phrase: String,
    /// Original-case example retained for display.
    pub display: String,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub context_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhraseSet {
    pub entries: Vec<PhraseEntry>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl PhraseSet {
    pub fn contains(&self, phrase_lower: &str) -> bool {
        self.entries.iter().any(|e| e.phrase == phrase_lower)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A unit vector in R^D. `‖v‖=1 ± 1e-4`; D is constant per project (the
/// loaded model's native dimension).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn dim(&self) -> usize {
        self.vector.len()
    }
}

/// Six dimension scores plus the composite/SEO aggregates.
/// All eight fields are always present; on empty content all are zero with
/// `error` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentScore {
    pub metadata_alignment: f64,
    pub hierarchical_decomposition: f64,
    pub thematic_unity: f64,
    pub balance: f64,
    pub query_intent: f64,
    pub structural_coherence: f64,
    pub composite_score: f64,
    pub seo_score: f64,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl ContentScore {
    pub fn zero_with_error(reason: impl Into<String>) -> Self {
        Self {
            metadata_alignment: 0.0,
            hierarchical_decomposition: 0.0,
            thematic_unity: 0.0,
            balance: 0.0,
            query_intent: 0.0,
            structural_coherence: 0.0,
            composite_score: 0.0,
            seo_score: 0.0,
            recommendations: Vec::new(),
            error: Some(reason.into()),
            schema_version: SCHEMA_VERSION,
        }
    }
}

/// A phrase competitors use that the target page does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticGap {
    pub phrase: String,
    pub query_similarity: f64,
    pub competitor_usage: usize,
    pub estimated_impact: f64,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapCoverageStats {
    pub target_unique_phrases: usize,
    pub competitor_common_phrases: usize,
    pub semantic_gaps_found: usize,
    pub high_impact_recommendations: usize,
}

/// Persisted to `06_optimization/semantic_gaps.json`: the gap list alongside
/// coverage stats summarizing how much of the target's phrase universe is
/// shared with competitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapReport {
    pub gaps: Vec<SemanticGap>,
    pub coverage: GapCoverageStats,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Strictly monotonic except for admin deletion, which is handled
    /// outside this state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_monotonic() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn snapshot_reuse_requires_matching_query_and_url() {
        let snap = PageSnapshot {
            url: "https://a.test".into(),
            final_url: "https://a.test".into(),
            title: "t".into(),
            meta_description: "".into(),
            text: "hello".into(),
            headings: vec![],
            raw_html: None,
            serp_ranking: SerpRanking::not_ranking(),
            query: "widget framework".into(),
            scraping_timestamp: chrono::Utc::now(),
            extraction_method: ExtractionMethod::Primary,
            schema_version: SCHEMA_VERSION,
        };
        assert!(snap.reusable_for("https://a.test", "widget framework"));
        assert!(!snap.reusable_for("https://a.test", "sprocket framework"));
        assert!(!snap.reusable_for("https://b.test", "widget framework"));
    }

    #[test]
    fn project_top_n_clamped() {
        let p = ProjectConfig::new("demo", "q", "https://x", 50);
        assert_eq!(p.top_n, 20);
        let p = ProjectConfig::new("demo", "q", "https://x", 0);
        assert_eq!(p.top_n, 1);
    }
}
