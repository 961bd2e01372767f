//! Crate-wide error taxonomy.
//!
//! Per-item errors (`FetchError`, `AntiBotDetected`, `ExtractionError`,
//! `ScoringError`) are caught at a stage boundary and recorded on the
//! relevant artifact; they never abort a project. `SerpError`, `EmbeddingError`,
//! `ConfigError`, `ProxyExhausted` and `LockHeld` are stage-fatal or run-fatal
//! and propagate out of `Orchestrator::run`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeoError {
    #[error("config error: {0}")]
    Config(String),

    #[error("SERP provider error: provider={provider} status={status:?} reason={reason}")]
    Serp {
        provider: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("anti-bot challenge detected at {url}: {reason}")]
    AntiBotDetected { url: String, reason: String },

    #[error("extraction failed for {url}: all strategies produced empty text")]
    Extraction { url: String },

    #[error("embedding engine error: {0}")]
    Embedding(String),

    #[error("scoring error for {url}: {reason}")]
    Scoring { url: String, reason: String },

    #[error("all proxies exhausted after pool reset")]
    ProxyExhausted,

    #[error("project '{project}' is locked by another orchestrator")]
    LockHeld { project: String },

    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SeoError {
    /// Machine-readable discriminant for every error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SeoError::Config(_) => "ConfigError",
            SeoError::Serp { .. } => "SerpError",
            SeoError::Fetch { .. } => "FetchError",
            SeoError::AntiBotDetected { .. } => "AntiBotDetected",
            SeoError::Extraction { .. } => "ExtractionError",
            SeoError::Embedding(_) => "EmbeddingError",
            SeoError::Scoring { .. } => "ScoringError",
            SeoError::ProxyExhausted => "ProxyExhausted",
            SeoError::LockHeld { .. } => "LockHeld",
            SeoError::ProjectNotFound(_) => "ProjectNotFound",
            SeoError::Io(_) => "IoError",
            SeoError::Json(_) => "JsonError",
        }
    }

    /// `true` for errors that are local to one URL/snapshot and must not abort
    /// the enclosing stage.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            SeoError::Fetch { .. }
                | SeoError::AntiBotDetected { .. }
                | SeoError::Extraction { .. }
                | SeoError::Scoring { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SeoError>;
