//! File-based config loader (`rankgap.json`) with environment-variable
//! fallback for every field.

use std::path::Path;

/// SERP provider sub-config (mirrors the `serp` key in rankgap.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct SerpSubConfig {
    /// API key for the configured SERP provider. Never logged.
    pub api_key: Option<String>,
    /// Provider base URL. Defaults to the SerpApi endpoint.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl SerpSubConfig {
    /// API key: JSON field → `SERPAPI_KEY` env var → `None`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(k) = &self.api_key {
            return Some(k.trim().to_string());
        }
        std::env::var("SERPAPI_KEY").ok().filter(|v| !v.trim().is_empty())
    }

    /// Base URL: JSON field → `SERPAPI_BASE_URL` env var → SerpApi default.
    pub fn resolve_base_url(&self) -> String {
        if let Some(u) = &self.base_url {
            if !u.trim().is_empty() {
                return u.clone();
            }
        }
        std::env::var("SERPAPI_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "https://serpapi.com/search".to_string())
    }

    /// Timeout: JSON field → `SERPAPI_TIMEOUT_SECS` env var → 20.
    pub fn resolve_timeout_secs(&self) -> u64 {
        if let Some(t) = self.timeout_secs {
            return t;
        }
        std::env::var("SERPAPI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20)
    }
}

/// Fetcher sub-config (mirrors the `fetch` key in rankgap.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct FetchSubConfig {
    /// Milliseconds to wait after navigation before capturing HTML.
    pub wait_ms: Option<u32>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    /// Per-worker rate limit between fetches, in milliseconds.
    pub rate_limit_ms: Option<u64>,
    /// Number of concurrent fetch workers.
    pub concurrency: Option<usize>,
}

impl FetchSubConfig {
    pub fn resolve_wait_ms(&self) -> u32 {
        self.wait_ms.unwrap_or(2000)
    }

    pub fn resolve_viewport(&self) -> (u32, u32) {
        (self.viewport_width.unwrap_or(1280), self.viewport_height.unwrap_or(900))
    }

    /// Rate limit between URL fetches, applied per fetch worker rather than
    /// as a single global throttle.
    pub fn resolve_rate_limit_ms(&self) -> u64 {
        if let Some(ms) = self.rate_limit_ms {
            return ms;
        }
        std::env::var("RANKGAP_RATE_LIMIT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2000)
    }

    pub fn resolve_concurrency(&self) -> usize {
        if let Some(c) = self.concurrency {
            return c.max(1);
        }
        std::env::var("RANKGAP_FETCH_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4)
    }
}

/// Embedding sub-config (mirrors the `embedding` key in rankgap.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct EmbeddingSubConfig {
    /// Model identifier or local directory passed to `StaticModel::from_pretrained`.
    pub model_id: Option<String>,
}

impl EmbeddingSubConfig {
    pub fn resolve_model_id(&self) -> String {
        if let Some(m) = &self.model_id {
            if !m.trim().is_empty() {
                return m.clone();
            }
        }
        std::env::var("RANKGAP_EMBEDDING_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "minishlab/potion-base-8M".to_string())
    }
}

/// Top-level config loaded from `rankgap.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct RankGapConfig {
    #[serde(default)]
    pub serp: SerpSubConfig,
    #[serde(default)]
    pub fetch: FetchSubConfig,
    #[serde(default)]
    pub embedding: EmbeddingSubConfig,
}

/// Load `rankgap.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `RANKGAP_CONFIG` env var path
/// 2. `./rankgap.json` (process cwd)
/// 3. `../rankgap.json` (one level up)
///
/// Missing file → `RankGapConfig::default()` (silent, env-var fallbacks apply).
/// Parse error → log a warning, return `RankGapConfig::default()`.
pub fn load_config() -> RankGapConfig {
    let candidates: Vec<std::path::PathBuf> = {
        let mut v = vec![
            std::path::PathBuf::from("rankgap.json"),
            std::path::PathBuf::from("../rankgap.json"),
        ];
        if let Ok(env_path) = std::env::var("RANKGAP_CONFIG") {
            v.insert(0, std::path::PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RankGapConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("rankgap.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "rankgap.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return RankGapConfig::default();
                }
            },
            Err(_) => continue,
        }
    }

    RankGapConfig::default()
}

pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_PROXY_LIST_PATH: &str = "RANKGAP_PROXY_LIST";
pub const ENV_PROJECTS_DIR: &str = "RANKGAP_PROJECTS_DIR";

/// Optional override for the Chromium-family browser executable.
///
/// Default behavior is auto-discovery (see `crate::fetch::find_chrome_executable`).
/// This function only returns a value when `CHROME_EXECUTABLE` points at an
/// existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}

/// Path to a newline-delimited proxy list file, if configured.
pub fn proxy_list_path() -> Option<String> {
    std::env::var(ENV_PROXY_LIST_PATH).ok().filter(|v| !v.trim().is_empty())
}

/// Root directory under which project directories are created.
///
/// Default: `./projects` under the process cwd.
pub fn projects_root() -> std::path::PathBuf {
    std::env::var(ENV_PROJECTS_DIR)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("projects"))
}
