//! On-disk project layout: one directory per project under the configured
//! projects root, with numbered stage subdirectories holding JSON artifacts.
//! Writes go through a temp file and rename for atomicity, and the
//! project-directory lock uses `fs2::FileExt::try_lock_exclusive`.

use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{de::DeserializeOwned, Serialize};

use crate::core::errors::{Result, SeoError};
use crate::core::types::{ProjectConfig, Stage};

/// Holds the exclusive lock on a project directory for the orchestrator's
/// lifetime. Unlocking happens implicitly on drop (closing the file handle).
pub struct ProjectLock {
    _file: std::fs::File,
}

#[derive(Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(projects_root: impl Into<PathBuf>) -> Self {
        Self { root: projects_root.into() }
    }

    pub fn project_dir(&self, project_name: &str) -> PathBuf {
        self.root.join(project_name)
    }

    fn stage_dir(&self, project_name: &str, stage: Stage) -> PathBuf {
        self.project_dir(project_name).join(stage.dir_name())
    }

    /// Acquires the named lock in `<project>/.lock`, creating the project
    /// directory tree first. Returns `SeoError::LockHeld` if another
    /// orchestrator already holds it.
    pub async fn lock(&self, project_name: &str) -> Result<ProjectLock> {
        let dir = self.project_dir(project_name);
        tokio::fs::create_dir_all(&dir).await?;
        let lock_path = dir.join(".lock");

        let project_name = project_name.to_string();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new().create(true).write(true).open(&lock_path)?;
            file.try_lock_exclusive().map_err(|_| SeoError::LockHeld { project: project_name })?;
            Ok(ProjectLock { _file: file })
        })
        .await
        .map_err(|e| SeoError::Config(format!("lock task panicked: {e}")))?
    }

    pub async fn load_config(&self, project_name: &str) -> Result<Option<ProjectConfig>> {
        let path = self.project_dir(project_name).join("00_config").join("project_config.json");
        self.read_json_opt(&path).await
    }

    pub async fn save_config(&self, config: &ProjectConfig) -> Result<()> {
        let path = self.project_dir(&config.project_name).join("00_config").join("project_config.json");
        self.write_json(&path, config).await
    }

    pub async fn write_stage_artifact<T: Serialize>(&self, project_name: &str, stage: Stage, file_name: &str, value: &T) -> Result<()> {
        let path = self.stage_dir(project_name, stage).join(file_name);
        self.write_json(&path, value).await
    }

    pub async fn read_stage_artifact<T: DeserializeOwned>(&self, project_name: &str, stage: Stage, file_name: &str) -> Result<Option<T>> {
        let path = self.stage_dir(project_name, stage).join(file_name);
        self.read_json_opt(&path).await
    }

    pub async fn write_text(&self, project_name: &str, stage: Stage, relative_path: &str, content: &str) -> Result<()> {
        let path = self.stage_dir(project_name, stage).join(relative_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(value)?;
        // write-then-rename keeps a reader from ever observing a half-written file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_json_opt<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Slug derivation for a URL: strip scheme, strip leading `www.`, replace
/// `/` with `_`, trim trailing `_`, truncate to 100 chars.
pub fn slugify_url(url: &str) -> String {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    let replaced = without_www.replace('/', "_");
    let trimmed = replaced.trim_end_matches('_');
    let truncated: String = trimmed.chars().take(100).collect();
    format!("{truncated}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_scheme_and_www() {
        assert_eq!(slugify_url("https://www.example.com/guide/widgets"), "example.com_guide_widgets.json");
    }

    #[test]
    fn slugify_trims_trailing_slash() {
        assert_eq!(slugify_url("https://example.com/"), "example.com.json");
    }

    #[test]
    fn slugify_truncates_to_100_chars() {
        let long_path = "a".repeat(150);
        let slug = slugify_url(&format!("https://example.com/{long_path}"));
        assert_eq!(slug.len(), 100 + ".json".len());
    }

    #[tokio::test]
    async fn save_and_load_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        let config = ProjectConfig::new("demo", "widget framework", "https://target.test", 10);
        store.save_config(&config).await.unwrap();
        let loaded = store.load_config("demo").await.unwrap().unwrap();
        assert_eq!(loaded.project_name, "demo");
        assert_eq!(loaded.query, "widget framework");
    }

    #[tokio::test]
    async fn missing_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        assert!(store.load_config("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_lock_attempt_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        let _first = store.lock("demo").await.unwrap();
        let second = store.lock("demo").await;
        assert!(matches!(second, Err(SeoError::LockHeld { .. })));
    }
}
