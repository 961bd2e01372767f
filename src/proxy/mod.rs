//! Proxy rotation for the Fetcher.
//!
//! No latency/priority "best proxy" scoring, no sticky sessions, no
//! proxy-health background testing. Just load a list, hand out the next
//! one, and remember which ones failed so a full rotation doesn't retry a
//! dead proxy twice in the same pass.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use rand::RngExt;

use crate::core::errors::{Result, SeoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStrategy {
    Sequential,
    Random,
}

/// A pool of proxy URLs loaded from a newline-delimited file (`#`-prefixed
/// lines and blanks ignored).
#[derive(Debug)]
pub struct ProxyPool {
    proxies: Vec<String>,
    strategy: RotationStrategy,
    cursor: AtomicUsize,
    failed: RwLock<std::collections::HashSet<String>>,
}

impl ProxyPool {
    pub fn from_lines(content: &str, strategy: RotationStrategy) -> Result<Self> {
        let proxies: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| l.to_string())
            .collect();

        if proxies.is_empty() {
            return Err(SeoError::Config("proxy list is empty".to_string()));
        }

        Ok(Self {
            proxies,
            strategy,
            cursor: AtomicUsize::new(0),
            failed: RwLock::new(std::collections::HashSet::new()),
        })
    }

    pub async fn load(path: &str, strategy: RotationStrategy) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_lines(&content, strategy)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Returns the next proxy to try, skipping ones already marked failed in
    /// this pass. When every proxy has failed, the failed set is reset and
    /// rotation starts over: retry with the next proxy in the pool, and if
    /// every proxy has failed, reset the failed set and try again from the
    /// top once more before giving up.
    pub fn next(&self) -> Result<String> {
        {
            let failed = self.failed.read().unwrap();
            if failed.len() >= self.proxies.len() {
                drop(failed);
                self.failed.write().unwrap().clear();
            }
        }

        let failed = self.failed.read().unwrap();
        let available: Vec<&String> = self.proxies.iter().filter(|p| !failed.contains(*p)).collect();
        if available.is_empty() {
            return Err(SeoError::ProxyExhausted);
        }

        let chosen = match self.strategy {
            RotationStrategy::Sequential => {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % available.len();
                available[idx].clone()
            }
            RotationStrategy::Random => {
                let idx = rand::rng().random_range(0..available.len());
                available[idx].clone()
            }
        };

        Ok(chosen)
    }

    pub fn mark_failed(&self, proxy: &str) {
        self.failed.write().unwrap().insert(proxy.to_string());
    }

    pub fn reset_failures(&self) {
        self.failed.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_non_empty_non_comment_lines() {
        let pool = ProxyPool::from_lines(
            "# comment\nhttp://a.test:8080\n\nhttp://b.test:8080\n",
            RotationStrategy::Sequential,
        )
        .unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn empty_list_is_a_config_error() {
        let err = ProxyPool::from_lines("# only comments\n", RotationStrategy::Sequential).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn sequential_rotation_cycles() {
        let pool = ProxyPool::from_lines("a\nb\nc\n", RotationStrategy::Sequential).unwrap();
        let first = pool.next().unwrap();
        let second = pool.next().unwrap();
        let third = pool.next().unwrap();
        let fourth = pool.next().unwrap();
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(first, fourth);
    }

    #[test]
    fn exhausting_all_proxies_resets_and_continues() {
        let pool = ProxyPool::from_lines("a\nb\n", RotationStrategy::Sequential).unwrap();
        pool.mark_failed("a");
        pool.mark_failed("b");
        // both failed, next() resets the failed set instead of erroring
        let next = pool.next();
        assert!(next.is_ok());
    }
}
