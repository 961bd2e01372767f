//! Stealth primitives shared by [`crate::fetch`] and [`crate::orchestrator`]:
//! user-agent rotation and polite per-worker request delay, plus the anti-bot
//! token vocabulary [`crate::extract`] checks rendered text against.

use rand::RngExt;

/// Rotating pool of realistic desktop/mobile user agents.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Mobile Safari/537.36",
];

pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    let index = rng.random_range(0..USER_AGENTS.len());
    USER_AGENTS[index]
}

/// Per-worker politeness delay between URL fetches. Applies to each fetch
/// worker independently rather than as a global throttle, defaulting to 2s.
#[derive(Debug, Clone, Copy)]
pub struct RequestDelay {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl RequestDelay {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    fn sample(&self) -> u64 {
        if self.max_ms <= self.min_ms {
            return self.min_ms;
        }
        let mut rng = rand::rng();
        rng.random_range(self.min_ms..=self.max_ms)
    }

    pub async fn wait(&self) {
        if self.max_ms == 0 {
            return;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(self.sample())).await;
    }
}

impl Default for RequestDelay {
    fn default() -> Self {
        Self::fixed(2000)
    }
}

/// Tokens that mark a rendered page as a challenge/block page rather than content.
pub const ANTIBOT_TOKENS: &[&str] = &[
    "cloudflare",
    "captcha",
    "challenge",
    "blocked",
    "access denied",
    "rate limit",
    "bot detection",
];

/// `true` when `text` looks like an anti-bot challenge page rather than content:
/// fewer than 100 characters of body text, or any antibot token present.
pub fn looks_like_antibot_page(text: &str) -> bool {
    if text.trim().chars().count() < 100 {
        return true;
    }
    let lower = text.to_lowercase();
    ANTIBOT_TOKENS.iter().any(|tok| lower.contains(tok))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agents_non_empty() {
        assert!(!USER_AGENTS.is_empty());
        assert!(USER_AGENTS[0].contains("Mozilla"));
    }

    #[test]
    fn detects_short_pages_as_antibot() {
        assert!(looks_like_antibot_page("too short"));
    }

    #[test]
    fn detects_challenge_token() {
        let text = "a".repeat(150) + " please verify you are human: cloudflare challenge";
        assert!(looks_like_antibot_page(&text));
    }

    #[test]
    fn accepts_normal_page() {
        let text = "This is a perfectly normal page with plenty of readable content. ".repeat(5);
        assert!(!looks_like_antibot_page(&text));
    }

    #[tokio::test]
    async fn delay_respects_minimum() {
        let delay = RequestDelay::new(20, 40);
        let start = std::time::Instant::now();
        delay.wait().await;
        assert!(start.elapsed().as_millis() >= 20);
    }
}
