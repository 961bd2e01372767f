//! PhraseMiner produces a canonical phrase universe from raw page text:
//! sentence phrases, n-grams, and domain service-pattern phrases,
//! deduplicated by lowercase form. Plain `str` splitting, no NLP library.

use regex::Regex;
use std::sync::LazyLock;

use crate::core::types::{PhraseEntry, PhraseSet};

const STOP_LEADERS: &[&str] = &[
    "the ", "a ", "an ", "and ", "or ", "but ", "in ", "on ", "at ", "to ", "for ", "of ",
];

static SERVICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(marketing|digital|content|social|email|ppc|seo|advertising)\s+(services?|solutions?|strategies?|management|optimization)").unwrap()
});

pub struct PhraseMiner;

impl PhraseMiner {
    pub fn new() -> Self {
        Self
    }

    /// Empty text yields the empty set; single-sentence documents still
    /// produce n-grams.
    pub fn extract(&self, text: &str) -> PhraseSet {
        let mut entries: Vec<PhraseEntry> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        let mut push = |phrase_lower: String, display: String| {
            if seen.insert(phrase_lower.clone()) {
                entries.push(PhraseEntry { phrase: phrase_lower, display, heading: None, level: None, context_path: vec![] });
            }
        };

        for sentence in split_sentences(text) {
            let trimmed = sentence.trim();
            let char_len = trimmed.chars().count();
            let word_count = trimmed.split_whitespace().count();
            if (15..=200).contains(&char_len) && word_count >= 3 {
                push(trimmed.to_lowercase(), trimmed.to_string());
            }
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        for n in 2..=6usize {
            if words.len() < n {
                continue;
            }
            for window in words.windows(n) {
                let display = window.join(" ");
                let lower = display.to_lowercase();
                if is_stop_leading(&lower) {
                    continue;
                }
                push(lower, display);
            }
        }

        for mat in SERVICE_PATTERN.find_iter(text) {
            let display = mat.as_str().to_string();
            let lower = display.to_lowercase();
            push(lower, display);
        }

        PhraseSet { entries, ..Default::default() }
    }
}

impl Default for PhraseMiner {
    fn default() -> Self {
        Self::new()
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?']).map(|s| s.to_string()).filter(|s| !s.trim().is_empty()).collect()
}

fn is_stop_leading(lower_phrase: &str) -> bool {
    STOP_LEADERS.iter().any(|leader| lower_phrase.starts_with(leader))
}
