//! HTML → text extraction. Three-rung fallback ladder:
//! primary (readability), secondary (structural `scraper` selector scan),
//! tertiary (plain body text). Each rung is tried only if the previous
//! produced no usable text.

use scraper::{Html, Selector};

use crate::antibot::looks_like_antibot_page;
use crate::core::errors::{Result, SeoError};
use crate::core::types::{ExtractionMethod, Heading};

#[derive(Debug)]
pub struct ExtractedContent {
    pub title: String,
    pub meta_description: String,
    pub text: String,
    pub headings: Vec<Heading>,
    pub method: ExtractionMethod,
}

pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    /// Runs the fallback ladder against `html`. Returns `AntiBotDetected`
    /// when the best text obtained still looks like a challenge page.
    pub fn extract(&self, url: &str, html: &str) -> Result<ExtractedContent> {
        let title = extract_title(html);
        let meta_description = extract_meta_description(html);
        let headings = extract_headings(html);

        let (text, method) = extract_primary(html)
            .map(|t| (t, ExtractionMethod::Primary))
            .or_else(|| extract_secondary(html).map(|t| (t, ExtractionMethod::Secondary)))
            .unwrap_or_else(|| (extract_tertiary(html), ExtractionMethod::Tertiary));

        if text.trim().is_empty() {
            return Err(SeoError::Extraction { url: url.to_string() });
        }

        if looks_like_antibot_page(&text) {
            return Err(SeoError::AntiBotDetected {
                url: url.to_string(),
                reason: "rendered text matched anti-bot heuristics".to_string(),
            });
        }

        Ok(ExtractedContent { title, meta_description, text, headings, method })
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("title").unwrap();
    doc.select(&sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_meta_description(html: &str) -> String {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(r#"meta[name="description"]"#).unwrap();
    doc.select(&sel)
        .next()
        .and_then(|e| e.value().attr("content"))
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn extract_headings(html: &str) -> Vec<Heading> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("h1, h2, h3, h4, h5, h6").unwrap();
    doc.select(&sel)
        .filter_map(|e| {
            let level = e.value().name().chars().nth(1)?.to_digit(10)? as u8;
            let text = e.text().collect::<String>().trim().to_string();
            if text.is_empty() {
                None
            } else {
                Some(Heading { level, text })
            }
        })
        .collect()
}

/// Primary rung: `readability`'s Mozilla-derived main-content detector.
fn extract_primary(html: &str) -> Option<String> {
    let mut cursor = std::io::Cursor::new(html.as_bytes());
    let base_url = url::Url::parse("https://rankgap.invalid/").ok()?;
    let product = readability::extractor::extract(&mut cursor, &base_url).ok()?;
    let text = product.text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Secondary rung: scan common content-container selectors and concatenate
/// paragraph-level text.
fn extract_secondary(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    const CONTAINERS: &[&str] = &["article", "main", "[role=main]", "#content", ".content", ".post", ".entry-content"];

    for selector_str in CONTAINERS {
        if let Ok(sel) = Selector::parse(selector_str) {
            if let Some(container) = doc.select(&sel).next() {
                let text: String = container.text().collect::<Vec<_>>().join(" ");
                let normalized = normalize_whitespace(&text);
                if !normalized.is_empty() {
                    return Some(normalized);
                }
            }
        }
    }
    None
}

/// Tertiary rung: every visible text node under `<body>`.
fn extract_tertiary(html: &str) -> String {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("body").unwrap();
    let text = doc
        .select(&sel)
        .next()
        .map(|b| b.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    normalize_whitespace(&text)
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_headings() {
        let html = r#"<html><head><title>My Page</title>
            <meta name="description" content="A great page"></head>
            <body><h1>Intro</h1><h2>Details</h2><p>Some content goes here.</p></body></html>"#;
        let extractor = Extractor::new();
        let out = extractor.extract("https://a.test", html).unwrap();
        assert_eq!(out.title, "My Page");
        assert_eq!(out.meta_description, "A great page");
        assert_eq!(out.headings.len(), 2);
        assert_eq!(out.headings[0].level, 1);
    }

    #[test]
    fn falls_back_to_tertiary_when_no_containers_present() {
        let html = "<html><body><span>loose text with enough characters to pass the antibot length floor check easily here</span></body></html>";
        let extractor = Extractor::new();
        let out = extractor.extract("https://a.test", html).unwrap();
        assert!(out.text.contains("loose text"));
    }

    #[test]
    fn empty_body_is_extraction_error() {
        let html = "<html><head><title>Empty</title></head><body></body></html>";
        let extractor = Extractor::new();
        let err = extractor.extract("https://a.test", html).unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");
    }

    #[test]
    fn short_rendered_text_is_antibot_detected() {
        let html = "<html><body><p>Access Denied</p></body></html>";
        let extractor = Extractor::new();
        let err = extractor.extract("https://a.test", html).unwrap_err();
        assert_eq!(err.kind(), "AntiBotDetected");
    }
}
