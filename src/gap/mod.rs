//! GapAnalyzer finds phrases competitors use that the target page is missing,
//! ranked by a weighted `estimated_impact` score
//! (`10*query_relevance + 5*(competitor_usage/K)`); see DESIGN.md for the
//! reasoning behind the chosen formula.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::errors::Result;
use crate::core::types::{GapCoverageStats, GapReport, PhraseSet, SemanticGap};
use crate::embed::{self, Embedder};

/// Gaps whose `estimated_impact` reaches this are counted as "high impact"
/// in `GapCoverageStats`: the point at which `query_relevance` alone would
/// need to be near its ceiling to reach it. See DESIGN.md for how this
/// cut-line was chosen.
const HIGH_IMPACT_THRESHOLD: f64 = 10.0;

/// Number of ranked gaps returned by default.
const DEFAULT_TOP_N: usize = 50;

pub struct GapAnalyzer {
    embedding_engine: Arc<dyn Embedder>,
    top_n: usize,
}

impl GapAnalyzer {
    pub fn new(embedding_engine: Arc<dyn Embedder>) -> Self {
        Self { embedding_engine, top_n: DEFAULT_TOP_N }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// `competitors` pairs each competitor's source identifier (its URL)
    /// with its mined `PhraseSet`.
    pub async fn analyze(&self, target: &PhraseSet, competitors: &[(String, PhraseSet)], query: &str) -> Result<GapReport> {
        let k = competitors.len();

        let mut freq: HashMap<String, usize> = HashMap::new();
        let mut display: HashMap<String, String> = HashMap::new();
        let mut sources: HashMap<String, Vec<String>> = HashMap::new();

        for (source, set) in competitors {
            for entry in &set.entries {
                *freq.entry(entry.phrase.clone()).or_insert(0) += 1;
                display.entry(entry.phrase.clone()).or_insert_with(|| entry.display.clone());
                sources.entry(entry.phrase.clone()).or_default().push(source.clone());
            }
        }

        let significance_floor = if k < 3 { 1 } else { 3 };
        let significant: Vec<String> = freq
            .iter()
            .filter(|(_, count)| **count >= significance_floor)
            .map(|(phrase, _)| phrase.clone())
            .collect();

        let missing: Vec<String> = significant.into_iter().filter(|p| !target.contains(p)).collect();

        let coverage_base = GapCoverageStats {
            target_unique_phrases: target.len(),
            competitor_common_phrases: missing.len(),
            semantic_gaps_found: 0,
            high_impact_recommendations: 0,
        };

        if missing.is_empty() || k == 0 {
            return Ok(GapReport { gaps: Vec::new(), coverage: coverage_base, schema_version: crate::core::types::SCHEMA_VERSION });
        }

        let mut to_encode = missing.clone();
        to_encode.push(query.to_string());
        let encoded = self.embedding_engine.encode(&to_encode).await?;
        let q_embedding = encoded.last().unwrap().clone();
        let phrase_embeddings = &encoded[..encoded.len() - 1];

        let usage_floor = if k < 4 { 1 } else { (2usize).max((0.25 * k as f64).ceil() as usize) };

        let mut gaps = Vec::new();
        for (phrase, e_p) in missing.iter().zip(phrase_embeddings.iter()) {
            let query_relevance = embed::similarity(e_p, &q_embedding);
            let competitor_usage = *freq.get(phrase).unwrap_or(&0);
            let estimated_impact = 10.0 * query_relevance + 5.0 * (competitor_usage as f64 / k as f64);

            if query_relevance > 0.6 && competitor_usage >= usage_floor {
                gaps.push(SemanticGap {
                    phrase: display.get(phrase).cloned().unwrap_or_else(|| phrase.clone()),
                    query_similarity: query_relevance,
                    competitor_usage,
                    estimated_impact,
                    sources: sources.get(phrase).cloned().unwrap_or_default(),
                });
            }
        }

        gaps.sort_by(|a, b| b.estimated_impact.partial_cmp(&a.estimated_impact).unwrap_or(std::cmp::Ordering::Equal));
        gaps.truncate(self.top_n);

        let high_impact = gaps.iter().filter(|g| g.estimated_impact >= HIGH_IMPACT_THRESHOLD).count();

        Ok(GapReport {
            coverage: GapCoverageStats {
                semantic_gaps_found: gaps.len(),
                high_impact_recommendations: high_impact,
                ..coverage_base
            },
            gaps,
            schema_version: crate::core::types::SCHEMA_VERSION,
        })
    }
}
