//! Scorer computes eight content-quality dimensions: metadata alignment,
//! hierarchical decomposition, thematic unity, balance, query intent,
//! structural coherence, and the composite/SEO aggregates derived from them.

use std::sync::Arc;

use crate::core::types::ContentScore;
use crate::embed::{self, Embedder};

const CHUNK_TARGET_LEN: usize = 512;
const CHUNK_OVERLAP: usize = 50;
const MIN_CHUNK_LEN: usize = 50;

const COMPOSITE_WEIGHTS: CompositeWeights = CompositeWeights {
    metadata: 0.15,
    hierarchy: 0.15,
    thematic: 0.20,
    balance: 0.10,
    intent: 0.20,
    structural: 0.20,
};

struct CompositeWeights {
    metadata: f64,
    hierarchy: f64,
    thematic: f64,
    balance: f64,
    intent: f64,
    structural: f64,
}

pub struct Scorer {
    embedding_engine: Arc<dyn Embedder>,
}

impl Scorer {
    pub fn new(embedding_engine: Arc<dyn Embedder>) -> Self {
        Self { embedding_engine }
    }

    pub async fn score(&self, title: &str, meta_description: &str, text: &str, query: Option<&str>) -> crate::core::errors::Result<ContentScore> {
        if text.trim().is_empty() {
            return Ok(ContentScore::zero_with_error("No content to analyze"));
        }

        let chunks = chunk_text(text);
        let chunk_texts: Vec<String> = chunks.clone();
        let encoded = self.embedding_engine.encode(&chunk_texts).await?;
        let centroid = embed::centroid(&encoded);

        let query_embedding = match query {
            Some(q) if !q.trim().is_empty() => Some(self.embedding_engine.encode_one(q).await?),
            _ => None,
        };

        let metadata = score_metadata_alignment(title, meta_description, &centroid, self.embedding_engine.as_ref()).await?;
        let hierarchy = score_hierarchical_decomposition(&encoded);
        let thematic = score_thematic_unity(&encoded);
        let balance = score_balance(&chunks, &encoded);
        let intent = score_query_intent(query_embedding.as_deref(), &encoded);
        let structural = score_structural_coherence(&encoded);

        let composite = COMPOSITE_WEIGHTS.metadata * metadata
            + COMPOSITE_WEIGHTS.hierarchy * hierarchy
            + COMPOSITE_WEIGHTS.thematic * thematic
            + COMPOSITE_WEIGHTS.balance * balance
            + COMPOSITE_WEIGHTS.intent * intent
            + COMPOSITE_WEIGHTS.structural * structural;

        let seo = score_seo(metadata, thematic, intent, structural, title, meta_description, text);

        let recommendations = build_recommendations(metadata, hierarchy, thematic, balance, intent, structural);

        Ok(ContentScore {
            metadata_alignment: metadata,
            hierarchical_decomposition: hierarchy,
            thematic_unity: thematic,
            balance,
            query_intent: intent,
            structural_coherence: structural,
            composite_score: composite,
            seo_score: seo,
            recommendations,
            error: None,
            schema_version: crate::core::types::SCHEMA_VERSION,
        })
    }
}

/// Segments `text` into ~512-char pieces with 50-char overlap, preferring
/// paragraph then sentence boundaries. Chunks shorter than 50 chars are
/// discarded unless the whole document is shorter than that.
pub fn chunk_text(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.chars().count() < MIN_CHUNK_LEN {
        return vec![trimmed.to_string()];
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut end = (start + CHUNK_TARGET_LEN).min(chars.len());
        if end < chars.len() {
            end = find_boundary(&chars, start, end);
        }
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim().to_string();
        if piece.chars().count() >= MIN_CHUNK_LEN || chunks.is_empty() {
            if !piece.is_empty() {
                chunks.push(piece);
            }
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(CHUNK_OVERLAP).max(start + 1);
    }

    chunks
}

fn find_boundary(chars: &[char], start: usize, target_end: usize) -> usize {
    let window_start = start + (target_end - start) / 2;
    for i in (window_start..target_end).rev() {
        if i + 1 < chars.len() && chars[i] == '\n' && chars.get(i + 1) == Some(&'\n') {
            return i + 2;
        }
    }
    for i in (window_start..target_end).rev() {
        if matches!(chars[i], '.' | '!' | '?') {
            return i + 1;
        }
    }
    target_end
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn std_dev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

fn adjacent_similarities(encoded: &[Vec<f32>]) -> Vec<f64> {
    (0..encoded.len().saturating_sub(1)).map(|i| embed::similarity(&encoded[i], &encoded[i + 1])).collect()
}

async fn score_metadata_alignment(title: &str, meta_description: &str, centroid: &[f32], engine: &dyn Embedder) -> crate::core::errors::Result<f64> {
    let mut pieces = Vec::new();
    if !title.trim().is_empty() {
        pieces.push(title.to_string());
    }
    if !meta_description.trim().is_empty() {
        pieces.push(meta_description.to_string());
    }
    if pieces.is_empty() || centroid.is_empty() {
        return Ok(0.0);
    }
    let encoded = engine.encode(&pieces).await?;
    let sims: Vec<f64> = encoded.iter().map(|v| embed::similarity(v, centroid)).collect();
    Ok(clamp01(mean(&sims)) * 100.0)
}

fn score_hierarchical_decomposition(encoded: &[Vec<f32>]) -> f64 {
    if encoded.len() < 2 {
        return 50.0;
    }
    let seq = adjacent_similarities(encoded);
    let mu = mean(&seq);
    let sigma = std_dev(&seq);
    let similarity_sub = (1.0 - (mu - 0.6).abs() / 0.3).max(0.0) * 100.0;
    let consistency_sub = (1.0 - sigma / 0.2).max(0.0) * 100.0;
    0.6 * similarity_sub + 0.4 * consistency_sub
}

fn score_thematic_unity(encoded: &[Vec<f32>]) -> f64 {
    if encoded.len() < 2 {
        return 50.0;
    }
    let matrix = embed::similarity_matrix(encoded);
    let n = matrix.len();
    let mut off_diag = Vec::with_capacity(n * n - n);
    for i in 0..n {
        for j in 0..n {
            if i != j {
                off_diag.push(matrix[i][j]);
            }
        }
    }
    clamp01(mean(&off_diag)) * 100.0
}

fn row_means(matrix: &[Vec<f64>]) -> Vec<f64> {
    matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let others: Vec<f64> = row.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, v)| *v).collect();
            mean(&others)
        })
        .collect()
}

fn score_balance(chunks: &[String], encoded: &[Vec<f32>]) -> f64 {
    if chunks.len() < 3 {
        return 50.0;
    }
    let lengths: Vec<f64> = chunks.iter().map(|c| c.chars().count() as f64).collect();
    let mu_len = mean(&lengths);
    let size_component = if mu_len > 0.0 { (1.0 - std_dev(&lengths) / mu_len).max(0.0) * 100.0 } else { 0.0 };

    let matrix = embed::similarity_matrix(encoded);
    let means = row_means(&matrix);
    let diversity_component = (1.0 - std_dev(&means)).max(0.0) * 100.0;

    0.4 * size_component + 0.6 * diversity_component
}

fn score_query_intent(query_embedding: Option<&[f32]>, encoded: &[Vec<f32>]) -> f64 {
    let Some(q) = query_embedding else {
        return 50.0;
    };
    if encoded.is_empty() {
        return 50.0;
    }
    let sims: Vec<f64> = encoded.iter().map(|v| embed::similarity(q, v)).collect();
    let avg = mean(&sims);
    let max = sims.iter().cloned().fold(f64::MIN, f64::max);
    (0.6 * avg + 0.4 * max) * 100.0
}

fn score_structural_coherence(encoded: &[Vec<f32>]) -> f64 {
    if encoded.len() < 3 {
        return 50.0;
    }
    let seq = adjacent_similarities(encoded);
    let avg_flow = mean(&seq);
    let flow_consistency = (1.0 - std_dev(&seq)).max(0.0);

    let n = encoded.len();
    let max_d = 4.min(n - 1);
    let mut m_ds = Vec::new();
    for d in 1..=max_d {
        let sims: Vec<f64> = (0..n - d).map(|i| embed::similarity(&encoded[i], &encoded[i + d])).collect();
        m_ds.push(mean(&sims));
    }
    let deltas: Vec<f64> = m_ds.windows(2).map(|w| w[1] - w[0]).collect();
    let progression_score = if deltas.is_empty() { 0.0 } else { (-mean(&deltas)).clamp(0.0, 1.0) * 200.0 }.min(100.0);

    (avg_flow * 40.0 + flow_consistency * 30.0 + progression_score * 0.3).min(100.0)
}

#[allow(clippy::too_many_arguments)]
fn score_seo(metadata: f64, thematic: f64, intent: f64, structural: f64, title: &str, meta_description: &str, text: &str) -> f64 {
    let mut score = metadata * 0.25 + thematic * 0.25 + intent * 0.30 + structural * 0.20;
    if !title.trim().is_empty() {
        score += 5.0;
    }
    if !meta_description.trim().is_empty() {
        score += 5.0;
    }
    let len = text.chars().count();
    if (300..=5000).contains(&len) {
        score += 5.0;
    }
    score.min(100.0)
}

fn build_recommendations(metadata: f64, hierarchy: f64, thematic: f64, balance: f64, intent: f64, structural: f64) -> Vec<String> {
    let mut out = Vec::new();
    if metadata < 70.0 {
        out.push("Align title and meta description more closely with the page's core topic.".to_string());
    }
    if hierarchy < 65.0 {
        out.push("Improve content flow between sections so topics build on each other.".to_string());
    }
    if thematic < 60.0 {
        out.push("Tighten thematic focus; several sections drift from the main topic.".to_string());
    }
    if balance < 65.0 {
        out.push("Balance section lengths and topical diversity across the page.".to_string());
    }
    if intent < 70.0 {
        out.push("Add content that more directly addresses the target query's intent.".to_string());
    }
    if structural < 65.0 {
        out.push("Improve structural progression so content develops more clearly from start to finish.".to_string());
    }
    if metadata > 75.0 && hierarchy > 75.0 && thematic > 75.0 && balance > 75.0 && intent > 75.0 && structural > 75.0 {
        out.push("Content is well-aligned, coherent, and structurally sound across all dimensions.".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_text_empty_yields_no_chunks() {
        assert!(chunk_text("").is_empty());
    }

    #[test]
    fn chunk_text_short_document_is_one_chunk() {
        let chunks = chunk_text("short");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunk_text_long_document_overlaps() {
        let text = "Sentence one is here. ".repeat(60);
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn all_dimension_scores_are_bounded() {
        let encoded = vec![
            vec![1.0f32, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.0],
        ];
        let h = score_hierarchical_decomposition(&encoded);
        let t = score_thematic_unity(&encoded);
        let s = score_structural_coherence(&encoded);
        for v in [h, t, s] {
            assert!((0.0..=100.0).contains(&v), "score out of bounds: {v}");
        }
    }

    #[test]
    fn fewer_than_two_chunks_returns_fifty_for_hierarchy() {
        let encoded = vec![vec![1.0f32, 0.0]];
        assert_eq!(score_hierarchical_decomposition(&encoded), 50.0);
    }

    #[test]
    fn query_intent_without_query_is_fifty() {
        let encoded = vec![vec![1.0f32, 0.0]];
        assert_eq!(score_query_intent(None, &encoded), 50.0);
    }

    #[test]
    fn recommendations_include_praise_when_all_high() {
        let recs = build_recommendations(90.0, 90.0, 90.0, 90.0, 90.0, 90.0);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("well-aligned"));
    }
}
