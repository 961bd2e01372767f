//! EmbeddingEngine wraps `model2vec_rs::model::StaticModel`, loading it
//! inside `spawn_blocking` so the async executor never blocks on the
//! model's CPU-bound forward pass.

use std::sync::Arc;

use async_trait::async_trait;
use model2vec_rs::model::StaticModel;

use crate::core::errors::{Result, SeoError};

/// Narrow seam over the embedding backend so `Scorer`/`GapAnalyzer` can run
/// against a deterministic test double instead of loading a real model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut rows = self.encode(std::slice::from_ref(&text.to_string())).await?;
        Ok(rows.pop().unwrap_or_default())
    }
}

pub struct EmbeddingEngine {
    model: Arc<StaticModel>,
    dim: usize,
    batch_size: usize,
}

impl EmbeddingEngine {
    pub async fn load(model_id: &str, batch_size: usize) -> Result<Self> {
        let model_id = model_id.to_string();
        let (model, dim) = tokio::task::spawn_blocking(move || -> Result<(StaticModel, usize)> {
            let model = StaticModel::from_pretrained(&model_id, None, None, None)
                .map_err(|e| SeoError::Embedding(format!("failed to load model '{model_id}': {e}")))?;
            let probe = model.encode_single("dimension probe");
            let dim = probe.len();
            Ok((model, dim))
        })
        .await
        .map_err(|e| SeoError::Embedding(format!("model load task panicked: {e}")))??;

        Ok(Self { model: Arc::new(model), dim, batch_size: batch_size.max(1) })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Chunks a call of size N into ⌈N/B⌉ batches of size B. Each row is
    /// L2-normalized on return.
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let owned: Vec<String> = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut out = Vec::with_capacity(owned.len());
            for chunk in owned.chunks(batch_size) {
                for text in chunk {
                    let raw = model.encode_single(text);
                    out.push(normalize(&raw));
                }
            }
            out
        })
        .await
        .map_err(|e| SeoError::Embedding(format!("encode task panicked: {e}")))
    }

    pub async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut rows = self.encode(std::slice::from_ref(&text.to_string())).await?;
        Ok(rows.pop().unwrap_or_default())
    }
}

#[async_trait]
impl Embedder for EmbeddingEngine {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        EmbeddingEngine::encode(self, texts).await
    }
}

/// Deterministic hash-based embedding for tests. Never loads a real model.
/// Vectors are built from character n-gram hashes so that textually similar
/// inputs land closer together, which is enough signal to exercise scoring
/// and gap-ranking logic without floating-point flakiness.
pub struct StubEmbedder {
    pub dim: usize,
}

impl StubEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        let lower = text.to_lowercase();
        for token in lower.split_whitespace() {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            use std::hash::{Hash, Hasher};
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        normalize(&v)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hash_vector(t)).collect())
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < 1e-12 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// `(u·v + 1) / 2`, mapping cosine similarity into [0,1].
pub fn similarity(u: &[f32], v: &[f32]) -> f64 {
    let dot: f64 = u.iter().zip(v.iter()).map(|(a, b)| *a as f64 * *b as f64).sum();
    ((dot + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// `(MMᵀ + 1) / 2` over a matrix of unit-normalized rows.
pub fn similarity_matrix(rows: &[Vec<f32>]) -> Vec<Vec<f64>> {
    let n = rows.len();
    let mut out = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            out[i][j] = similarity(&rows[i], &rows[j]);
        }
    }
    out
}

/// `normalize(mean(M, axis=0))`.
pub fn centroid(rows: &[Vec<f32>]) -> Vec<f32> {
    if rows.is_empty() {
        return Vec::new();
    }
    let dim = rows[0].len();
    let mut sum = vec![0.0f32; dim];
    for row in rows {
        for (i, v) in row.iter().enumerate() {
            sum[i] += v;
        }
    }
    let n = rows.len() as f32;
    for v in sum.iter_mut() {
        *v /= n;
    }
    normalize(&sum)
}

/// Indices of the `k` rows in `matrix` with largest `dot(q, row)`, descending.
pub fn top_k(q: &[f32], matrix: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = matrix.iter().enumerate().map(|(i, row)| (i, similarity(q, row))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(k).map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let v = normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = normalize(&[1.0, 2.0, 3.0]);
        assert!((similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn orthogonal_unit_vectors_have_similarity_half() {
        let u = vec![1.0, 0.0];
        let v = vec![0.0, 1.0];
        assert!((similarity(&u, &v) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn centroid_of_single_row_equals_that_row() {
        let row = normalize(&[1.0, 2.0, 2.0]);
        let c = centroid(&[row.clone()]);
        for (a, b) in c.iter().zip(row.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn top_k_orders_by_descending_similarity() {
        let q = normalize(&[1.0, 0.0]);
        let matrix = vec![normalize(&[0.0, 1.0]), normalize(&[1.0, 0.0]), normalize(&[0.7, 0.7])];
        let idx = top_k(&q, &matrix, 2);
        assert_eq!(idx[0], 1);
    }
}
