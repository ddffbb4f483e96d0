use crate::error::{AppError, Result};
use crate::lifecycle::ModelLifecycle;
use crate::pipeline::InferenceGate;
use crate::prefix::{with_prefix, TextRole};
use ndarray::ArrayView1;
use std::cmp::Ordering;
use std::sync::Arc;

/// A document's original position and its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedIndex {
    pub index: usize,
    pub score: f32,
}

/// Bi-encoder reranking by cosine similarity at the model's native width.
pub struct Reranker {
    lifecycle: Arc<ModelLifecycle>,
    gate: Arc<InferenceGate>,
}

impl Reranker {
    pub fn new(lifecycle: Arc<ModelLifecycle>, gate: Arc<InferenceGate>) -> Self {
        Self { lifecycle, gate }
    }

    /// Rank every document against `query`, most similar first.
    ///
    /// The result is a full permutation of the document indices; equal
    /// scores keep their input order.
    pub async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RankedIndex>> {
        if documents.is_empty() {
            return Err(AppError::ValidationError(
                "Documents list cannot be empty".to_string(),
            ));
        }

        let encoder = self.lifecycle.ensure_ready().await?;

        // Query in row 0, documents after it, in one batch
        let mut batch = Vec::with_capacity(documents.len() + 1);
        batch.push(with_prefix(TextRole::Query, query));
        batch.extend(documents.iter().map(|d| with_prefix(TextRole::Document, d)));

        let embeddings = self.gate.encode(encoder, batch).await?;

        let query_vec = embeddings.row(0);
        let scores: Vec<f32> = embeddings
            .outer_iter()
            .skip(1)
            .map(|doc| cosine_similarity(query_vec, doc))
            .collect();

        tracing::debug!(documents = documents.len(), "Rerank completed");

        Ok(rank_by_score(&scores))
    }
}

/// Dot product over the product of norms; 0.0 when either vector is zero.
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    let dot = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sort indices by descending score. Stable, and NaN scores go last.
pub fn rank_by_score(scores: &[f32]) -> Vec<RankedIndex> {
    let mut ranked: Vec<RankedIndex> = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| RankedIndex { index, score })
        .collect();

    ranked.sort_by(|a, b| descending(a.score, b.score));
    ranked
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{EncoderLoader, TextEncoder};
    use ndarray::{array, Array2};
    use std::time::Duration;

    /// Maps texts onto fixed axes by keyword, so similarity is predictable.
    struct KeywordEncoder;

    const KEYWORDS: [&str; 4] = ["red", "gas", "hot", "ring"];

    impl TextEncoder for KeywordEncoder {
        fn dimension(&self) -> usize {
            KEYWORDS.len() + 1
        }

        fn encode(&self, texts: &[String]) -> Result<Array2<f32>> {
            Ok(Array2::from_shape_fn((texts.len(), 5), |(i, j)| {
                let lower = texts[i].to_lowercase();
                if j < KEYWORDS.len() {
                    if lower.contains(KEYWORDS[j]) {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    0.1
                }
            }))
        }
    }

    struct Loader;

    impl EncoderLoader for Loader {
        fn load(&self) -> Result<Arc<dyn TextEncoder>> {
            Ok(Arc::new(KeywordEncoder))
        }
    }

    fn reranker() -> Reranker {
        let lifecycle = Arc::new(ModelLifecycle::new(Arc::new(Loader)));
        let gate = Arc::new(InferenceGate::new(2, Duration::from_secs(1)));
        Reranker::new(lifecycle, gate)
    }

    fn indices(ranked: &[RankedIndex]) -> Vec<usize> {
        ranked.iter().map(|r| r.index).collect()
    }

    #[tokio::test]
    async fn test_most_similar_document_ranks_first() {
        let documents = vec![
            "Venus is the hottest planet".to_string(),
            "Mars, known for its reddish appearance".to_string(),
            "Jupiter is the largest planet, a gas giant".to_string(),
        ];
        let ranked = reranker()
            .rerank("Which planet is red?", &documents)
            .await
            .unwrap();

        assert_eq!(ranked[0].index, 1);
        assert_eq!(ranked.len(), 3);
    }

    #[tokio::test]
    async fn test_ranking_is_a_permutation() {
        let documents: Vec<String> = (0..25)
            .map(|i| match i % 3 {
                0 => format!("red {}", i),
                1 => format!("gas ring {}", i),
                _ => format!("plain {}", i),
            })
            .collect();

        let ranked = reranker().rerank("ring", &documents).await.unwrap();
        let mut seen = indices(&ranked);
        seen.sort_unstable();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_identical_documents_keep_input_order() {
        let documents = vec![
            "nothing".to_string(),
            "red dust".to_string(),
            "nothing".to_string(),
            "red dust".to_string(),
        ];
        let ranked = reranker().rerank("red", &documents).await.unwrap();
        assert_eq!(indices(&ranked), vec![1, 3, 0, 2]);
    }

    #[tokio::test]
    async fn test_empty_documents_rejected() {
        let err = reranker().rerank("query", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_cosine_similarity_ignores_magnitude() {
        let a = array![1.0f32, 0.0];
        let b = array![5.0f32, 0.0];
        let c = array![0.0f32, 2.0];
        assert!((cosine_similarity(a.view(), b.view()) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(a.view(), c.view()).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = array![0.0f32, 0.0];
        let b = array![1.0f32, 1.0];
        assert_eq!(cosine_similarity(a.view(), b.view()), 0.0);
    }

    #[test]
    fn test_rank_by_score_stable_and_nan_last() {
        let ranked = rank_by_score(&[0.5, f32::NAN, 0.9, 0.5]);
        assert_eq!(indices(&ranked), vec![2, 0, 3, 1]);
    }
}
