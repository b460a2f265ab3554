//! Embedding provider trait and vector utilities.
//!
//! Providers may answer a batch in any order; each returned vector carries
//! the index of the input it belongs to. [`embed_in_order`] restores input
//! order and checks that every input got exactly one vector of the expected
//! dimensionality.
//!
//! Concrete providers (OpenAI, Ollama, fastembed) live in the `umesao`
//! application crate.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// One vector returned by a provider, tagged with its input position.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEmbedding {
    pub index: usize,
    pub vector: Vec<f32>,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier stored alongside every vector (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts. Results may come back in any order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>>;
}

/// Embed `texts` and return vectors positionally aligned with the input.
///
/// Fails with [`Error::ExternalService`] if the provider skips or repeats
/// an index, or returns a vector whose length differs from `dims()`.
pub async fn embed_in_order(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let mut results = provider.embed(texts).await?;
    results.sort_by_key(|r| r.index);

    let service = format!("embedding ({})", provider.model_name());
    if results.len() != texts.len() {
        return Err(Error::external(
            service,
            format!("expected {} vectors, got {}", texts.len(), results.len()),
        ));
    }

    let dims = provider.dims();
    let mut vectors = Vec::with_capacity(results.len());
    for (expected, r) in results.into_iter().enumerate() {
        if r.index != expected {
            return Err(Error::external(
                service,
                format!("missing vector for input {}", expected),
            ));
        }
        if r.vector.len() != dims {
            return Err(Error::external(
                service,
                format!(
                    "vector {} has {} dimensions, expected {}",
                    expected,
                    r.vector.len(),
                    dims
                ),
            ));
        }
        vectors.push(r.vector);
    }
    Ok(vectors)
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// ```rust
/// use umesao_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian `f32` bytes. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns `0.0` for empty, mismatched, or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Cosine distance, `1 - cosine_similarity`: 0 for the same direction,
/// 2 for opposite. A zero vector sits at distance 1 from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shuffled {
        drop_last: bool,
        dims: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for Shuffled {
        fn model_name(&self) -> &str {
            "shuffled"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
            let mut out: Vec<IndexedEmbedding> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| IndexedEmbedding {
                    index: i,
                    vector: vec![t.len() as f32, i as f32],
                })
                .rev()
                .collect();
            if self.drop_last {
                out.remove(0);
            }
            Ok(out)
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_embed_in_order_restores_input_order() {
        let p = Shuffled {
            drop_last: false,
            dims: 2,
        };
        let v = embed_in_order(&p, &texts(&["a", "bbb", "cc"])).await.unwrap();
        assert_eq!(v, vec![vec![1.0, 0.0], vec![3.0, 1.0], vec![2.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_embed_in_order_rejects_missing_index() {
        let p = Shuffled {
            drop_last: true,
            dims: 2,
        };
        let err = embed_in_order(&p, &texts(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, Error::ExternalService { .. }));
    }

    #[tokio::test]
    async fn test_embed_in_order_rejects_wrong_dims() {
        let p = Shuffled {
            drop_last: false,
            dims: 3,
        };
        let err = embed_in_order(&p, &texts(&["a"])).await.unwrap_err();
        assert!(err.to_string().contains("expected 3"));
    }

    #[tokio::test]
    async fn test_embed_in_order_empty_input() {
        let p = Shuffled {
            drop_last: true,
            dims: 2,
        };
        assert!(embed_in_order(&p, &[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_blob_length() {
        assert_eq!(vec_to_blob(&[0.5, 1.5, -1.0]).len(), 12);
    }

    #[test]
    fn test_cosine_distance_range() {
        let a = [1.0, 0.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-9);
        assert!((cosine_distance(&a, &[0.0, 3.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_distance(&a, &[-2.0, 0.0]) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let d = cosine_distance(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_zero_vector_is_distance_one() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
