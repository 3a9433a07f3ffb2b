use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use crate::error::Result;

/// The embedding oracle: text in, fixed-length numeric vector out.
///
/// Implementations must be deterministic for identical input, and must
/// always return vectors of exactly `dimension()` elements.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Deterministic feature-hashing embedder.
///
/// Lower-cases the text, splits on non-alphanumeric runs, hashes each token
/// into a fixed-size bucket vector with a sign bit, and L2-normalizes. Not a
/// learned model: it exists so the pipeline runs end to end without one and
/// so tests get reproducible vectors. Real deployments plug in their own
/// [`Embedder`].
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Matches the vector width of the original embedding model.
    pub const DEFAULT_DIMENSION: usize = 384;

    /// Panics if `dimension` is zero.
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be positive");
        Self { dimension }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
