use crate::error::{LexiconError, Result};
use crate::text::content_tokens;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Text embedding provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic feature-hashing embedder: word tokens and their character
/// trigrams are hashed into signed buckets, then L2-normalized.
///
/// Needs no model files, so the ensemble always has a secondary scorer.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 256;

    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(LexiconError::EmbeddingError(
                "dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        for token in content_tokens(text) {
            self.add_feature(&mut vec, token.as_bytes(), 1.0);
            let padded: Vec<char> = format!("#{token}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vec, gram.as_bytes(), 0.5);
            }
        }
        normalize(&mut vec);
        vec
    }

    fn add_feature(&self, vec: &mut [f32], bytes: &[u8], weight: f32) {
        let mut state = fnv1a_64(bytes);
        let bits = splitmix64(&mut state);
        let bucket = (bits % self.dimension as u64) as usize;
        let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: Self::DEFAULT_DIMENSION,
        }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Memoizes another embedder with a bounded LRU keyed by the exact text.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Arc<Vec<f32>>>>,
    hits: AtomicUsize,
}

impl CachedEmbedder {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    fn cached(&self, text: &str) -> Option<Arc<Vec<f32>>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(text).cloned()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cached(text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.as_ref().clone());
        }
        let vector = self.inner.embed(text).await?;
        if vector.len() != self.inner.dimension() {
            return Err(LexiconError::EmbeddingError(format!(
                "expected {} dimensions, got {}",
                self.inner.dimension(),
                vector.len()
            )));
        }
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(text.to_string(), Arc::new(vector.clone()));
        Ok(vector)
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_sync("portable computer with a keyboard");
        let b = embedder.embed_sync("portable computer with a keyboard");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_texts_score_higher_than_unrelated() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_sync("laptop computer keyboard");
        let close = embedder.embed_sync("a portable computer with a keyboard");
        let far = embedder.embed_sync("blank paper pages for notes");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        let vec = embedder.embed_sync("the of and");
        assert!(vec.iter().all(|v| *v == 0.0));
        assert_eq!(cosine_similarity(&vec, &vec), 0.0);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[tokio::test]
    async fn cache_serves_repeated_texts() {
        let cached = CachedEmbedder::new(Arc::new(HashingEmbedder::default()), 2);
        let first = cached.embed("dog").await.unwrap();
        let second = cached.embed("dog").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.hits(), 1);
    }

    #[test]
    fn cosine_handles_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
