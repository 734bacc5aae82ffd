use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use loam_core::{LoamError, Result};

use crate::embedding::EmbeddingProvider;

/// Words carrying no task identity, removed before the Jaccard computation.
const STOP_WORDS: &[&str] = &["the", "a", "an", "is", "of", "in", "and", "for", "to", "with"];

/// Default bound on the embedding memo cache.
const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// How similarity between two texts is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMethod {
    /// Embedding when the engine has a healthy capability, lexical otherwise.
    Auto,
    /// Token-set Jaccard. Always available.
    Lexical,
    /// Vector similarity. Errors with `CapabilityUnavailable` on a
    /// lexical-only engine.
    Embedding,
}

/// The similarity capability an engine was built with.
#[derive(Clone)]
pub enum Capability {
    Lexical,
    Embedding(Arc<dyn EmbeddingProvider>),
}

/// Stop-word-filtered token-set Jaccard index between two texts.
///
/// Symmetric; returns 0.0 when either text has no tokens left after
/// stop-word removal.
pub fn lexical_similarity(text_a: &str, text_b: &str) -> f32 {
    let tokens = |text: &str| -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w))
            .map(String::from)
            .collect()
    };

    let words_a = tokens(text_a);
    let words_b = tokens(text_b);

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f32 / union as f32
}

/// Insertion-ordered memo cache for computed embeddings. Evicts the oldest
/// entry when full, so the cache never changes a result, only its cost.
struct EmbeddingCache {
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl EmbeddingCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.entries.get(text).cloned()
    }

    fn insert(&mut self, text: String, embedding: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.contains_key(&text) {
            self.entries.insert(text, embedding);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(text.clone());
        self.entries.insert(text, embedding);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Computes a [0, 1] relatedness score between two task descriptions.
///
/// Built with [`Capability::Lexical`] or [`Capability::Embedding`]; the
/// capability is fixed at construction rather than probed at call sites.
pub struct SimilarityEngine {
    capability: Capability,
    cache: Mutex<EmbeddingCache>,
    /// Set after an embedding failure; Auto stops preferring the provider.
    degraded: AtomicBool,
}

impl SimilarityEngine {
    /// A lexical-only engine.
    pub fn lexical() -> Self {
        Self {
            capability: Capability::Lexical,
            cache: Mutex::new(EmbeddingCache::new(DEFAULT_CACHE_CAPACITY)),
            degraded: AtomicBool::new(false),
        }
    }

    /// An engine with the embedding capability.
    pub fn with_embedding(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            capability: Capability::Embedding(provider),
            cache: Mutex::new(EmbeddingCache::new(DEFAULT_CACHE_CAPACITY)),
            degraded: AtomicBool::new(false),
        }
    }

    /// Override the embedding memo-cache bound (0 disables caching).
    pub fn with_cache_capacity(self, capacity: usize) -> Self {
        Self {
            cache: Mutex::new(EmbeddingCache::new(capacity)),
            ..self
        }
    }

    /// Whether the embedding path is configured and still healthy.
    pub fn is_semantic(&self) -> bool {
        matches!(self.capability, Capability::Embedding(_)) && !self.degraded.load(Ordering::Relaxed)
    }

    /// Number of memoized embeddings.
    pub fn cache_size(&self) -> usize {
        self.cache.lock().len()
    }

    /// Drop all memoized embeddings.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Similarity between two texts in [0, 1].
    ///
    /// `Auto` prefers the embedding capability while it is healthy. An
    /// explicit `Embedding` request without the capability is a
    /// [`LoamError::CapabilityUnavailable`], not a fallback; an embedding
    /// *error* on a capable engine degrades to lexical with a warning.
    pub async fn similarity(
        &self,
        text_a: &str,
        text_b: &str,
        method: SimilarityMethod,
    ) -> Result<f32> {
        let use_embedding = match method {
            SimilarityMethod::Lexical => false,
            SimilarityMethod::Auto => self.is_semantic(),
            SimilarityMethod::Embedding => {
                if !matches!(self.capability, Capability::Embedding(_)) {
                    return Err(LoamError::CapabilityUnavailable(
                        "embedding similarity requested on a lexical-only engine".into(),
                    ));
                }
                true
            }
        };

        if use_embedding {
            match self.embedding_similarity(text_a, text_b).await {
                Ok(score) => return Ok(score),
                Err(e) => {
                    warn!(error = %e, "embedding similarity failed, falling back to lexical");
                    self.degraded.store(true, Ordering::Relaxed);
                }
            }
        }

        Ok(lexical_similarity(text_a, text_b))
    }

    async fn embedding_similarity(&self, text_a: &str, text_b: &str) -> Result<f32> {
        let emb_a = self.encode(text_a).await?;
        let emb_b = self.encode(text_b).await?;
        let dot: f32 = emb_a.iter().zip(emb_b.iter()).map(|(x, y)| x * y).sum();
        Ok(dot.clamp(0.0, 1.0))
    }

    /// Encode a text to a normalized vector, memoizing by exact text.
    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let Capability::Embedding(ref provider) = self.capability else {
            return Err(LoamError::CapabilityUnavailable(
                "engine has no embedding capability".into(),
            ));
        };

        if let Some(cached) = self.cache.lock().get(text) {
            return Ok(cached);
        }

        let mut embeddings = provider.embed(&[text]).await?;
        let embedding = match embeddings.pop() {
            Some(v) if !v.is_empty() => normalize(v),
            _ => {
                return Err(LoamError::Embedding(format!(
                    "provider {} returned no embedding",
                    provider.name()
                )));
            }
        };

        debug!(provider = provider.name(), len = embedding.len(), "computed embedding");
        self.cache.lock().insert(text.to_string(), embedding.clone());
        Ok(embedding)
    }
}

/// L2-normalize a vector in place. Zero vectors are returned unchanged.
fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_symmetry() {
        let a = "navigate to the kitchen";
        let b = "kitchen cleanup procedure";
        assert_eq!(lexical_similarity(a, b), lexical_similarity(b, a));
    }

    #[test]
    fn test_lexical_identity() {
        assert_eq!(lexical_similarity("optimize database", "optimize database"), 1.0);
    }

    #[test]
    fn test_lexical_stop_words_only() {
        assert_eq!(lexical_similarity("the a an", "anything else"), 0.0);
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = EmbeddingCache::new(2);
        cache.insert("a".into(), vec![1.0]);
        cache.insert("b".into(), vec![2.0]);
        cache.insert("c".into(), vec![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }
}
