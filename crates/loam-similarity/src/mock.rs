//! Mock embedding provider for deterministic testing.
//!
//! Produces stable pseudo-embeddings without any HTTP calls: identical texts
//! always map to identical vectors, so dot-product similarity is reproducible.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use loam_core::{LoamError, Result};

use crate::embedding::EmbeddingProvider;

const MOCK_DIMS: usize = 8;

/// A mock [`EmbeddingProvider`] for tests.
///
/// Unknown texts get a deterministic hash-derived vector; specific vectors
/// can be pinned with [`with_vector`](Self::with_vector). `with_failure()`
/// makes every call error, which exercises the engine's lexical fallback.
pub struct MockEmbedding {
    pinned: Mutex<HashMap<String, Vec<f32>>>,
    failing: AtomicBool,
    calls: Arc<AtomicUsize>,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self {
            pinned: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pin the vector returned for an exact text.
    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.pinned.lock().insert(text.to_string(), vector);
        self
    }

    /// Make every `embed` call return an error.
    pub fn with_failure(self) -> Self {
        self.failing.store(true, Ordering::Relaxed);
        self
    }

    /// Number of `embed` calls received (for cache assertions).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Handle to the call counter, usable after the provider moves into an engine.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn derive(text: &str) -> Vec<f32> {
        // FNV-1a over the bytes, then spread across the dimensions.
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in text.bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (0..MOCK_DIMS)
            .map(|i| {
                let chunk = (hash >> (i * 8)) & 0xff;
                chunk as f32 / 255.0 + 0.01
            })
            .collect()
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if self.failing.load(Ordering::Relaxed) {
            return Err(LoamError::Embedding("mock embedding failure".into()));
        }

        let pinned = self.pinned.lock();
        Ok(texts
            .iter()
            .map(|t| pinned.get(*t).cloned().unwrap_or_else(|| Self::derive(t)))
            .collect())
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMS
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let provider = MockEmbedding::new();
        let first = provider.embed(&["optimize database"]).await.unwrap();
        let second = provider.embed(&["optimize database"]).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_pinned_vector_wins() {
        let provider = MockEmbedding::new().with_vector("hello", vec![1.0, 0.0]);
        let out = provider.embed(&["hello"]).await.unwrap();
        assert_eq!(out[0], vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let provider = MockEmbedding::new().with_failure();
        assert!(provider.embed(&["anything"]).await.is_err());
    }
}
