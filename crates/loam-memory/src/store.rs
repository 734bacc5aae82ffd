use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use loam_core::{LoamError, Result};
use loam_similarity::{SimilarityEngine, SimilarityMethod};

use crate::experience::Experience;

/// Default minimum PEI an experience needs to be stored.
const DEFAULT_STORAGE_THRESHOLD: f64 = 0.75;
/// Default similarity floor for the single-best retrieval used by planners.
const DEFAULT_RETRIEVAL_FLOOR: f32 = 0.40;
/// Default capacity bound. 0 means unbounded.
const DEFAULT_MAX_EPISODES: usize = 10_000;

/// Parameters for [`ExperienceStore::retrieve`].
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Maximum number of results.
    pub top_k: usize,
    /// Discard candidates scoring below this similarity.
    pub min_similarity: f32,
    /// Discard candidates whose PEI is below this.
    pub min_pei: f64,
    /// Every key→value pair must match the record's context.
    pub context_filter: HashMap<String, String>,
    /// Any matching tag qualifies.
    pub tags_filter: Vec<String>,
    /// Discard records older than this many days.
    pub max_age_days: Option<i64>,
    pub method: SimilarityMethod,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: 0.3,
            min_pei: 0.0,
            context_filter: HashMap::new(),
            tags_filter: Vec::new(),
            max_age_days: None,
            method: SimilarityMethod::Auto,
        }
    }
}

impl RetrievalOptions {
    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(LoamError::validation("top_k", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(LoamError::validation(
                "min_similarity",
                format!("must be in [0, 1], got {}", self.min_similarity),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_pei) {
            return Err(LoamError::validation(
                "min_pei",
                format!("must be in [0, 1], got {}", self.min_pei),
            ));
        }
        Ok(())
    }
}

/// A retrieval hit: the record plus the scores that ranked it.
#[derive(Debug, Clone)]
pub struct RankedExperience {
    pub experience: Experience,
    pub similarity: f32,
    /// The record's PEI (already on the normalized 0–1 scale).
    pub quality: f64,
    /// `similarity × quality` — the ranking key.
    pub combined: f64,
}

/// On-demand summary of the store's contents.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatistics {
    pub count: usize,
    pub mean_pei: f64,
    pub min_pei: f64,
    pub max_pei: f64,
    pub stddev_pei: f64,
    pub success_rate: f64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub semantic_mode: bool,
    pub cache_size: usize,
}

/// Persisted snapshot shape. Embeddings are excluded via `#[serde(skip)]`
/// on the record itself.
#[derive(Serialize, Deserialize)]
struct MemorySnapshot {
    version: String,
    storage_threshold: f64,
    max_episodes: usize,
    episodes: Vec<Experience>,
}

/// The experience store: an ordered, append-only (plus eviction) sequence of
/// accepted past executions behind a PEI quality gate.
///
/// Shared across concurrent runs as `Arc<tokio::sync::Mutex<ExperienceStore>>`;
/// `store` takes `&mut self`, so the threshold check, append, and eviction are
/// atomic under the lock.
pub struct ExperienceStore {
    episodes: Vec<Experience>,
    engine: SimilarityEngine,
    storage_threshold: f64,
    retrieval_floor: f32,
    max_episodes: usize,
}

impl ExperienceStore {
    pub fn new(engine: SimilarityEngine) -> Self {
        Self {
            episodes: Vec::new(),
            engine,
            storage_threshold: DEFAULT_STORAGE_THRESHOLD,
            retrieval_floor: DEFAULT_RETRIEVAL_FLOOR,
            max_episodes: DEFAULT_MAX_EPISODES,
        }
    }

    /// Minimum PEI for acceptance, in [0, 1].
    pub fn with_storage_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LoamError::validation(
                "storage_threshold",
                format!("must be in [0, 1], got {threshold}"),
            ));
        }
        self.storage_threshold = threshold;
        Ok(self)
    }

    /// Similarity floor for [`best_match`](Self::best_match), in [0, 1].
    pub fn with_retrieval_floor(mut self, floor: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&floor) {
            return Err(LoamError::validation(
                "retrieval_floor",
                format!("must be in [0, 1], got {floor}"),
            ));
        }
        self.retrieval_floor = floor;
        Ok(self)
    }

    /// Capacity bound; 0 = unbounded.
    pub fn with_max_episodes(mut self, max_episodes: usize) -> Self {
        self.max_episodes = max_episodes;
        self
    }

    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Offer an experience to the store. Returns `false` (no mutation) when
    /// the PEI is below the storage threshold; on acceptance the single
    /// oldest record is evicted if the capacity bound is exceeded.
    pub async fn store(&mut self, mut experience: Experience) -> Result<bool> {
        experience.metrics.validate()?;

        let pei = experience.metrics.pei();
        if pei < self.storage_threshold {
            debug!(
                task = %experience.task,
                pei,
                threshold = self.storage_threshold,
                "experience rejected below storage threshold"
            );
            return Ok(false);
        }

        if self.engine.is_semantic() {
            match self.engine.encode(&experience.task).await {
                Ok(vector) => experience.embedding = Some(vector),
                Err(e) => warn!(error = %e, "failed to embed stored task"),
            }
        }

        info!(task = %experience.task, pei, "experience stored");
        self.episodes.push(experience);

        if self.max_episodes > 0 && self.episodes.len() > self.max_episodes {
            let removed = self.episodes.remove(0);
            warn!(
                task = %removed.task,
                max_episodes = self.max_episodes,
                "capacity exceeded, evicted oldest experience"
            );
        }

        Ok(true)
    }

    /// Performance-weighted retrieval: every record passing the filters is
    /// scored `similarity × pei`, sorted descending (ties: higher similarity,
    /// then most recent), truncated to `top_k`. An empty result is a normal
    /// outcome, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<RankedExperience>> {
        options.validate()?;

        if self.episodes.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut scored = Vec::new();

        for episode in &self.episodes {
            if !options.context_filter.is_empty()
                && !options
                    .context_filter
                    .iter()
                    .all(|(k, v)| episode.context.get(k) == Some(v))
            {
                continue;
            }
            if !options.tags_filter.is_empty()
                && !options.tags_filter.iter().any(|t| episode.tags.contains(t))
            {
                continue;
            }
            if let Some(max_age) = options.max_age_days {
                if (now - episode.timestamp).num_days() > max_age {
                    continue;
                }
            }
            if episode.metrics.pei() < options.min_pei {
                continue;
            }

            let similarity = self
                .engine
                .similarity(query, &episode.task, options.method)
                .await?;
            if similarity < options.min_similarity {
                continue;
            }

            let quality = episode.metrics.pei();
            scored.push(RankedExperience {
                experience: episode.clone(),
                similarity,
                quality,
                combined: similarity as f64 * quality,
            });
        }

        scored.sort_by(|a, b| {
            b.combined
                .partial_cmp(&a.combined)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    b.similarity
                        .partial_cmp(&a.similarity)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| b.experience.timestamp.cmp(&a.experience.timestamp))
        });
        scored.truncate(options.top_k);

        if !scored.is_empty() {
            debug!(
                query,
                count = scored.len(),
                semantic = self.engine.is_semantic(),
                "retrieved experiences"
            );
        }

        Ok(scored)
    }

    /// Single-best retrieval for the planning collaborator: the highest
    /// combined-score record at or above the configured similarity floor.
    pub async fn best_match(&self, goal: &str) -> Result<Option<RankedExperience>> {
        let options = RetrievalOptions {
            top_k: 1,
            min_similarity: self.retrieval_floor,
            ..Default::default()
        };
        Ok(self.retrieve(goal, &options).await?.into_iter().next())
    }

    /// The `n` highest-PEI records, best first.
    pub fn top_experiences(&self, n: usize) -> Vec<&Experience> {
        let mut sorted: Vec<&Experience> = self.episodes.iter().collect();
        sorted.sort_by(|a, b| {
            b.metrics
                .pei()
                .partial_cmp(&a.metrics.pei())
                .unwrap_or(Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }

    /// O(n) summary over the stored records.
    pub fn statistics(&self) -> MemoryStatistics {
        let count = self.episodes.len();
        if count == 0 {
            return MemoryStatistics {
                count: 0,
                mean_pei: 0.0,
                min_pei: 0.0,
                max_pei: 0.0,
                stddev_pei: 0.0,
                success_rate: 0.0,
                oldest: None,
                newest: None,
                semantic_mode: self.engine.is_semantic(),
                cache_size: self.engine.cache_size(),
            };
        }

        let peis: Vec<f64> = self.episodes.iter().map(|e| e.metrics.pei()).collect();
        let mean = peis.iter().sum::<f64>() / count as f64;
        let variance = peis.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / count as f64;
        let successes = self.episodes.iter().filter(|e| e.metrics.success).count();

        MemoryStatistics {
            count,
            mean_pei: mean,
            min_pei: peis.iter().copied().fold(f64::INFINITY, f64::min),
            max_pei: peis.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            stddev_pei: variance.sqrt(),
            success_rate: successes as f64 / count as f64,
            oldest: self.episodes.iter().map(|e| e.timestamp).min(),
            newest: self.episodes.iter().map(|e| e.timestamp).max(),
            semantic_mode: self.engine.is_semantic(),
            cache_size: self.engine.cache_size(),
        }
    }

    /// Drop every record and the embedding cache.
    pub fn clear(&mut self) {
        self.episodes.clear();
        self.engine.clear_cache();
        info!("experience store cleared");
    }

    /// Serialize the record sequence to a JSON snapshot. Embeddings are
    /// never written. I/O errors propagate untouched.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = MemorySnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage_threshold: self.storage_threshold,
            max_episodes: self.max_episodes,
            episodes: self.episodes.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)?;
        info!(?path, count = self.episodes.len(), "saved memory snapshot");
        Ok(())
    }

    /// Replace the record sequence from a JSON snapshot. Every loaded metric
    /// record is re-validated; embeddings start out absent and are recomputed
    /// lazily on the next retrieval, so stored vectors can never drift out of
    /// sync with the embedding model.
    pub fn load(&mut self, path: &Path) -> Result<usize> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: MemorySnapshot = serde_json::from_str(&raw)?;
        for episode in &snapshot.episodes {
            episode.metrics.validate()?;
        }
        let count = snapshot.episodes.len();
        self.episodes = snapshot.episodes;
        info!(?path, count, "loaded memory snapshot");
        Ok(count)
    }
}
