use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration — maps to `loam.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoamConfig {
    pub agent: AgentSection,
    pub memory: MemorySection,
    pub executor: ExecutorSection,
    pub embedding: EmbeddingSection,
    pub logging: LoggingSection,
}

// ── Agent loop ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Replanning budget per run; once spent, the next failure is terminal.
    pub max_recovery_attempts: u32,
    /// Whether successful runs are offered back to the experience store.
    pub record_experience: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_recovery_attempts: 3,
            record_experience: true,
        }
    }
}

// ── Experience memory ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Minimum PEI for an experience to be stored, in [0, 1].
    pub storage_threshold: f64,
    /// Similarity floor for the planner's single-best retrieval, in [0, 1].
    pub retrieval_floor: f32,
    /// Maximum stored experiences; 0 = unbounded.
    pub max_episodes: usize,
    /// Similarity method: "auto", "lexical", or "embedding".
    pub similarity_method: String,
    /// Bound on the embedding memo cache.
    pub embedding_cache_size: usize,
    /// Where to persist the JSON memory snapshot (absent = in-memory only).
    pub snapshot_path: Option<PathBuf>,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            storage_threshold: 0.75,
            retrieval_floor: 0.40,
            max_episodes: 10_000,
            similarity_method: "auto".into(),
            embedding_cache_size: 1000,
            snapshot_path: None,
        }
    }
}

// ── Step executor ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// "mock" or "openai".
    pub provider: String,
    pub model: String,
    /// API key; falls back to `LOAM_API_KEY` / `OPENAI_API_KEY` env vars.
    pub api_key: Option<String>,
    /// Override for OpenAI-compatible gateways.
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Bounded retry budget for transient HTTP failures.
    pub max_retries: u32,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            provider: "mock".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

// ── Embedding capability ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    /// "openai" or "ollama".
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub base_url: Option<String>,
    /// API key; same env fallback as the executor.
    pub api_key: Option<String>,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-small".into(),
            dimensions: 1536,
            base_url: None,
            api_key: None,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Tracing filter, e.g. "info" or "loam_runtime=debug,info".
    pub level: String,
    /// "pretty" or "json".
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoamConfig {
    /// Validate the configuration. Returns soft warnings on success and a
    /// hard error message on invalid values.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&self.memory.storage_threshold) {
            return Err(format!(
                "memory.storage_threshold must be in [0, 1], got {}",
                self.memory.storage_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.memory.retrieval_floor) {
            return Err(format!(
                "memory.retrieval_floor must be in [0, 1], got {}",
                self.memory.retrieval_floor
            ));
        }
        if !matches!(
            self.memory.similarity_method.as_str(),
            "auto" | "lexical" | "embedding"
        ) {
            return Err(format!(
                "memory.similarity_method must be auto, lexical, or embedding, got {:?}",
                self.memory.similarity_method
            ));
        }
        if !matches!(self.executor.provider.as_str(), "mock" | "openai") {
            return Err(format!(
                "executor.provider must be mock or openai, got {:?}",
                self.executor.provider
            ));
        }
        if !matches!(self.embedding.provider.as_str(), "openai" | "ollama") {
            return Err(format!(
                "embedding.provider must be openai or ollama, got {:?}",
                self.embedding.provider
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(format!(
                "logging.format must be pretty or json, got {:?}",
                self.logging.format
            ));
        }

        if self.executor.provider == "openai" && self.executor.api_key.is_none() {
            warnings.push(
                "executor.provider is openai but no api_key is set; relying on env vars".into(),
            );
        }
        if self.memory.similarity_method == "embedding" && self.embedding.api_key.is_none()
            && self.embedding.provider == "openai"
        {
            warnings.push(
                "similarity_method is embedding but no embedding api_key is set; relying on env vars"
                    .into(),
            );
        }
        if self.memory.max_episodes == 0 {
            warnings.push("memory.max_episodes is 0 (unbounded); memory will grow without limit".into());
        }
        if self.agent.max_recovery_attempts > 10 {
            warnings.push(format!(
                "agent.max_recovery_attempts = {} is unusually high",
                self.agent.max_recovery_attempts
            ));
        }

        Ok(warnings)
    }
}
