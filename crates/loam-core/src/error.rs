use thiserror::Error;

/// Unified error type for the entire loam workspace.
#[derive(Error, Debug)]
pub enum LoamError {
    // ── Validation ─────────────────────────────────────────────
    #[error("validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Similarity engine ──────────────────────────────────────
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("embedding provider error: {0}")]
    Embedding(String),

    // ── Planning / execution ───────────────────────────────────
    #[error("planning failed: {0}")]
    Planning(String),

    #[error("step execution failed: {0}")]
    Execution(String),

    // ── Memory ─────────────────────────────────────────────────
    #[error("memory error: {0}")]
    Memory(String),

    // ── Config ─────────────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LoamError {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoamError>;
