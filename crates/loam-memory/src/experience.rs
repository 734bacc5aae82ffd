use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use loam_core::{LoamError, Plan, Result};

/// Quality scores for a completed run, all on the [0, 1] scale.
///
/// Score fields are private: the only way to build the type is through the
/// fallible constructors, so an out-of-range score is a [`LoamError::Validation`]
/// at construction time, never a silent clamp. Records crossing the
/// deserialization boundary are re-checked with [`validate`](Self::validate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceMetrics {
    /// Performance-Efficiency Index — the primary score.
    pei: f64,
    /// Failure-Recovery Ratio.
    #[serde(default)]
    frr: f64,
    /// Task-Integrity score.
    #[serde(default)]
    ti: f64,
    #[serde(default = "default_success")]
    pub success: bool,
    /// Wall-clock seconds the run took.
    #[serde(rename = "execution_time", default)]
    pub execution_time_secs: f64,
}

fn default_success() -> bool {
    true
}

fn check_score(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(LoamError::validation(
            field,
            format!("score must be in [0, 1], got {value}"),
        ));
    }
    Ok(())
}

impl ExperienceMetrics {
    pub fn new(pei: f64) -> Result<Self> {
        check_score("pei", pei)?;
        Ok(Self {
            pei,
            frr: 0.0,
            ti: 0.0,
            success: true,
            execution_time_secs: 0.0,
        })
    }

    pub fn with_frr(mut self, frr: f64) -> Result<Self> {
        check_score("frr", frr)?;
        self.frr = frr;
        Ok(self)
    }

    pub fn with_ti(mut self, ti: f64) -> Result<Self> {
        check_score("ti", ti)?;
        self.ti = ti;
        Ok(self)
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_execution_time(mut self, secs: f64) -> Self {
        self.execution_time_secs = secs;
        self
    }

    pub fn pei(&self) -> f64 {
        self.pei
    }

    pub fn frr(&self) -> f64 {
        self.frr
    }

    pub fn ti(&self) -> f64 {
        self.ti
    }

    /// Re-check all score invariants. Used on records loaded from disk,
    /// which bypass the constructors.
    pub fn validate(&self) -> Result<()> {
        check_score("pei", self.pei)?;
        check_score("frr", self.frr)?;
        check_score("ti", self.ti)?;
        Ok(())
    }
}

/// A stored past execution. Immutable once accepted by the store; destroyed
/// only by capacity eviction or an explicit clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// The goal string used for similarity matching.
    pub task: String,
    /// The completed plan.
    pub plan: Plan,
    /// Final textual outcome of the run.
    pub result: String,
    pub metrics: ExperienceMetrics,
    /// Key→value pairs usable as retrieval filters.
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Cached task embedding. Derived, never persisted, never authoritative.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Experience {
    pub fn new(
        task: impl Into<String>,
        plan: Plan,
        result: impl Into<String>,
        metrics: ExperienceMetrics,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
            plan,
            result: result.into(),
            metrics,
            context: HashMap::new(),
            tags: Vec::new(),
            timestamp: Utc::now(),
            embedding: None,
        }
    }

    pub fn with_context(mut self, context: HashMap<String, String>) -> Self {
        self.context = context;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}
