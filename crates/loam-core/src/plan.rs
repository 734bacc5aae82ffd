use serde::{Deserialize, Serialize};

/// An ordered procedural plan for achieving a goal.
///
/// `sub_goals` is the instruction sequence in execution order; `steps_taken`
/// records instructions as they complete and only ever grows. The index into
/// `sub_goals` held by the executing loop is the sole cursor of progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The goal this plan serves.
    pub goal: String,
    /// Ordered instructions; insertion order is execution order.
    pub sub_goals: Vec<String>,
    /// Instructions completed so far, in completion order.
    #[serde(default)]
    pub steps_taken: Vec<String>,
    /// Minimum expected plan length. Informational hint only.
    #[serde(default = "default_minimum_length")]
    pub minimum_length: usize,
}

fn default_minimum_length() -> usize {
    5
}

impl Plan {
    pub fn new(goal: impl Into<String>, sub_goals: Vec<String>) -> Self {
        Self {
            goal: goal.into(),
            sub_goals,
            steps_taken: Vec::new(),
            minimum_length: default_minimum_length(),
        }
    }

    pub fn with_minimum_length(mut self, minimum_length: usize) -> Self {
        self.minimum_length = minimum_length;
        self
    }

    /// Record a completed instruction.
    pub fn add_step(&mut self, step: impl Into<String>) {
        self.steps_taken.push(step.into());
    }

    /// Fraction of sub-goals completed, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.sub_goals.is_empty() {
            return 0.0;
        }
        self.steps_taken.len() as f64 / self.sub_goals.len() as f64
    }

    /// Whether every sub-goal has been completed.
    pub fn is_complete(&self) -> bool {
        self.steps_taken.len() >= self.sub_goals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracks_steps() {
        let mut plan = Plan::new("deploy", vec!["build".into(), "ship".into()]);
        assert_eq!(plan.progress(), 0.0);
        assert!(!plan.is_complete());
        plan.add_step("build");
        assert_eq!(plan.progress(), 0.5);
        plan.add_step("ship");
        assert!(plan.is_complete());
        assert_eq!(plan.progress(), 1.0);
    }

    #[test]
    fn test_empty_plan_progress_is_zero() {
        let plan = Plan::new("noop", vec![]);
        assert_eq!(plan.progress(), 0.0);
        assert!(plan.is_complete());
    }

    #[test]
    fn test_serde_roundtrip_defaults() {
        let json = r#"{"goal":"g","sub_goals":["a"]}"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.minimum_length, 5);
        assert!(plan.steps_taken.is_empty());
    }
}
