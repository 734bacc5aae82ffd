//! # loam-planner
//!
//! Turns a goal into an ordered sub-goal plan. The [`TemplatePlanner`] asks
//! the experience store for the best prior plan first; when memory has
//! nothing close enough it falls through to an ordered rule table of
//! (keywords → template) pairs, first match wins, with a default template
//! closing the table.

pub mod template;

use async_trait::async_trait;

use loam_core::{Plan, Result};
use loam_memory::ExperienceStore;

pub use template::{TemplatePlanner, TemplateRule};

/// The planning collaborator consumed by the agent loop.
///
/// Implementations must be deterministic given the same store snapshot so the
/// loop can be tested in isolation.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Produce a plan for `goal`, consulting the store for reusable prior
    /// experience unless this is a replan.
    async fn generate_plan(
        &self,
        goal: &str,
        store: &ExperienceStore,
        is_replan: bool,
    ) -> Result<Plan>;

    /// Produce a fresh plan after `failed_plan` broke at `failure_index`.
    async fn replan(
        &self,
        failed_plan: &Plan,
        store: &ExperienceStore,
        failure_index: usize,
    ) -> Result<Plan>;
}
