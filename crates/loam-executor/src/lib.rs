//! # loam-executor
//!
//! The step-executor capability: one call turns a step prompt into a textual
//! result. Executors may fail transiently; the agent loop owns recovery, so
//! implementations just surface [`LoamError::Execution`] and move on.

pub mod mock;
pub mod openai;

use async_trait::async_trait;

use loam_core::Result;

pub use mock::{AlwaysFailingExecutor, MockExecutor};
pub use openai::OpenAiExecutor;

/// Executes a single plan step described by `prompt`.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Executor name, for logging.
    fn name(&self) -> &str;

    /// Run one step and return its textual output.
    async fn execute(&self, prompt: &str) -> Result<String>;
}
