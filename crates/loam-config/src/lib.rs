//! # loam-config
//!
//! Configuration for the loam runtime: a `loam.toml` schema with sensible
//! defaults, environment-variable overrides, and validation. Configuration
//! is always passed explicitly into constructors — there is no process-global
//! mutable state.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AgentSection, EmbeddingSection, ExecutorSection, LoamConfig, LoggingSection, MemorySection,
};
