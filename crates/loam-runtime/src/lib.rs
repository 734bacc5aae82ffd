//! # loam-runtime
//!
//! The agent execution loop — drives a plan step by step, detects failure,
//! replans with a bounded recovery budget, scores the finished run, and
//! offers it back to the experience store.
//!
//! ## Architecture
//!
//! ```text
//!            ┌─────────────┐
//!            │    Goal     │
//!            └──────┬──────┘
//!                   ▼
//!            ┌─────────────┐
//!            │  Agent Loop │
//!            │             │
//!            │  1. Plan    │  ← planner (may consult the store)
//!            │  2. Step    │  ← step executor
//!            │  3. Observe │  ← optional per-step hook
//!            │  4. Recover │  ← bounded replanning on failure
//!            │  5. Score   │  ← PEI / FRR
//!            │  6. Commit  │  ← experience store (quality gate)
//!            └──────┬──────┘
//!                   ▼
//!          LoopState (Success | Failed)
//! ```
//!
//! Step-executor failures never cross the `run` boundary: they feed the
//! recovery transition, and the only failure a caller sees is the terminal
//! `Failed` status plus the error log.

pub mod agent_loop;

pub use agent_loop::{
    AgentLoop, ExecutionMetrics, ExecutionStatus, LoopConfig, LoopState, SharedStore,
};
