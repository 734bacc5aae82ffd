//! # loam-memory
//!
//! Experience-driven memory (EDM) for procedural agents:
//!
//! - **Selective storage**: only executions whose PEI clears the configured
//!   threshold are kept — the store is a quality gate, not a generic cache.
//! - **Performance-weighted retrieval**: candidates are ranked by
//!   `similarity × quality`, so a relevant mediocre run loses to a slightly
//!   less relevant excellent one.
//!
//! Records are immutable once stored and leave only through FIFO eviction or
//! an explicit clear. Snapshots persist to JSON without embeddings; vectors
//! are recomputed on demand so the model and the stored data can never drift
//! apart silently.

pub mod experience;
pub mod store;

pub use experience::{Experience, ExperienceMetrics};
pub use store::{ExperienceStore, MemoryStatistics, RankedExperience, RetrievalOptions};
