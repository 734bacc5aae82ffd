//! # loam-similarity
//!
//! Relatedness scoring between task descriptions. Two methods:
//!
//! - **Lexical**: stop-word-filtered token-set Jaccard. Pure, deterministic,
//!   never fails.
//! - **Embedding**: dot product of normalized vectors from a pluggable
//!   [`EmbeddingProvider`]. Optional capability selected at construction;
//!   degrades to lexical with a warning when the provider errors.
//!
//! The distinction between the two failure modes is load-bearing: `Auto`
//! degrades silently (well, with a `warn!`), while an explicit `Embedding`
//! request on an engine without the capability fails loud.

pub mod embedding;
pub mod engine;
pub mod mock;

pub use embedding::{EmbeddingProvider, OllamaEmbedding, OpenAiEmbedding};
pub use engine::{Capability, SimilarityEngine, SimilarityMethod, lexical_similarity};
pub use mock::MockEmbedding;
