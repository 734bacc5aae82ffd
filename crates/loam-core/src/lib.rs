//! # loam-core
//!
//! Core types, errors, and primitives for the loam agent workspace.
//! This crate defines the shared vocabulary used by every other crate.

pub mod error;
pub mod plan;

pub use error::{LoamError, Result};
pub use plan::Plan;
