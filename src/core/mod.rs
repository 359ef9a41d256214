//! Core data model for a generation run.
//!
//! This module contains:
//! - Token, the opaque engine token id
//! - GenerationState for the append-only, budget-bounded output
//! - StepMetadata for per-step probability information

pub mod metadata;
pub mod state;

pub use metadata::{Candidate, StepMetadata};
pub use state::{GenerationState, RunStatus, TerminationReason};

/// Opaque token identifier produced and consumed by the engine.
pub type Token = u32;
