//! The generation loop.
//!
//! This module contains:
//! - GenerationLoop, driving an engine one token at a time
//! - SimpleRun and StructuredRun, the outcomes of the two modes

pub mod runner;

pub use runner::{GenerationLoop, SimpleRun, StructuredRun};
