//! token-probe: watch an LLM generate, one token at a time.
//!
//! This crate drives an inference engine step by step:
//! - Simple mode: generate a fixed number of tokens, printing each one
//! - Metadata mode: print the top candidates and confidence of every step and
//!   stop as soon as the output parses against a JSON schema
//!
//! The engine is reached through the [`InferenceEngine`] trait; a Qwen3
//! backend on candle is bundled.

pub mod config;
pub mod error;

pub mod core;
pub mod engine;
pub mod generation;
pub mod grammar;
pub mod prompt;
pub mod report;

pub use config::{ModelConfig, RunConfig, SamplingConfig};
pub use crate::core::{GenerationState, StepMetadata, TerminationReason, Token};
pub use engine::{CandleEngine, InferenceEngine, Sampler};
pub use error::{Error, Result};
pub use generation::{GenerationLoop, SimpleRun, StructuredRun};
pub use grammar::{GrammarCheck, JsonGrammar, TargetSchema};
pub use prompt::{PreparedPrompt, PromptBuilder};
pub use report::{ConsoleReporter, SilentReporter, StepReporter};
