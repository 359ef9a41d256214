//! Inference engine interface and the bundled candle backend.
//!
//! This module contains:
//! - InferenceEngine, the narrow interface the generation loop drives
//! - Sampler for token selection with probability metadata
//! - Model resolution (local directory or HuggingFace cache)
//! - CandleEngine, a Qwen3 backend built on candle-transformers

pub mod candle;
pub mod loader;
pub mod sampler;

pub use self::candle::CandleEngine;
pub use loader::{resolve_model, ModelFiles};
pub use sampler::Sampler;

use crate::config::SamplingConfig;
use crate::core::{StepMetadata, Token};
use crate::error::Result;
use crate::grammar::{JsonGrammar, TargetSchema};

/// The operations a generation run needs from an inference backend.
///
/// Every call is made from a single thread, one at a time: each token
/// depends on all tokens before it. Errors end the run.
pub trait InferenceEngine {
    /// Convert text to tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<Token>>;

    /// Convert tokens back to text.
    fn detokenize(&self, tokens: &[Token]) -> Result<String>;

    /// Compile a grammar for `schema`.
    fn create_grammar(&self, schema: &TargetSchema) -> Result<JsonGrammar> {
        JsonGrammar::compile(schema)
    }

    /// Next token given the prompt and the tokens generated so far.
    fn generate_next(
        &mut self,
        prompt: &[Token],
        prior: &[Token],
        options: &SamplingConfig,
    ) -> Result<Token>;

    /// Next token together with its confidence and ranked candidates.
    fn generate_next_with_metadata(
        &mut self,
        prompt: &[Token],
        prior: &[Token],
        options: &SamplingConfig,
    ) -> Result<StepMetadata>;

    /// End-of-sequence token, if the vocabulary has one.
    fn eos_token(&self) -> Option<Token> {
        None
    }
}
