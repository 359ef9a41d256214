//! Generation loop.
//!
//! Drives an [`InferenceEngine`] one token at a time in one of two modes.
//!
//! ## Simple mode
//!
//! ```text
//! Running ──(len == max)──► Done
//!    ▲  │
//!    └──┘ generate_next, append, report token
//! ```
//!
//! ## Metadata mode
//!
//! ```text
//!            ┌── check(text) = Complete ──► GrammarSatisfied
//! Running ───┤
//!    ▲  │    └── len == max ─────────────► MaxTokensReached
//!    └──┘ generate_next_with_metadata, report top-5, append, check(text)
//! ```

use serde_json::Value;

use crate::config::{SamplingConfig, DISPLAY_TOP_K};
use crate::core::{GenerationState, TerminationReason, Token};
use crate::engine::InferenceEngine;
use crate::error::Result;
use crate::grammar::{GrammarCheck, JsonGrammar};
use crate::prompt::PreparedPrompt;
use crate::report::{DisplayCandidate, StepReporter};

/// Outcome of a simple-mode run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleRun {
    /// Generated tokens, in order.
    pub tokens: Vec<Token>,
    /// Decoded text of `tokens`.
    pub text: String,
}

/// Outcome of a metadata-mode run.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRun {
    /// Generated tokens, in order.
    pub tokens: Vec<Token>,
    /// Decoded text of `tokens`.
    pub text: String,
    /// Why the loop stopped.
    pub termination: TerminationReason,
    /// Grammar checks performed during the loop (one per appended token).
    pub parse_attempts: usize,
}

impl StructuredRun {
    /// Number of tokens generated.
    pub fn steps(&self) -> usize {
        self.tokens.len()
    }

    /// Final parse of the decoded text. Errors are the run's outcome.
    pub fn parse(&self, grammar: &JsonGrammar) -> Result<Value> {
        grammar.parse(&self.text)
    }
}

/// Sequential token-by-token generation against an engine.
pub struct GenerationLoop<'e, E: InferenceEngine + ?Sized> {
    engine: &'e mut E,
    sampling: SamplingConfig,
}

impl<'e, E: InferenceEngine + ?Sized> GenerationLoop<'e, E> {
    /// Create a loop; `sampling.max_tokens` is the token budget.
    pub fn new(engine: &'e mut E, sampling: SamplingConfig) -> Self {
        Self { engine, sampling }
    }

    /// Generate exactly `max_tokens` tokens with no grammar check.
    pub fn run_simple<R: StepReporter + ?Sized>(
        &mut self,
        prompt: &PreparedPrompt,
        reporter: &mut R,
    ) -> Result<SimpleRun> {
        self.sampling.validate()?;
        let mut state = GenerationState::new(prompt.tokens.clone(), self.sampling.max_tokens);

        while !state.is_full() {
            let token = self.engine.generate_next(
                state.prompt_token_ids(),
                state.output_token_ids(),
                &self.sampling,
            )?;
            state.push(token)?;

            let text = self.engine.detokenize(&[token])?;
            tracing::debug!(step = state.len(), token, text = %text, "token generated");
            reporter.on_simple_step(state.len(), token, &text)?;
        }
        state.finish(TerminationReason::MaxTokensReached);

        let tokens = state.into_output();
        let text = self.engine.detokenize(&tokens)?;
        tracing::info!(tokens = tokens.len(), "simple run finished");

        Ok(SimpleRun { tokens, text })
    }

    /// Generate until the decoded text satisfies `grammar` or the budget runs out.
    ///
    /// Intermediate grammar failures only mean "keep going"; the final parse
    /// is left to [`StructuredRun::parse`].
    pub fn run_structured<R: StepReporter + ?Sized>(
        &mut self,
        prompt: &PreparedPrompt,
        grammar: &JsonGrammar,
        reporter: &mut R,
    ) -> Result<StructuredRun> {
        self.sampling.validate()?;
        let mut state = GenerationState::new(prompt.tokens.clone(), self.sampling.max_tokens);
        let mut parse_attempts = 0;

        let termination = loop {
            if state.is_full() {
                break TerminationReason::MaxTokensReached;
            }

            let meta = self.engine.generate_next_with_metadata(
                state.prompt_token_ids(),
                state.output_token_ids(),
                &self.sampling,
            )?;

            let candidates = meta
                .top(DISPLAY_TOP_K)
                .iter()
                .map(|c| {
                    let text = self.engine.detokenize(&[c.token])?;
                    Ok(DisplayCandidate::new(c.token, c.probability, text))
                })
                .collect::<Result<Vec<_>>>()?;
            let chosen_text = self.engine.detokenize(&[meta.token])?;
            reporter.on_metadata_step(
                state.len() + 1,
                &candidates,
                meta.token,
                &chosen_text,
                meta.confidence,
            )?;

            state.push(meta.token)?;
            tracing::debug!(
                step = state.len(),
                token = meta.token,
                confidence = meta.confidence,
                "token generated"
            );

            let text = self.engine.detokenize(state.output_token_ids())?;
            parse_attempts += 1;
            if let GrammarCheck::Complete(_) = grammar.check(&text) {
                reporter.on_grammar_satisfied(state.len())?;
                break TerminationReason::GrammarSatisfied;
            }
        };
        state.finish(termination);

        let tokens = state.into_output();
        let text = self.engine.detokenize(&tokens)?;
        tracing::info!(
            tokens = tokens.len(),
            termination = %termination,
            "structured run finished"
        );

        Ok(StructuredRun {
            tokens,
            text,
            termination,
            parse_attempts,
        })
    }
}
