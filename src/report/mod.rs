//! Per-step observability output and final result reporting.
//!
//! Two reporters implement [`StepReporter`]:
//!
//! 1. **ConsoleReporter**: the demo's human-facing output
//! 2. **SilentReporter**: discards everything

pub mod console;
pub mod table;

pub use console::ConsoleReporter;
pub use table::candidate_table;

use serde_json::Value;

use crate::core::Token;
use crate::error::Result;
use crate::generation::{SimpleRun, StructuredRun};
use crate::grammar::JsonGrammar;

/// A candidate token with its decoded text, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCandidate {
    pub token: Token,
    pub probability: f32,
    pub text: String,
}

impl DisplayCandidate {
    pub fn new(token: Token, probability: f32, text: impl Into<String>) -> Self {
        Self {
            token,
            probability,
            text: text.into(),
        }
    }
}

/// Receives the events of a run.
pub trait StepReporter {
    /// Called after each simple-mode step.
    fn on_simple_step(&mut self, step: usize, token: Token, text: &str) -> Result<()>;

    /// Called after each metadata-mode step, before the grammar check.
    fn on_metadata_step(
        &mut self,
        step: usize,
        candidates: &[DisplayCandidate],
        chosen: Token,
        chosen_text: &str,
        confidence: f32,
    ) -> Result<()>;

    /// Called when the accumulated text first satisfies the grammar.
    fn on_grammar_satisfied(&mut self, step: usize) -> Result<()>;

    /// Called with the full decoded text of a simple run.
    fn on_simple_result(&mut self, text: &str) -> Result<()>;

    /// Called with the decoded text and parsed value of a structured run.
    fn on_structured_result(&mut self, text: &str, parsed: &Value) -> Result<()>;
}

/// Report the decoded text of a simple run. No validation is done.
pub fn report_simple<R: StepReporter + ?Sized>(run: &SimpleRun, reporter: &mut R) -> Result<()> {
    reporter.on_simple_result(&run.text)
}

/// Parse the final text of a structured run and report it.
///
/// # Errors
///
/// A failed final parse is returned, not reported. After
/// `MaxTokensReached` this is an expected outcome.
pub fn report_structured<R: StepReporter + ?Sized>(
    run: &StructuredRun,
    grammar: &JsonGrammar,
    reporter: &mut R,
) -> Result<Value> {
    let parsed = run.parse(grammar)?;
    reporter.on_structured_result(&run.text, &parsed)?;
    Ok(parsed)
}

/// Reporter that outputs nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl StepReporter for SilentReporter {
    fn on_simple_step(&mut self, _step: usize, _token: Token, _text: &str) -> Result<()> {
        Ok(())
    }
    fn on_metadata_step(
        &mut self,
        _step: usize,
        _candidates: &[DisplayCandidate],
        _chosen: Token,
        _chosen_text: &str,
        _confidence: f32,
    ) -> Result<()> {
        Ok(())
    }
    fn on_grammar_satisfied(&mut self, _step: usize) -> Result<()> {
        Ok(())
    }
    fn on_simple_result(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
    fn on_structured_result(&mut self, _text: &str, _parsed: &Value) -> Result<()> {
        Ok(())
    }
}
