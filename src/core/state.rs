//! Generation state tracking for a single run.
//!
//! The state holds the prompt tokens and the tokens generated so far. Output
//! is append-only and can never grow past the configured budget.

use super::Token;
use crate::error::{Error, Result};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Still requesting tokens.
    Running,
    /// Terminated for the contained reason.
    Finished(TerminationReason),
}

impl RunStatus {
    /// Check if the run is finished.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Why a run stopped. Exactly one applies per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// The accumulated text parsed against the target grammar.
    GrammarSatisfied,
    /// The token budget was exhausted.
    MaxTokensReached,
}

impl TerminationReason {
    /// Get the reason name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GrammarSatisfied => "grammar-satisfied",
            Self::MaxTokensReached => "max-tokens-reached",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tokens of one generation run.
///
/// # Example
///
/// ```
/// use token_probe::core::{GenerationState, RunStatus, TerminationReason};
///
/// let mut state = GenerationState::new(vec![1, 2, 3], 2);
/// assert_eq!(state.prompt_len(), 3);
/// assert!(state.is_empty());
///
/// state.push(7).unwrap();
/// state.push(8).unwrap();
/// assert!(state.is_full());
/// assert!(state.push(9).is_err());
///
/// state.finish(TerminationReason::MaxTokensReached);
/// assert_eq!(state.status(), RunStatus::Finished(TerminationReason::MaxTokensReached));
/// ```
#[derive(Debug, Clone)]
pub struct GenerationState {
    /// Prompt token IDs.
    prompt_token_ids: Vec<Token>,
    /// Generated output token IDs.
    output_token_ids: Vec<Token>,
    /// Maximum number of output tokens.
    max_tokens: usize,
    /// Current status.
    status: RunStatus,
}

impl GenerationState {
    /// Create a new state for the given prompt and budget.
    pub fn new(prompt_token_ids: Vec<Token>, max_tokens: usize) -> Self {
        Self {
            prompt_token_ids,
            output_token_ids: Vec::new(),
            max_tokens,
            status: RunStatus::Running,
        }
    }

    /// Get the prompt token IDs.
    pub fn prompt_token_ids(&self) -> &[Token] {
        &self.prompt_token_ids
    }

    /// Get the output token IDs.
    pub fn output_token_ids(&self) -> &[Token] {
        &self.output_token_ids
    }

    /// Consume the state, keeping only the output tokens.
    pub fn into_output(self) -> Vec<Token> {
        self.output_token_ids
    }

    /// Get the prompt length.
    pub fn prompt_len(&self) -> usize {
        self.prompt_token_ids.len()
    }

    /// Get the output length.
    pub fn len(&self) -> usize {
        self.output_token_ids.len()
    }

    /// Check if nothing has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.output_token_ids.is_empty()
    }

    /// Get the token budget.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Tokens that may still be appended.
    pub fn remaining(&self) -> usize {
        self.max_tokens.saturating_sub(self.output_token_ids.len())
    }

    /// Check if the budget is exhausted.
    pub fn is_full(&self) -> bool {
        self.output_token_ids.len() >= self.max_tokens
    }

    /// Get the current status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Append a generated token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BudgetExceeded`] if the budget is already exhausted
    /// and [`Error::Config`] if the run has finished.
    pub fn push(&mut self, token: Token) -> Result<()> {
        if self.status.is_finished() {
            return Err(Error::Config("cannot append to a finished run".to_string()));
        }
        if self.is_full() {
            return Err(Error::BudgetExceeded {
                max: self.max_tokens,
            });
        }
        self.output_token_ids.push(token);
        Ok(())
    }

    /// Mark the run as finished.
    pub fn finish(&mut self, reason: TerminationReason) {
        self.status = RunStatus::Finished(reason);
    }

    /// Get the termination reason (if finished).
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        match self.status {
            RunStatus::Finished(reason) => Some(reason),
            RunStatus::Running => None,
        }
    }
}
