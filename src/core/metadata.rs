//! Per-step probability metadata.

use super::Token;

/// One ranked candidate for the next token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Candidate token.
    pub token: Token,
    /// Probability after the engine's truncation and renormalisation.
    pub probability: f32,
}

impl Candidate {
    pub fn new(token: Token, probability: f32) -> Self {
        Self { token, probability }
    }
}

/// Result of one metadata-mode generation step.
///
/// `probabilities` is ordered by probability, highest first. Equal
/// probabilities keep the order the engine supplied them in.
#[derive(Debug, Clone, PartialEq)]
pub struct StepMetadata {
    /// The chosen token.
    pub token: Token,
    /// Engine-reported certainty in `token`, in [0, 1].
    pub confidence: f32,
    /// Ranked candidates.
    pub probabilities: Vec<Candidate>,
}

impl StepMetadata {
    /// Build metadata, ranking the candidates by descending probability.
    pub fn new(token: Token, confidence: f32, mut probabilities: Vec<Candidate>) -> Self {
        // stable: ties keep engine order
        probabilities.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self {
            token,
            confidence: confidence.clamp(0.0, 1.0),
            probabilities,
        }
    }

    /// The `k` most likely candidates.
    pub fn top(&self, k: usize) -> &[Candidate] {
        &self.probabilities[..k.min(self.probabilities.len())]
    }

    /// Probability reported for `token`, if it was a candidate.
    pub fn probability_of(&self, token: Token) -> Option<f32> {
        self.probabilities
            .iter()
            .find(|c| c.token == token)
            .map(|c| c.probability)
    }
}
