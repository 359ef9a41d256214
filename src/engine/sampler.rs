//! Next-token selection with probability metadata.
//!
//! Turns the logits of one forward pass into a chosen token plus the ranked
//! candidate distribution the choice was made from.
//!
//! ## Sampling Pipeline
//!
//! ```text
//! Logits [vocab_size]
//!     │
//!     ▼ Temperature scaling (skipped at 0 and 1)
//! Logits / temperature
//!     │
//!     ▼ Softmax
//! Probabilities
//!     │
//!     ▼ Rank descending (stable)
//!     │
//!     ▼ Top-k truncation (optional)
//!     │
//!     ▼ Top-p truncation (optional)
//!     │
//!     ▼ Renormalize
//! Candidates ──► argmax (temperature 0) or weighted draw
//! ```

use candle_core::{DType, Tensor, D};
use rand::distributions::Distribution;
use rand::SeedableRng;

use crate::config::SamplingConfig;
use crate::core::{Candidate, StepMetadata, Token};
use crate::error::{Error, Result};

/// Token sampler with configurable sampling strategies.
#[derive(Debug, Clone)]
pub struct Sampler {
    /// Temperature for scaling logits.
    temperature: f32,
    /// Top-k value (0 = disabled).
    top_k: usize,
    /// Top-p value (1.0 = disabled).
    top_p: f32,
    /// Random number generator.
    rng: rand::rngs::StdRng,
}

impl Sampler {
    /// Creates a new sampler with a specific seed for reproducibility.
    pub fn with_seed(config: &SamplingConfig, seed: u64) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    /// Apply per-step options, keeping the RNG stream.
    pub fn configure(&mut self, config: &SamplingConfig) {
        self.temperature = config.temperature;
        self.top_k = config.top_k;
        self.top_p = config.top_p;
    }

    /// Sample a token from logits.
    pub fn sample(&mut self, logits: &Tensor) -> Result<Token> {
        Ok(self.sample_with_metadata(logits)?.token)
    }

    /// Sample a token and report the candidate distribution.
    ///
    /// # Arguments
    ///
    /// * `logits` - Raw logits for one position; any shape with a single
    ///   non-unit dimension, e.g. `[vocab]` or `[1, 1, vocab]`
    pub fn sample_with_metadata(&mut self, logits: &Tensor) -> Result<StepMetadata> {
        let logits = logits.flatten_all()?.to_dtype(DType::F32)?;
        if logits.dim(0)? == 0 {
            return Err(Error::Engine("empty logits".to_string()));
        }

        let logits = if self.temperature > 0.0 && self.temperature != 1.0 {
            (logits / self.temperature as f64)?
        } else {
            logits
        };

        let probs: Vec<f32> = candle_nn::ops::softmax(&logits, D::Minus1)?.to_vec1()?;
        let candidates = self.truncate(rank(&probs));

        let token = if self.temperature == 0.0 {
            candidates[0].token
        } else {
            self.draw(&candidates)?
        };
        let confidence = candidates
            .iter()
            .find(|c| c.token == token)
            .map(|c| c.probability)
            .unwrap_or(0.0);

        Ok(StepMetadata::new(token, confidence, candidates))
    }

    /// Apply top-k then top-p to ranked candidates and renormalize.
    fn truncate(&self, mut ranked: Vec<Candidate>) -> Vec<Candidate> {
        if self.top_k > 0 && self.top_k < ranked.len() {
            ranked.truncate(self.top_k);
        }

        if self.top_p > 0.0 && self.top_p < 1.0 {
            let total: f32 = ranked.iter().map(|c| c.probability).sum();
            let mut cumulative = 0.0f32;
            let mut cutoff = ranked.len();
            for (i, c) in ranked.iter().enumerate() {
                cumulative += c.probability / total;
                if cumulative > self.top_p {
                    // keep the token that crossed the threshold
                    cutoff = i + 1;
                    break;
                }
            }
            ranked.truncate(cutoff);
        }

        let sum: f32 = ranked.iter().map(|c| c.probability).sum();
        if sum > 0.0 {
            for c in &mut ranked {
                c.probability /= sum;
            }
        }
        ranked
    }

    /// Weighted draw from renormalized candidates using the stored RNG.
    fn draw(&mut self, candidates: &[Candidate]) -> Result<Token> {
        let weights: Vec<f64> = candidates.iter().map(|c| c.probability as f64).collect();
        let dist = rand::distributions::WeightedIndex::new(&weights)
            .map_err(|e| Error::Engine(format!("failed to create distribution: {e}")))?;
        Ok(candidates[dist.sample(&mut self.rng)].token)
    }
}

/// Pair probabilities with token ids, highest first. Ties keep id order.
fn rank(probs: &[f32]) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = probs
        .iter()
        .enumerate()
        .map(|(i, &p)| Candidate::new(i as Token, p))
        .collect();
    ranked.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
