//! Configuration types for token-probe.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Token budget used when none is configured.
pub const DEFAULT_MAX_TOKENS: usize = 100;

/// Number of candidates shown per step in metadata mode.
pub const DISPLAY_TOP_K: usize = 5;

/// Model loaded when none is configured.
pub const DEFAULT_MODEL_ID: &str = "Qwen/Qwen3-0.6B";

/// System line used by the chat template.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Sampling configuration handed to the engine on every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Temperature for sampling (0.0 = greedy).
    pub temperature: f32,
    /// Top-k candidate cap (0 = disabled).
    pub top_k: usize,
    /// Top-p (nucleus) cumulative cap (1.0 = disabled).
    pub top_p: f32,
    /// Maximum tokens to generate.
    pub max_tokens: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_k: 0,
            top_p: 1.0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl SamplingConfig {
    /// Fixed greedy baseline used for metadata runs: temperature 0, top-k 40, top-p 0.9.
    pub fn baseline() -> Self {
        Self {
            temperature: 0.0,
            top_k: 40,
            top_p: 0.9,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature for sampling.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set top-k sampling parameter.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set top-p (nucleus) sampling parameter.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Whether selection is deterministic (argmax).
    pub fn is_greedy(&self) -> bool {
        self.temperature == 0.0
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(Error::Config(format!(
                "temperature must be a finite value >= 0, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(Error::Config(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// Where the model comes from and how it is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// HuggingFace repo id or a local directory.
    pub model_id: String,
    /// Git revision used for hub downloads.
    pub revision: String,
    /// Force CPU even when an accelerator is compiled in.
    pub cpu: bool,
    /// Seed for stochastic sampling.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: "main".to_string(),
            cpu: false,
            seed: 299_792_458,
        }
    }
}

/// Full run configuration, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Model selection.
    pub model: ModelConfig,
    /// Token budget for both modes.
    pub max_tokens: usize,
    /// Simple-mode temperature. Above 0 the seeded sampler draws tokens.
    pub temperature: f32,
    /// System line for the chat template.
    pub system_prompt: String,
    /// Colored console output.
    pub color: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            color: true,
        }
    }
}

impl RunConfig {
    /// Load a run configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Parse a run configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sampling for simple mode: the configured temperature, no truncation.
    pub fn simple_sampling(&self) -> SamplingConfig {
        SamplingConfig::default()
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
    }

    /// Sampling for metadata mode: the fixed baseline with this budget.
    pub fn structured_sampling(&self) -> SamplingConfig {
        SamplingConfig::baseline().max_tokens(self.max_tokens)
    }
}
