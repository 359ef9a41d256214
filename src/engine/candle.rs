//! Qwen3 inference backend on candle.
//!
//! The engine keeps the KV cache of the sequence it last evaluated. A request
//! that extends that sequence only forwards the new suffix:
//!
//! ```text
//! fed:      [p0 p1 p2 t0 t1]
//! request:  [p0 p1 p2 t0 t1 t2]   → forward [t2] at offset 5
//! request:  [p0 p1 x0]            → clear cache, forward all at offset 0
//! ```

use candle_core::{DType, Device, Tensor};
use candle_transformers::models::qwen3::{Config as Qwen3Config, ModelForCausalLM};
use tokenizers::Tokenizer;

use super::loader::{load_config, load_safetensors, resolve_model};
use super::sampler::Sampler;
use super::InferenceEngine;
use crate::config::{ModelConfig, SamplingConfig};
use crate::core::{StepMetadata, Token};
use crate::error::{Error, Result};

/// Picks CUDA or Metal when available and not disabled, else CPU.
pub fn select_device(cpu: bool) -> Result<Device> {
    if cpu {
        return Ok(Device::Cpu);
    }
    if candle_core::utils::cuda_is_available() {
        Ok(Device::new_cuda(0)?)
    } else if candle_core::utils::metal_is_available() {
        Ok(Device::new_metal(0)?)
    } else {
        Ok(Device::Cpu)
    }
}

/// Causal LM engine backed by candle-transformers' Qwen3.
pub struct CandleEngine {
    /// The language model.
    model: ModelForCausalLM,
    /// Tokenizer for encoding/decoding text.
    tokenizer: Tokenizer,
    /// Token selection.
    sampler: Sampler,
    /// Tokens currently held in the KV cache.
    fed: Vec<Token>,
    /// Device (CPU/GPU).
    device: Device,
    /// End-of-sequence token ID.
    eos_token_id: Option<Token>,
}

impl CandleEngine {
    /// Resolve, download if needed, and load a model.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let files = resolve_model(&config.model_id, &config.revision)?;
        let device = select_device(config.cpu)?;
        let dtype = if device.is_cpu() {
            DType::F32
        } else {
            DType::BF16
        };

        let model_config: Qwen3Config = load_config(&files.config)?;
        let vb = load_safetensors(&files.weights, dtype, &device)?;
        let model = ModelForCausalLM::new(&model_config, vb)?;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| Error::ModelLoad(format!("Failed to load tokenizer: {e}")))?;

        tracing::info!(
            model_id = %config.model_id,
            layers = model_config.num_hidden_layers,
            vocab = model_config.vocab_size,
            device = ?device,
            "model loaded"
        );

        Ok(Self::new(model, tokenizer, device, config.seed))
    }

    /// Wrap an already loaded model.
    pub fn new(model: ModelForCausalLM, tokenizer: Tokenizer, device: Device, seed: u64) -> Self {
        let eos_token_id = tokenizer
            .token_to_id("<|endoftext|>")
            .or_else(|| tokenizer.token_to_id("<|im_end|>"))
            .or_else(|| tokenizer.token_to_id("</s>"));

        Self {
            model,
            tokenizer,
            sampler: Sampler::with_seed(&SamplingConfig::default(), seed),
            fed: Vec::new(),
            device,
            eos_token_id,
        }
    }

    /// Get the model's device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Logits for the position after `prompt ++ prior`.
    fn next_logits(&mut self, prompt: &[Token], prior: &[Token]) -> Result<Tensor> {
        let mut context = Vec::with_capacity(prompt.len() + prior.len());
        context.extend_from_slice(prompt);
        context.extend_from_slice(prior);
        if context.is_empty() {
            return Err(Error::Engine("cannot generate from an empty context".to_string()));
        }

        let offset = if self.fed.len() < context.len() && context.starts_with(&self.fed) {
            self.fed.len()
        } else {
            self.model.clear_kv_cache();
            0
        };
        tracing::trace!(offset, new_tokens = context.len() - offset, "forward");

        let input_ids = Tensor::new(&context[offset..], &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input_ids, offset)?;
        self.fed = context;

        Ok(logits.flatten_all()?.to_dtype(DType::F32)?)
    }
}

impl InferenceEngine for CandleEngine {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::Tokenization(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn detokenize(&self, tokens: &[Token]) -> Result<String> {
        self.tokenizer
            .decode(tokens, false)
            .map_err(|e| Error::Tokenization(e.to_string()))
    }

    fn generate_next(
        &mut self,
        prompt: &[Token],
        prior: &[Token],
        options: &SamplingConfig,
    ) -> Result<Token> {
        let logits = self.next_logits(prompt, prior)?;
        self.sampler.configure(options);
        self.sampler.sample(&logits)
    }

    fn generate_next_with_metadata(
        &mut self,
        prompt: &[Token],
        prior: &[Token],
        options: &SamplingConfig,
    ) -> Result<StepMetadata> {
        let logits = self.next_logits(prompt, prior)?;
        self.sampler.configure(options);
        self.sampler.sample_with_metadata(&logits)
    }

    fn eos_token(&self) -> Option<Token> {
        self.eos_token_id
    }
}
