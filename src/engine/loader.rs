//! Model resolution and loading.
//!
//! This module provides functions for:
//! - Resolving a model id to local files (a directory, or the HuggingFace cache)
//! - Loading SafeTensors weights
//! - Reading the model's config.json

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Paths to resolved model files.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    /// Path to config.json.
    pub config: PathBuf,
    /// Paths to weight files (SafeTensors).
    pub weights: Vec<PathBuf>,
    /// Path to tokenizer.json.
    pub tokenizer: PathBuf,
}

/// Resolves a model id to local files.
///
/// # Arguments
///
/// * `model_id` - A local directory, or a HuggingFace model ID (e.g., "Qwen/Qwen3-0.6B")
/// * `revision` - Git revision used for hub downloads. Use "main" for latest.
pub fn resolve_model(model_id: &str, revision: &str) -> Result<ModelFiles> {
    let local = Path::new(model_id);
    if local.is_dir() {
        tracing::info!(path = %local.display(), "using local model directory");
        return resolve_local(local);
    }
    download_model(model_id, revision)
}

/// Resolves model files inside a local directory.
pub fn resolve_local(dir: &Path) -> Result<ModelFiles> {
    let require = |name: &str| -> Result<PathBuf> {
        let path = dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::ModelLoad(format!("{} not found", path.display())))
        }
    };

    let config = require(CONFIG_FILE)?;
    let tokenizer = require(TOKENIZER_FILE)?;
    let weights = resolve_weights(|name| require(name))?;

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

/// Downloads model files from HuggingFace Hub into the local cache.
///
/// Files already cached are not downloaded again. `HF_HOME` and `HF_TOKEN`
/// are honoured.
pub fn download_model(model_id: &str, revision: &str) -> Result<ModelFiles> {
    tracing::info!(model_id, revision, "resolving model from HuggingFace Hub");

    let api = ApiBuilder::from_env()
        .build()
        .map_err(|e| Error::ModelLoad(format!("Failed to create HF API: {e}")))?;

    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = fetch(&repo, CONFIG_FILE)?;
    let weights = resolve_weights(|name| fetch(&repo, name))?;
    let tokenizer = fetch(&repo, TOKENIZER_FILE)?;

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

fn fetch(repo: &ApiRepo, name: &str) -> Result<PathBuf> {
    repo.get(name)
        .map_err(|e| Error::ModelLoad(format!("Failed to download {name}: {e}")))
}

/// Resolves weight files, preferring a single file over a sharded index.
fn resolve_weights<F>(mut get: F) -> Result<Vec<PathBuf>>
where
    F: FnMut(&str) -> Result<PathBuf>,
{
    if let Ok(path) = get(WEIGHTS_FILE) {
        return Ok(vec![path]);
    }

    if let Ok(index_path) = get(WEIGHTS_INDEX_FILE) {
        let index_content = std::fs::read_to_string(&index_path)
            .map_err(|e| Error::ModelLoad(format!("Failed to read safetensors index: {e}")))?;

        return shard_files(&index_content)?
            .iter()
            .map(|name| get(name.as_str()))
            .collect();
    }

    Err(Error::ModelLoad(
        "No SafeTensors weights found. Only the SafeTensors format is supported.".into(),
    ))
}

/// Unique shard filenames listed in a safetensors index, sorted.
pub fn shard_files(index_json: &str) -> Result<Vec<String>> {
    let index: serde_json::Value = serde_json::from_str(index_json)
        .map_err(|e| Error::ModelLoad(format!("Failed to parse safetensors index: {e}")))?;

    let weight_map = index["weight_map"].as_object().ok_or_else(|| {
        Error::ModelLoad("Invalid safetensors index: missing weight_map".into())
    })?;

    let mut shards: Vec<String> = weight_map
        .values()
        .filter_map(|v| v.as_str())
        .map(|s| s.to_string())
        .collect();
    shards.sort();
    shards.dedup();
    Ok(shards)
}

/// Creates a VarBuilder from SafeTensors files.
///
/// # Safety
///
/// Uses memory-mapped file access for efficient loading of large model weights.
/// This is safe as long as the files are not modified while being read.
#[allow(unsafe_code)]
pub fn load_safetensors(
    paths: &[PathBuf],
    dtype: DType,
    device: &Device,
) -> Result<VarBuilder<'static>> {
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(paths, dtype, device)? };
    Ok(vb)
}

/// Loads a model configuration from config.json.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::ModelLoad(format!("Failed to read config.json: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::ModelLoad(format!("Failed to parse config.json: {e}")))
}
