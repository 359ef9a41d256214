//! Error types for token-probe.

use thiserror::Error;

/// Result type alias for token-probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for token-probe.
#[derive(Error, Debug)]
pub enum Error {
    /// Model resolution or loading failed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization or detokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The target schema was rejected when compiling a grammar.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// Text is not a complete, valid instance of the target schema.
    #[error("grammar parse failed: {reason} (text: {text:?})")]
    GrammarParse { reason: String, text: String },

    /// Appending would exceed the configured token budget.
    #[error("token budget of {max} exceeded")]
    BudgetExceeded { max: usize },

    /// Per-step failure reported by the inference engine.
    #[error("engine error: {0}")]
    Engine(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
