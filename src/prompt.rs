//! Prompt construction.
//!
//! Renders the question into the demo's chat template (or passes it through
//! verbatim), tokenizes it, and compiles the target grammar when a schema is
//! given. Decoding is not constrained by the grammar, so the schema also goes
//! into the prompt text as an instruction to the model.

use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::core::Token;
use crate::engine::InferenceEngine;
use crate::error::{Error, Result};
use crate::grammar::{JsonGrammar, TargetSchema};

/// Lead-in for the schema when one is attached.
const JSON_INSTRUCTION: &str = "Reply with a single JSON object matching this JSON schema:";

/// A prompt ready to hand to the generation loop.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    /// Rendered prompt text.
    pub text: String,
    /// Tokenized prompt.
    pub tokens: Vec<Token>,
    /// Grammar compiled from the target schema, if any.
    pub grammar: Option<JsonGrammar>,
}

/// Builds the prompt for a run.
///
/// # Example
///
/// ```
/// use token_probe::prompt::PromptBuilder;
///
/// let text = PromptBuilder::new("Why is the sky blue?").render().unwrap();
/// assert!(text.contains("User: Why is the sky blue?"));
/// assert!(text.ends_with("Assistant:\n"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    question: String,
    system: String,
    templated: bool,
    schema: Option<TargetSchema>,
}

impl PromptBuilder {
    /// Start from a question, using the chat template.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            templated: true,
            schema: None,
        }
    }

    /// Send the question verbatim, without the chat template.
    pub fn raw(question: impl Into<String>) -> Self {
        Self {
            templated: false,
            ..Self::new(question)
        }
    }

    /// Replace the system line.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Attach a target schema.
    pub fn schema(mut self, schema: TargetSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Render the prompt text.
    ///
    /// With a schema attached, the system line asks for a JSON object and
    /// carries the schema itself; raw prompts get it appended on a new line.
    pub fn render(&self) -> Result<String> {
        let instruction = self
            .schema
            .as_ref()
            .map(|schema| serde_json::to_string(schema))
            .transpose()?
            .map(|json| format!("{JSON_INSTRUCTION} {json}"));

        let text = match (self.templated, instruction) {
            (true, Some(instruction)) => format!(
                "\nSystem: {} {instruction}\nUser: {} \n\nAssistant:\n",
                self.system, self.question
            ),
            (true, None) => format!(
                "\nSystem: {}\nUser: {} \n\nAssistant:\n",
                self.system, self.question
            ),
            (false, Some(instruction)) => format!("{}\n{instruction}", self.question),
            (false, None) => self.question.clone(),
        };
        Ok(text)
    }

    /// Tokenize the prompt and compile the grammar.
    ///
    /// # Errors
    ///
    /// Fails if the prompt tokenizes to nothing or the engine rejects the schema.
    pub fn build<E: InferenceEngine + ?Sized>(&self, engine: &E) -> Result<PreparedPrompt> {
        let text = self.render()?;
        let tokens = engine.tokenize(&text)?;
        if tokens.is_empty() {
            return Err(Error::Tokenization("Empty prompt".to_string()));
        }

        let grammar = self
            .schema
            .as_ref()
            .map(|schema| engine.create_grammar(schema))
            .transpose()?;

        tracing::debug!(
            prompt_tokens = tokens.len(),
            grammar = grammar.is_some(),
            "prompt prepared"
        );

        Ok(PreparedPrompt {
            text,
            tokens,
            grammar,
        })
    }
}
