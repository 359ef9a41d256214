//! Target schemas and the grammar check run after every generated token.
//!
//! This module contains:
//! - TargetSchema, a JSON Schema subset
//! - JsonGrammar, the compiled handle with `check` and `parse`

pub mod json;
pub mod schema;

pub use json::{GrammarCheck, JsonGrammar};
pub use schema::{SchemaType, TargetSchema};
