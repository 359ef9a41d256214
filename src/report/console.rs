//! Console reporter.
//!
//! Per metadata step it prints a header, the candidate table and the chosen
//! token:
//!
//! ```text
//! Step 3
//! ┌───────┬────────┬──────────┐
//! │ token │ p      │ text     │
//! ├───────┼────────┼──────────┤
//! │ 1     │ 0.9731 │ "\""     │
//! ...
//! chosen: 1  ("\"")  conf≈0.973
//! ```

use std::io::{Stdout, Write};

use colored::Colorize;
use serde_json::Value;

use super::table::candidate_table;
use super::{DisplayCandidate, StepReporter};
use crate::core::Token;
use crate::error::Result;

/// Writes human-facing run output.
pub struct ConsoleReporter<W: Write = Stdout> {
    out: W,
    color: bool,
}

impl ConsoleReporter<Stdout> {
    /// Reporter on stdout.
    pub fn stdout(color: bool) -> Self {
        Self::new(std::io::stdout(), color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    /// Consume the reporter, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn cyan(&self, s: &str) -> String {
        if self.color {
            s.cyan().to_string()
        } else {
            s.to_string()
        }
    }

    fn green(&self, s: &str) -> String {
        if self.color {
            s.bright_green().to_string()
        } else {
            s.to_string()
        }
    }
}

impl<W: Write> StepReporter for ConsoleReporter<W> {
    fn on_simple_step(&mut self, step: usize, token: Token, text: &str) -> Result<()> {
        writeln!(self.out, "[{step:>3}] token {token} -> {text:?}")?;
        Ok(())
    }

    fn on_metadata_step(
        &mut self,
        step: usize,
        candidates: &[DisplayCandidate],
        chosen: Token,
        chosen_text: &str,
        confidence: f32,
    ) -> Result<()> {
        let header = self.cyan(&format!("Step {step}"));
        writeln!(self.out, "\n{header}")?;
        writeln!(self.out, "{}", candidate_table(candidates))?;
        writeln!(
            self.out,
            "chosen: {chosen}  ({chosen_text:?})  conf≈{confidence:.3}"
        )?;
        Ok(())
    }

    fn on_grammar_satisfied(&mut self, _step: usize) -> Result<()> {
        let msg = self.green("Grammar parsed successfully");
        writeln!(self.out, "{msg}")?;
        Ok(())
    }

    fn on_simple_result(&mut self, text: &str) -> Result<()> {
        let label = self.green("\nRESULT:");
        writeln!(self.out, "{label}")?;
        writeln!(self.out, "{text}")?;
        self.out.flush()?;
        Ok(())
    }

    fn on_structured_result(&mut self, text: &str, parsed: &Value) -> Result<()> {
        let label = self.green("\nRESULT:");
        writeln!(self.out, "{label}")?;
        writeln!(self.out, "{text}")?;
        let parsed_label = self.green("Parsed:");
        writeln!(
            self.out,
            "{parsed_label} {}",
            serde_json::to_string_pretty(parsed)?
        )?;
        self.out.flush()?;
        Ok(())
    }
}
