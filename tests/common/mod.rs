//! Shared test fixtures: a scripted in-memory engine and a recording reporter.

#![allow(dead_code)]

use serde_json::Value;
use token_probe::config::SamplingConfig;
use token_probe::core::{Candidate, StepMetadata, Token};
use token_probe::report::{DisplayCandidate, StepReporter};
use token_probe::{Error, InferenceEngine, Result};

/// Engine that replays a fixed list of pieces, then repeats a filler piece.
///
/// The vocabulary holds every printable ASCII character, `\n`, and each
/// scripted piece. Tokenization is greedy longest-match.
pub struct ScriptedEngine {
    vocab: Vec<String>,
    script: Vec<Token>,
    filler: Token,
    /// Number of generate calls made.
    pub calls: usize,
    /// Context lengths (`prior.len()`) seen by each generate call.
    pub prior_lens: Vec<usize>,
    /// Fail the generate call with this index.
    pub fail_at: Option<usize>,
}

impl ScriptedEngine {
    pub fn new(pieces: &[&str]) -> Self {
        Self::with_filler(pieces, " ")
    }

    pub fn with_filler(pieces: &[&str], filler: &str) -> Self {
        let mut vocab: Vec<String> = (0x20u8..0x7f).map(|b| (b as char).to_string()).collect();
        vocab.push("\n".to_string());

        let mut intern = |piece: &str| -> Token {
            match vocab.iter().position(|v| v == piece) {
                Some(i) => i as Token,
                None => {
                    vocab.push(piece.to_string());
                    (vocab.len() - 1) as Token
                }
            }
        };
        let script = pieces.iter().map(|p| intern(*p)).collect();
        let filler = intern(filler);

        Self {
            vocab,
            script,
            filler,
            calls: 0,
            prior_lens: Vec::new(),
            fail_at: None,
        }
    }

    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn next(&mut self, prior: &[Token]) -> Result<Token> {
        let call = self.calls;
        self.calls += 1;
        self.prior_lens.push(prior.len());
        if self.fail_at == Some(call) {
            return Err(Error::Engine(format!("scripted failure at call {call}")));
        }
        Ok(self.script.get(prior.len()).copied().unwrap_or(self.filler))
    }
}

impl InferenceEngine for ScriptedEngine {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let (id, len) = self
                .vocab
                .iter()
                .enumerate()
                .filter(|(_, v)| rest.starts_with(v.as_str()))
                .map(|(i, v)| (i as Token, v.len()))
                .max_by_key(|&(_, len)| len)
                .ok_or_else(|| Error::Tokenization(format!("no token for {rest:?}")))?;
            tokens.push(id);
            rest = &rest[len..];
        }
        Ok(tokens)
    }

    fn detokenize(&self, tokens: &[Token]) -> Result<String> {
        tokens
            .iter()
            .map(|&t| {
                self.vocab
                    .get(t as usize)
                    .map(String::as_str)
                    .ok_or_else(|| Error::Tokenization(format!("unknown token {t}")))
            })
            .collect()
    }

    fn generate_next(
        &mut self,
        _prompt: &[Token],
        prior: &[Token],
        _options: &SamplingConfig,
    ) -> Result<Token> {
        self.next(prior)
    }

    fn generate_next_with_metadata(
        &mut self,
        _prompt: &[Token],
        prior: &[Token],
        _options: &SamplingConfig,
    ) -> Result<StepMetadata> {
        let token = self.next(prior)?;

        // chosen token first, then eight runners-up with shrinking mass
        let mut candidates = vec![Candidate::new(token, 0.6)];
        let mut p = 0.2;
        for offset in 1..=8u32 {
            let other = (token + offset) % self.vocab.len() as Token;
            candidates.push(Candidate::new(other, p));
            p /= 2.0;
        }
        candidates.reverse();

        Ok(StepMetadata::new(token, 0.6, candidates))
    }
}

/// One recorded reporter event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Simple { step: usize, token: Token, text: String },
    Metadata { step: usize, candidates: Vec<DisplayCandidate>, chosen: Token, confidence: f32 },
    GrammarSatisfied { step: usize },
    SimpleResult(String),
    StructuredResult(String, Value),
}

/// Reporter that records every event.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<Event>,
}

impl RecordingReporter {
    pub fn metadata_steps(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Metadata { .. }))
            .collect()
    }
}

impl StepReporter for RecordingReporter {
    fn on_simple_step(&mut self, step: usize, token: Token, text: &str) -> Result<()> {
        self.events.push(Event::Simple {
            step,
            token,
            text: text.to_string(),
        });
        Ok(())
    }

    fn on_metadata_step(
        &mut self,
        step: usize,
        candidates: &[DisplayCandidate],
        chosen: Token,
        _chosen_text: &str,
        confidence: f32,
    ) -> Result<()> {
        self.events.push(Event::Metadata {
            step,
            candidates: candidates.to_vec(),
            chosen,
            confidence,
        });
        Ok(())
    }

    fn on_grammar_satisfied(&mut self, step: usize) -> Result<()> {
        self.events.push(Event::GrammarSatisfied { step });
        Ok(())
    }

    fn on_simple_result(&mut self, text: &str) -> Result<()> {
        self.events.push(Event::SimpleResult(text.to_string()));
        Ok(())
    }

    fn on_structured_result(&mut self, text: &str, parsed: &Value) -> Result<()> {
        self.events
            .push(Event::StructuredResult(text.to_string(), parsed.clone()));
        Ok(())
    }
}
