use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use token_probe::config::RunConfig;
use token_probe::engine::CandleEngine;
use token_probe::generation::GenerationLoop;
use token_probe::grammar::TargetSchema;
use token_probe::prompt::PromptBuilder;
use token_probe::report::{report_simple, report_structured, ConsoleReporter};

const SIMPLE_PROMPT: &str = "What is the capital of France?";
const STRUCTURED_PROMPT: &str = "Why is the sky blue?";

#[derive(Parser, Debug)]
#[command(name = "token-probe")]
#[command(version, about = "Watch an LLM generate one token at a time")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fixed number of tokens and print each one
    Simple {
        /// Input prompt
        #[arg(short, long, default_value = SIMPLE_PROMPT)]
        prompt: String,

        /// Wrap the prompt in the System/User/Assistant template
        #[arg(long)]
        template: bool,

        /// Sampling temperature (0 = greedy); above 0 tokens are drawn with --seed
        #[arg(short, long)]
        temperature: Option<f32>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Show per-step probabilities and stop once the output matches a JSON schema
    Structured {
        /// Input question
        #[arg(short, long, default_value = STRUCTURED_PROMPT)]
        prompt: String,

        /// JSON schema file (defaults to the answer/reason/confidence object)
        #[arg(long)]
        schema: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Model path or HuggingFace model ID
    #[arg(short, long)]
    model: Option<String>,

    /// Model revision on the hub
    #[arg(long)]
    revision: Option<String>,

    /// Maximum tokens to generate
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Run on CPU rather than on GPU
    #[arg(long)]
    cpu: bool,

    /// Seed for stochastic sampling
    #[arg(long)]
    seed: Option<u64>,

    /// JSON run configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl CommonArgs {
    fn resolve(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(model) = &self.model {
            config.model.model_id = model.clone();
        }
        if let Some(revision) = &self.revision {
            config.model.revision = revision.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(seed) = self.seed {
            config.model.seed = seed;
        }
        config.model.cpu |= self.cpu;
        config.color &= !self.no_color;
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("token_probe=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_engine(config: &RunConfig) -> Result<CandleEngine> {
    CandleEngine::load(&config.model)
        .with_context(|| format!("loading model {}", config.model.model_id))
}

fn run_simple(prompt: String, template: bool, config: RunConfig) -> Result<()> {
    let sampling = config.simple_sampling();
    sampling.validate()?;
    if !sampling.is_greedy() {
        tracing::info!(
            temperature = sampling.temperature,
            seed = config.model.seed,
            "stochastic sampling"
        );
    }

    let mut engine = load_engine(&config)?;
    let builder = if template {
        PromptBuilder::new(prompt).system(config.system_prompt.clone())
    } else {
        PromptBuilder::raw(prompt)
    };
    let prepared = builder.build(&engine)?;

    let mut reporter = ConsoleReporter::stdout(config.color);
    let run = GenerationLoop::new(&mut engine, sampling).run_simple(&prepared, &mut reporter)?;
    report_simple(&run, &mut reporter)?;
    Ok(())
}

fn run_structured(prompt: String, schema: Option<PathBuf>, config: RunConfig) -> Result<()> {
    let schema = match schema {
        Some(path) => TargetSchema::from_file(&path)
            .with_context(|| format!("loading schema {}", path.display()))?,
        None => TargetSchema::answer(),
    };

    let mut engine = load_engine(&config)?;
    let prepared = PromptBuilder::new(prompt)
        .system(config.system_prompt.clone())
        .schema(schema)
        .build(&engine)?;
    let grammar = prepared
        .grammar
        .clone()
        .context("prompt built without a grammar")?;

    let sampling = config.structured_sampling();
    let mut reporter = ConsoleReporter::stdout(config.color);
    let run = GenerationLoop::new(&mut engine, sampling)
        .run_structured(&prepared, &grammar, &mut reporter)?;

    report_structured(&run, &grammar, &mut reporter)
        .with_context(|| format!("final parse after {} ({} tokens)", run.termination, run.steps()))?;
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Simple {
            prompt,
            template,
            temperature,
            common,
        } => {
            let mut config = common.resolve()?;
            if let Some(temperature) = temperature {
                config.temperature = temperature;
            }
            run_simple(prompt, template, config)
        }
        Command::Structured {
            prompt,
            schema,
            common,
        } => run_structured(prompt, schema, common.resolve()?),
    }
}
