//! Voice Intent - CLI Interface
//!
//! Runs the intent pipeline over transcribed text: one utterance from the
//! command line, or a stream of them on stdin.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use voice_intent::{
    is_stop_command, ActionSink, CommandPipeline, CycleReport, Outcome, PipelineConfig,
    SystemActions, TextClassifier,
};

#[derive(Parser)]
#[command(name = "voice-intent")]
#[command(about = "Voice command interpreter - intent and dispatch", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Use a trained model instead of training on the config corpus
    #[arg(short, long, value_name = "FILE", global = true)]
    model: Option<PathBuf>,

    /// Perform actions for real instead of logging them
    #[arg(long, global = true)]
    live: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify and dispatch one utterance
    Classify {
        /// Transcribed text
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Read one utterance per line from stdin until a stop word
    Repl,

    /// Train on the configured corpus and save the model
    Train {
        /// Where to write the model
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Show pipeline information
    Info,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Train { output } => {
            let mut classifier = TextClassifier::new(config.classifier.clone());
            classifier.train(&config.corpus)?;
            classifier.save(&output)?;
            println!(
                "✓ Model saved: {} ({} intents, {} features)",
                output.display(),
                classifier.intents().len(),
                classifier.num_features()
            );
        }

        Commands::Info => {
            let pipeline = build_pipeline(config, cli.model.as_ref())?;
            println!("{}", pipeline.info());
        }

        Commands::Classify { text } => {
            let pipeline = build_pipeline(config, cli.model.as_ref())?;
            let mut actions = SystemActions::new(cli.live);

            let report = pipeline.handle(&text.join(" "), &mut actions)?;
            print_report(&report);
        }

        Commands::Repl => {
            let pipeline = build_pipeline(config, cli.model.as_ref())?;
            let mut actions = SystemActions::new(cli.live);
            run_repl(&pipeline, &mut actions)?;
        }
    }

    Ok(())
}

fn build_pipeline(config: PipelineConfig, model: Option<&PathBuf>) -> Result<CommandPipeline> {
    let pipeline = match model {
        Some(path) => {
            let classifier = TextClassifier::load(path)?;
            CommandPipeline::with_classifier(config, classifier)?
        }
        None => CommandPipeline::new(config)?,
    };
    Ok(pipeline)
}

/// Stand-in for the listening loop: each stdin line is one transcription
fn run_repl(pipeline: &CommandPipeline, actions: &mut dyn ActionSink) -> Result<()> {
    println!("Voice assistant is listening... Type a command ('stop' to quit).\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let utterance = line.trim();

        if utterance.is_empty() {
            continue;
        }
        if is_stop_command(utterance) {
            break;
        }

        match pipeline.handle(utterance, actions) {
            Ok(report) => print_report(&report),
            // a failed action should not end the session
            Err(e) => log::error!("{}", e),
        }
        println!();
    }

    println!("Voice assistant stopped.");
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("  Cycle: {}", report.id.0);
    println!("  Intent: {}", report.predicted);
    println!("  Confidence: {:.2}", report.confidence);
    println!("  Outcome: {}", report.kind());

    if let Outcome::Act(invocation) = &report.outcome {
        match &invocation.parameter {
            Some(parameter) => println!("  Action: {} ({})", invocation.action, parameter),
            None => println!("  Action: {}", invocation.action),
        }
    }
}
