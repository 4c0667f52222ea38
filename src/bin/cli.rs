//! Console REPL for the assistant core.
//!
//! Reads utterances from stdin, runs them through the entry dispatcher,
//! and prints workflow events and status changes as they happen. Useful
//! for driving the engine without any speech stack attached.

use std::io::Write as _;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use sibyl::input_filter::{classify, InputQuality};
use sibyl::workflow::{WorkflowEvent, WorkflowObserver};
use sibyl::{ChatCallbacks, EngineConfig, EntryDispatcher, SibylError};

#[derive(Parser, Debug)]
#[command(name = "sibyl", about = "Voice research assistant core (text REPL)")]
struct Args {
    /// Provider override: anthropic | openai | ollama.
    #[arg(long)]
    provider: Option<String>,

    /// Model override within the provider.
    #[arg(long)]
    model: Option<String>,

    /// Print workflow debug telemetry.
    #[arg(long)]
    debug: bool,
}

/// Prints observation events to stderr as they arrive.
struct ConsoleObserver {
    debug: bool,
}

impl WorkflowObserver for ConsoleObserver {
    fn emit(&self, event: WorkflowEvent) {
        match &event {
            WorkflowEvent::WorkflowStart { name, states, .. } => {
                eprintln!("[workflow] {} ({} steps)", name, states.len());
            }
            WorkflowEvent::WorkflowNarration { text } => {
                eprintln!("[narration] {text}");
            }
            WorkflowEvent::WorkflowState {
                state_id, status, ..
            } => {
                eprintln!("[state] {state_id}: {status:?}");
            }
            WorkflowEvent::WorkflowActivity { activity, .. } => {
                eprintln!("[activity] {activity}");
            }
            WorkflowEvent::WorkflowLoopUpdate {
                children,
                active_index,
                ..
            } => {
                eprintln!("[loop] {}/{}", active_index + 1, children.len());
            }
            WorkflowEvent::WorkflowDebug {
                step,
                model,
                eval_tokens,
                tok_per_sec,
                total_ms,
                ..
            } => {
                if self.debug {
                    eprintln!(
                        "[debug] {step}: {model} {eval_tokens} tokens \
                         ({tok_per_sec:.1} tok/s, {total_ms} ms)"
                    );
                }
            }
            WorkflowEvent::WorkflowExit { reason, .. } => {
                eprintln!("[workflow] exit: {reason:?}");
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Some(provider) = &args.provider {
        std::env::set_var("SIBYL_PROVIDER", provider);
    }
    let mut config = EngineConfig::from_env();
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }

    let mut session = EntryDispatcher::from_config(&config);
    let observer = ConsoleObserver { debug: args.debug };
    let callbacks = ChatCallbacks::new().with_on_status(|phase| eprintln!("[status] {phase}"));

    eprintln!("sibyl ready. Type a query, or ctrl-d to exit.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("stdin error: {e}");
                break;
            }
        };

        if classify(&line, 0.0, 0.0, 0.0) != InputQuality::Valid {
            continue;
        }

        match session.dispatch(&line, &observer, &callbacks).await {
            Ok(reply) => println!("{reply}"),
            Err(SibylError::Cancelled) => eprintln!("(cancelled)"),
            Err(e) => eprintln!("error: {e}"),
        }
    }
}
