use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use infragen::labels::supported_resources_list;
use infragen::logging::init_logging;
use infragen::synthesis::render_context;
use infragen::{Cli, Conversation, Engine, EngineError};
use tracing::info;

const BANNER: &str = "\
Azure Terraform Generator
Describe your infrastructure needs and a Terraform configuration is generated from the reference templates.
Type `history` to show this session, `exit` or `quit` to leave.";

const USAGE_STEPS: &str = "\
To use this configuration:
1. Save the generated Terraform file
2. Initialize Terraform: `terraform init`
3. Review the plan: `terraform plan`
4. Apply the configuration: `terraform apply`";

/// Exit status for a one-shot query the validator judged out of scope.
const EXIT_REJECTED: u8 = 2;

/// How a single request ended, as far as the front end is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Generated,
    Rejected,
    Failed,
}

impl Outcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Self::Generated => ExitCode::SUCCESS,
            Self::Rejected => ExitCode::from(EXIT_REJECTED),
            Self::Failed => ExitCode::FAILURE,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let engine = Engine::from_config(&cli.engine_config(), &cli.provider_config())
        .context("failed to initialize Azure Terraform generator")?;
    info!(templates = engine.template_count(), chunks = engine.index().len(), "ready");

    match cli.query.as_deref() {
        Some(query) => {
            let mut conversation = Conversation::new();
            let outcome = handle_query(&engine, &cli, query, &mut conversation)?;
            Ok(outcome.exit_code())
        }
        None => {
            interactive(&engine, &cli)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn interactive(engine: &Engine, cli: &Cli) -> Result<()> {
    println!("{BANNER}\n");
    let mut conversation = Conversation::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().context("failed to flush stdout")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read from stdin")?;
        let query = line.trim();
        match query {
            "" => continue,
            "exit" | "quit" => break,
            "history" => print_history(&conversation),
            _ => {
                handle_query(engine, cli, query, &mut conversation)?;
            }
        }
    }
    Ok(())
}

fn handle_query(
    engine: &Engine,
    cli: &Cli,
    query: &str,
    conversation: &mut Conversation,
) -> Result<Outcome> {
    if cli.dry_run {
        match engine.retrieve(query) {
            Ok(retrieval) => {
                let labels: Vec<&str> = retrieval
                    .classification
                    .labels
                    .iter()
                    .map(|label| label.as_str())
                    .collect();
                println!(
                    "--- Classification ---\n{}{}\n",
                    labels.join(", "),
                    if retrieval.classification.used_fallback {
                        " (fallback)"
                    } else {
                        ""
                    }
                );
                println!("--- Retrieved Context ---\n{}\n", render_context(&retrieval.context));
                println!("dry-run enabled; skipping generation.");
                Ok(Outcome::Generated)
            }
            Err(err) => Ok(report_failure(&err)),
        }
    } else {
        generate(engine, cli, query, conversation)
    }
}

fn generate(
    engine: &Engine,
    cli: &Cli,
    query: &str,
    conversation: &mut Conversation,
) -> Result<Outcome> {
    match engine.respond(query, conversation) {
        Ok(generation) => {
            println!(
                "--- Generated Terraform Configuration ---\n{}\n",
                generation.configuration
            );
            if let Some(path) = cli.output.as_deref() {
                write_configuration(path, &generation.configuration)?;
                println!("Saved to {}\n", path.display());
            }
            println!("{USAGE_STEPS}");
            Ok(Outcome::Generated)
        }
        Err(err) => Ok(report_failure(&err)),
    }
}

fn report_failure(err: &EngineError) -> Outcome {
    match err {
        EngineError::ScopeRejection { .. } => {
            println!("⚠️ {err}");
            println!(
                "Please ensure your query is related to Azure infrastructure deployment and includes supported resources:\n{}",
                supported_resources_list()
            );
            Outcome::Rejected
        }
        EngineError::Generation(detail) => {
            eprintln!("Error generating Terraform configuration: {detail}");
            Outcome::Failed
        }
        other => {
            eprintln!("Error generating Terraform configuration: {other}");
            Outcome::Failed
        }
    }
}

fn write_configuration(path: &Path, configuration: &str) -> Result<()> {
    fs::write(path, configuration)
        .with_context(|| format!("failed to write configuration to {}", path.display()))
}

fn print_history(conversation: &Conversation) {
    if conversation.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for message in conversation.messages() {
        println!("[{}]\n{}\n", message.role, message.content);
    }
}
