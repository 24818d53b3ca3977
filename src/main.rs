use std::panic;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use codeview_runner::config::ExecutionConfig;
use codeview_runner::core::domain::{ExecutionRequest, Submission, TestCase, TestRunSummary};
use codeview_runner::core::harness::TestHarness;
use codeview_runner::native::execution_service;

#[derive(Debug, Parser)]
#[command(
    name = "codeview-runner",
    about = "Run untrusted submissions under time and output limits"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a source file once and print the submission report.
    Run {
        #[arg(short, long)]
        language: String,
        /// File whose contents are fed to the program's stdin.
        #[arg(long)]
        stdin: Option<PathBuf>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        source: PathBuf,
    },
    /// Grade a source file against a JSON array of test cases.
    Test {
        #[arg(short, long)]
        language: String,
        #[arg(long)]
        cases: PathBuf,
        source: PathBuf,
    },
    /// List supported languages.
    Languages,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestReport {
    total_tests: usize,
    pass_rate: u32,
    #[serde(flatten)]
    summary: TestRunSummary,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    set_panic_hook();

    let cli = Cli::parse();
    let config = ExecutionConfig::from_env()?;
    tracing::debug!("Loaded config: {:?}", config);

    let service = Arc::new(execution_service(&config));

    match cli.command {
        Command::Run {
            language,
            stdin,
            timeout_ms,
            source,
        } => {
            let stdin = match stdin {
                Some(path) => Some(tokio::fs::read_to_string(path).await?),
                None => None,
            };
            let request = ExecutionRequest {
                source_code: tokio::fs::read_to_string(source).await?,
                language,
                stdin,
                timeout_ms,
            };

            let result = service.execute(&request).await;
            print_json(&Submission::record(&request, result))?;
        }
        Command::Test {
            language,
            cases,
            source,
        } => {
            let code = tokio::fs::read_to_string(source).await?;
            let cases: Vec<TestCase> =
                serde_json::from_str(&tokio::fs::read_to_string(cases).await?)?;

            let summary = TestHarness::new(service)
                .validate(&code, &language, &cases)
                .await;
            print_json(&TestReport {
                total_tests: cases.len(),
                pass_rate: summary.pass_rate(),
                summary,
            })?;
        }
        Command::Languages => {
            for language in service.registry().supported() {
                println!("{}", language);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
