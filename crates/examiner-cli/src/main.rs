//! Oral Examiner CLI
//!
//! Main entry point for serving oral examinations over HTTP.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use examiner_orchestrator::{
    create_router, AppState, ChatCompletionsOracle, Config, ExamSettings, Examiner,
    JsonResultWriter, QuestionBank, Roster, SessionLimits,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP server.
const DEFAULT_PORT: u16 = 3000;

/// Oral Examiner - LLM-driven oral examinations
///
/// Admits students listed in a roster, asks each of them three questions
/// drawn from a question bank, lets an LLM examiner evaluate the answers, and
/// writes a JSON result file per completed exam.
#[derive(Parser, Debug)]
#[command(name = "examiner")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: examiner.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Roster file, one student email per line
    #[arg(long, value_name = "FILE")]
    roster: Option<String>,

    /// Question bank file, one question per line
    #[arg(short, long, value_name = "FILE")]
    questions: Option<String>,

    /// Directory where result files are written
    #[arg(short, long, value_name = "DIR")]
    results_dir: Option<String>,

    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port for the HTTP server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Oral examiner starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads data, builds the examiner and serves it until Ctrl+C.
async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref roster) = args.roster {
        config.roster.clone_from(roster);
    }
    if let Some(ref questions) = args.questions {
        config.questions.clone_from(questions);
    }
    if let Some(ref results_dir) = args.results_dir {
        config.results_dir.clone_from(results_dir);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let roster = Roster::load(&config.roster)?;
    if roster.is_empty() {
        tracing::warn!(path = %config.roster, "Roster is empty; no student can begin an exam");
    }
    let bank = QuestionBank::load(&config.questions)?;
    println!("  Students on roster: {}", roster.len());
    println!("  Questions in bank: {}", bank.len());

    let oracle = ChatCompletionsOracle::from_env(&config.llm)?;
    tracing::debug!(endpoint = %oracle.endpoint(), "LLM endpoint");

    let examiner = Examiner::new(
        Arc::new(roster),
        Arc::new(bank),
        Arc::new(oracle),
        Arc::new(JsonResultWriter::new(&config.results_dir)),
        ExamSettings::from_config(&config),
    );
    let state = AppState::new(Arc::new(examiner)).with_limits(SessionLimits::from_config(&config));
    let router = create_router(state);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Examiner running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Oral examiner stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    println!();
    println!("Shutting down...");
}

fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Ok(Config::load_from_file(path)?)
        }
        None => Ok(Config::load()?),
    }
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Course: {}", config.course);
    println!("  Language: {:?}", config.language);
    println!("  Roster: {}", config.roster);
    println!("  Questions: {}", config.questions);
    println!("  Results directory: {}", config.results_dir);
    println!("  Model: {} ({})", config.llm.model, config.llm.base_url);
    println!("  Max follow-ups per question: {}", config.max_follow_ups);
    println!(
        "  Sessions: at most {} awaiting a student, dropped after {} idle minute(s)",
        config.max_pending_sessions, config.session_idle_minutes
    );
    if let Some(score) = config.fallback_score {
        println!("  Fallback score: {score}");
    }
}
