use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gridpilot::agent_engine::loop_control::AbortHandle;
use gridpilot::agent_engine::state::RunStatus;
use gridpilot::config::{load_config, render_config};

/// Drive the desktop with a vision model until the task is done.
#[derive(Debug, Parser)]
#[command(name = "gridpilot", version, about)]
struct Cli {
    /// Natural-language task, e.g. "open example.com in the browser".
    #[arg(required_unless_present = "print_config")]
    task: Option<String>,

    /// Path to config.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for per-run screenshot folders.
    #[arg(long)]
    archive_dir: Option<PathBuf>,

    /// Do not save screenshots.
    #[arg(long)]
    no_archive: bool,

    /// Stop after this many iterations.
    #[arg(long)]
    max_steps: Option<u32>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    gridpilot::init_tracing();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            return ExitCode::from(2);
        }
    };
    if let Some(dir) = cli.archive_dir {
        config.archive.root = dir;
    }
    if cli.no_archive {
        config.archive.enabled = false;
    }
    if cli.max_steps.is_some() {
        config.run.max_steps = cli.max_steps;
    }

    if cli.print_config {
        return match render_config(&config) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to render config");
                ExitCode::from(2)
            }
        };
    }
    let Some(task) = cli.task else {
        return ExitCode::from(2);
    };

    let abort = AbortHandle::new();
    let on_signal = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping after the current step");
            on_signal.abort();
        }
    });

    match gridpilot::run_task(&task, &config, abort).await {
        Ok(outcome) => {
            match &outcome.status {
                RunStatus::Completed => println!("Task completed in {} steps.", outcome.steps),
                RunStatus::Aborted => println!("Task aborted by operator."),
                RunStatus::Interrupted => println!("Task interrupted."),
                RunStatus::LimitReached(reason) => println!("Task stopped: {reason}."),
                RunStatus::Failed(reason) => println!("Task failed: {reason}"),
            }
            if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::from(2)
        }
    }
}
