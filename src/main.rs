//! docqa - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docqa::{
    cli::{render_answer, render_sources, Args, Commands, Verbosity},
    embedding,
    llm::{self, WatsonxCredentials},
    Config, QaError, QaPipeline,
};

const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let verbosity = args.verbosity();

    let spinner = if verbosity.show_progress() && io::stderr().is_terminal() {
        new_spinner()
    } else {
        ProgressBar::hidden()
    };
    init_logging(verbosity, spinner.clone());

    match run(&args, &spinner).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            spinner.finish_and_clear();
            if matches!(e.downcast_ref::<QaError>(), Some(QaError::Cancelled)) {
                eprintln!("{}", "Cancelled".yellow());
                return ExitCode::from(EXIT_CANCELLED);
            }
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, spinner: &ProgressBar) -> Result<()> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate()?;

    if let Some(Commands::Config) = args.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    spinner.set_message("Connecting to models");
    let llm = llm::from_config(&config.generation, WatsonxCredentials::from_env())?;
    let embedder = tokio::select! {
        _ = cancel.cancelled() => return Err(QaError::Cancelled.into()),
        embedder = embedding::from_config(&config.embedding) => embedder?,
    };
    info!(
        llm = llm.model_id(),
        embedder = embedder.model_name(),
        "models ready"
    );

    let progress = spinner.clone();
    let pipeline = QaPipeline::new(config, embedder, llm)
        .with_cancellation(cancel)
        .on_stage(move |stage| progress.set_message(stage.display_name()));

    let answer = pipeline.answer(&args.file, &args.question).await?;
    spinner.finish_and_clear();

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", render_answer(&answer))?;
    if args.verbosity().show_sources() {
        writeln!(stdout, "{}", render_sources(&answer))?;
    }

    Ok(())
}

/// Cancel the run on the first Ctrl-C
fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Logs go to stderr, drawn around the spinner. `RUST_LOG` wins over flags.
fn init_logging(verbosity: Verbosity, spinner: ProgressBar) {
    let filter = format!("docqa={}", verbosity.log_filter());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(move || SpinnerWriter(spinner.clone()))
        .init();
}

/// Stderr writer that hides the spinner while a log line is printed
struct SpinnerWriter(ProgressBar);

impl Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
