use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

mod runner;
mod scenario;

use scenario::Scenario;

#[derive(Parser)]
#[command(name = "taskit", version, about = "Drive dependency-gated tasks from a scenario file")]
struct Cli {
    /// Log level used when RUST_LOG is unset (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = clap::value_parser!(LevelFilter))]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print the resulting tasks
    Run {
        /// Scenario file (JSON)
        scenario: PathBuf,
        /// Status store snapshot, loaded before the run and saved after it
        #[arg(long)]
        store: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a scenario file without running it
    Validate {
        /// Scenario file (JSON)
        scenario: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match cli.command {
        Commands::Run {
            scenario,
            store,
            json,
        } => {
            // (A) シナリオとストアを読み込む
            let scenario = Scenario::load(&scenario)?;
            let initial = match &store {
                Some(path) => runner::load_store(path)?,
                None => Default::default(),
            };

            // (B) 実行（失敗したステップは記録して続行）
            let report = runner::run(&scenario, initial)?;

            // (C) 結果を出力
            if json {
                let out = serde_json::to_string_pretty(&report).context("failed to encode report")?;
                println!("{out}");
            } else {
                print!("{}", runner::render_text(&report));
            }

            // (D) ストアを書き戻す
            if let Some(path) = &store {
                runner::save_store(path, &report.store)?;
            }
        }
        Commands::Validate { scenario } => {
            let loaded = Scenario::load(&scenario)?;
            println!(
                "{}: ok ({} dependencies, {} tasks, {} steps)",
                scenario.display(),
                loaded.dependencies.len(),
                loaded.tasks.len(),
                loaded.steps.len()
            );
        }
    }
    Ok(())
}

/// RUST_LOG wins; otherwise `fallback`.
fn init_tracing(fallback: LevelFilter) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
