//! ttH histogrammer CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tth_analysis::{AnalysisConfig, RunOutcome, ShardProcessor, XsTable};
use tth_hist::HistogramStore;

#[derive(Parser)]
#[command(name = "tth-hist")]
#[command(about = "ttH(bb) single-lepton histogrammer")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill per-selection histograms from input shards
    Run {
        /// Analysis config
        #[arg(short, long)]
        config: PathBuf,

        /// Input shards (JSON)
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output histogram store (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Per-shard summary (pretty JSON)
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Write the merged histograms even if some shards failed.
        #[arg(long)]
        keep_going: bool,
    },

    /// Parse a config and print the resolved settings
    CheckConfig {
        /// Analysis config
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Add histogram stores bin by bin
    Merge {
        /// Histogram stores to add
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output histogram store (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config's Debug flag can only raise verbosity, so read it before logging starts.
    let config = match &cli.command {
        Commands::Run { config, .. } | Commands::CheckConfig { config } => {
            Some(AnalysisConfig::load(config)?)
        }
        Commands::Merge { .. } => None,
    };
    let mut level = cli.log_level;
    if config.as_ref().is_some_and(|c| c.debug) {
        level = level.max(tracing::Level::DEBUG);
    }
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match (cli.command, config) {
        (Commands::Run { input, output, summary, threads, keep_going, .. }, Some(cfg)) => {
            cmd_run(&cfg, &input, output.as_ref(), summary.as_ref(), threads, keep_going)
        }
        (Commands::CheckConfig { .. }, Some(cfg)) => {
            write_json(None, serde_json::to_value(&cfg)?)
        }
        (Commands::Merge { input, output }, _) => cmd_merge(&input, output.as_ref()),
        (Commands::Run { .. } | Commands::CheckConfig { .. }, None) => {
            anyhow::bail!("no analysis config loaded")
        }
    }
}

fn cmd_run(
    cfg: &AnalysisConfig,
    inputs: &[PathBuf],
    output: Option<&PathBuf>,
    summary: Option<&PathBuf>,
    threads: usize,
    keep_going: bool,
) -> Result<()> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    let table = match &cfg.xs_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading cross-section table");
            Some(XsTable::load(path)?)
        }
        None => None,
    };

    tracing::info!(
        shards = inputs.len(),
        selections = cfg.selections.len(),
        btag_wp = cfg.btag_wp,
        "processing"
    );
    let outcome = ShardProcessor::new(cfg, table.as_ref()).run_files(inputs)?;

    if let Some(path) = summary {
        write_json(Some(path), summary_json(&outcome))?;
    }

    if !outcome.is_complete() {
        for f in &outcome.failures {
            tracing::warn!(shard = %f.name, "discarded: {}", f.error);
        }
        if !keep_going {
            anyhow::bail!(
                "{} of {} shards failed (first: {}: {}); rerun with --keep-going to write partial results",
                outcome.failures.len(),
                inputs.len(),
                outcome.failures[0].name,
                outcome.failures[0].error
            );
        }
    }

    let store = HistogramStore::from(&outcome.bank);
    write_store(&store, output.map(PathBuf::as_path))
}

fn cmd_merge(inputs: &[PathBuf], output: Option<&PathBuf>) -> Result<()> {
    let mut merged: Option<HistogramStore> = None;
    for path in inputs {
        tracing::info!(path = %path.display(), "adding histogram store");
        let store = HistogramStore::load(path)?;
        match merged.as_mut() {
            Some(acc) => acc.merge(&store)?,
            None => merged = Some(store),
        }
    }
    let merged = merged.ok_or_else(|| anyhow::anyhow!("no input stores"))?;
    write_store(&merged, output.map(PathBuf::as_path))
}

fn summary_json(outcome: &RunOutcome) -> serde_json::Value {
    let failures: Vec<serde_json::Value> = outcome
        .failures
        .iter()
        .map(|f| serde_json::json!({ "name": f.name, "error": f.error.to_string() }))
        .collect();
    serde_json::json!({
        "shards": outcome.summaries,
        "failures": failures,
    })
}

fn write_store(store: &HistogramStore, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => store.save(path)?,
        None => println!("{}", serde_json::to_string_pretty(store)?),
    }
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
