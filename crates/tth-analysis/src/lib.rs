//! # tth-analysis
//!
//! Event loop of the ttH histogrammer.
//!
//! - [`config`]: line-based analysis configuration and the selection catalog
//! - [`normalize`]: cross-section table, data/MC detection, event weights
//! - [`shard`]: columnar input shards and event-record assembly
//! - [`classify`]: trigger gate and selection matching
//! - [`processor`]: per-shard event loop and the parallel shard runner
//!
//! ## Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use tth_analysis::{AnalysisConfig, ShardProcessor, XsTable};
//!
//! let cfg = AnalysisConfig::load(Path::new("tth.config"))?;
//! let table = cfg.xs_file.as_deref().map(XsTable::load).transpose()?;
//! let outcome = ShardProcessor::new(&cfg, table.as_ref())
//!     .run_files(&[PathBuf::from("user.x.mc15_13TeV.00410000.ttbar.json")])?;
//! println!("{} shards merged", outcome.summaries.len());
//! # Ok::<(), tth_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod config;
pub mod normalize;
pub mod processor;
pub mod shard;

pub use classify::{Classification, EventClassifier, TriggerGate};
pub use config::{AnalysisConfig, NormSource, default_catalog};
pub use normalize::{
    FileSummary, Normalization, SampleKind, XsEntry, XsTable, classify_file, event_weight,
    sample_id_from_file_name,
};
pub use processor::{RunOutcome, SelectionCount, ShardFailure, ShardProcessor, ShardSummary};
pub use shard::{ColumnRequest, EventReader, JaggedColumn, Shard};
