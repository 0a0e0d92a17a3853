//! Per-shard event loop and the parallel shard runner.
//!
//! Each shard is processed strictly sequentially into its own
//! [`HistogramBank`]. Shards are independent, so [`ShardProcessor::run_shards`]
//! distributes them over the rayon pool and folds the successful banks with
//! [`tth_hist::merge`]. A shard that fails part-way is discarded whole.

use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use tth_core::{BTagClassifier, Error, Result};
use tth_hist::{HistogramBank, merge};

use crate::classify::{EventClassifier, TriggerGate};
use crate::config::AnalysisConfig;
use crate::normalize::{Normalization, SampleKind, XsTable, classify_file, event_weight};
use crate::shard::{ColumnRequest, EventReader, Shard};

const PROGRESS_EVERY: usize = 1000;

/// Events accepted by one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionCount {
    /// Selection name.
    pub selection: String,
    /// Number of matched events.
    pub events: u64,
    /// Sum of the weights of matched events.
    pub sum_weights: f64,
}

/// Bookkeeping for one processed shard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardSummary {
    /// Input file base name.
    pub name: String,
    /// Sample id of simulated shards; `None` for data.
    pub sample_id: Option<String>,
    /// Events read.
    pub events: u64,
    /// Events passing the trigger gate.
    pub passed_trigger: u64,
    /// Sum of the weights of all events read.
    pub sum_weights: f64,
    /// Per-selection counts, in catalog order.
    pub selections: Vec<SelectionCount>,
}

/// A shard that was aborted and left out of the merged bank.
#[derive(Debug)]
pub struct ShardFailure {
    /// Input file (or shard) name.
    pub name: String,
    /// Reason for the abort.
    pub error: Error,
}

/// Result of a multi-shard run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Bin-wise sum of every successful shard's bank.
    pub bank: HistogramBank,
    /// Summaries of the successful shards, in input order.
    pub summaries: Vec<ShardSummary>,
    /// Discarded shards, in input order.
    pub failures: Vec<ShardFailure>,
}

impl RunOutcome {
    /// Whether every shard was processed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the event loop over shards for one analysis configuration.
#[derive(Debug)]
pub struct ShardProcessor<'a> {
    cfg: &'a AnalysisConfig,
    xs_table: Option<&'a XsTable>,
    classifier: EventClassifier,
}

impl<'a> ShardProcessor<'a> {
    /// Create a processor. `xs_table` is required as soon as a simulated shard is seen.
    pub fn new(cfg: &'a AnalysisConfig, xs_table: Option<&'a XsTable>) -> Self {
        let classifier = EventClassifier::new(
            cfg.selections.clone(),
            BTagClassifier::new(cfg.btag_wp),
            TriggerGate::new(cfg.triggers.clone()),
        );
        Self { cfg, xs_table, classifier }
    }

    /// An unfilled bank booked for the configured catalog.
    pub fn empty_bank(&self) -> HistogramBank {
        HistogramBank::book_with_discriminant(
            &self.cfg.selections,
            self.cfg.slot_caps,
            self.cfg.discriminant_name(),
        )
    }

    /// Process every event of `shard` into a fresh bank.
    ///
    /// Normalization is resolved and all columns bound before the first event,
    /// so lookup and missing-column failures leave nothing behind.
    pub fn process(&self, shard: &Shard) -> Result<(HistogramBank, ShardSummary)> {
        let cfg = self.cfg;
        let name = shard.base_name();

        let norm = match classify_file(name, &cfg.data_pattern) {
            SampleKind::Data => {
                log::info!("{name}: real data, unit event weights");
                None
            }
            SampleKind::Mc { sample_id } => {
                let table = self
                    .xs_table
                    .ok_or_else(|| Error::NormalizationLookup { sample_id: sample_id.clone() })?;
                Some(Normalization::resolve(
                    &sample_id,
                    table,
                    &shard.summary(),
                    cfg.norm_source,
                    cfg.cutflow_bin,
                    name,
                )?)
            }
        };

        let req = ColumnRequest {
            is_mc: norm.is_some(),
            triggers: &cfg.triggers,
            btag_branch: &cfg.btag_branch,
            needs_era: cfg.uses_eras(),
        };
        let reader = EventReader::bind(shard, &req, norm.as_ref().map(|n| n.sample_id.as_str()))?;
        let n_entries = reader.n_entries();
        log::info!("{name}: {n_entries} events");

        let mut bank = self.empty_bank();
        let mut summary = ShardSummary {
            name: name.to_string(),
            sample_id: norm.as_ref().map(|n| n.sample_id.clone()),
            events: 0,
            passed_trigger: 0,
            sum_weights: 0.0,
            selections: cfg
                .selections
                .iter()
                .map(|s| SelectionCount { selection: s.name.clone(), events: 0, sum_weights: 0.0 })
                .collect(),
        };

        for row in 0..n_entries {
            if row > 0 && row % PROGRESS_EVERY == 0 {
                log::info!("{name}: {row}/{n_entries} events");
            }
            let event = reader.event(row);
            let weight = event_weight(event.weights.as_ref(), norm.as_ref());
            summary.events += 1;
            summary.sum_weights += weight;

            let class = self.classifier.classify(&event);
            if !class.passed_trigger {
                continue;
            }
            summary.passed_trigger += 1;
            log::debug!(
                "{name} event {row}: {} e, {} mu, {} jets, {} b-jets, weight {weight}, {} selections",
                event.electrons.len(),
                event.muons.len(),
                event.jets.len(),
                class.bjets.len(),
                class.matches.len()
            );

            for &index in &class.matches {
                bank.fill(index, &event, &class.bjets, weight);
                let count = &mut summary.selections[index];
                count.events += 1;
                count.sum_weights += weight;
            }
        }

        log::info!(
            "{name}: {} events read, {} passed trigger, sum of weights {}",
            summary.events,
            summary.passed_trigger,
            summary.sum_weights
        );
        Ok((bank, summary))
    }

    /// Process in-memory shards in parallel and merge the results.
    pub fn run_shards(&self, shards: &[Shard]) -> Result<RunOutcome> {
        let results: Vec<_> = shards
            .par_iter()
            .map(|shard| (shard.base_name().to_string(), self.process(shard)))
            .collect();
        self.fold(results)
    }

    /// Load and process shard files in parallel and merge the results.
    ///
    /// An unreadable or malformed file fails only its own shard.
    pub fn run_files(&self, paths: &[PathBuf]) -> Result<RunOutcome> {
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| {
                let result = Shard::load(path).and_then(|shard| self.process(&shard));
                (path.display().to_string(), result)
            })
            .collect();
        self.fold(results)
    }

    fn fold(
        &self,
        results: Vec<(String, Result<(HistogramBank, ShardSummary)>)>,
    ) -> Result<RunOutcome> {
        let mut bank = self.empty_bank();
        let mut summaries = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok((shard_bank, summary)) => {
                    bank = merge(bank, shard_bank)?;
                    summaries.push(summary);
                }
                Err(error) => {
                    log::error!("{name}: {error}; shard discarded");
                    failures.push(ShardFailure { name, error });
                }
            }
        }
        log::info!("merged {} shards ({} failed)", summaries.len(), failures.len());
        Ok(RunOutcome { bank, summaries, failures })
    }
}
