//! Weighted 1-D histogram with edge-bin folding.

use serde::{Deserialize, Serialize};
use tth_core::{Error, Result};

use crate::binning::Binning;

/// A weighted 1-D histogram.
///
/// Values below the first edge are folded into the first bin and values at or
/// above the last edge into the last bin; the folded weight is additionally
/// recorded in `underflow`/`overflow`. `NaN` values are never filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Histogram title.
    pub title: String,
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge of first bin.
    pub x_min: f64,
    /// Upper edge of last bin.
    pub x_max: f64,
    /// Bin edges (length = n_bins + 1).
    pub bin_edges: Vec<f64>,
    /// Bin contents (sum of weights per bin).
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per bin.
    pub sumw2: Vec<f64>,
    /// Weight folded in from below the range.
    pub underflow: f64,
    /// Weight folded in from above the range.
    pub overflow: f64,
    /// Number of fills.
    pub entries: u64,
    /// Number of rejected `NaN` fills.
    #[serde(default)]
    pub nan_entries: u64,
}

impl Histogram {
    /// Book an empty histogram.
    pub fn new(name: impl Into<String>, title: impl Into<String>, binning: Binning) -> Self {
        let n_bins = binning.n_bins;
        Self {
            name: name.into(),
            title: title.into(),
            n_bins,
            x_min: binning.x_min,
            x_max: binning.x_max,
            bin_edges: binning.edges(),
            bin_content: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            nan_entries: 0,
        }
    }

    /// Add `weight` at `val`.
    pub fn fill(&mut self, val: f64, weight: f64) {
        if val.is_nan() {
            self.nan_entries += 1;
            return;
        }
        let last = self.n_bins - 1;
        let bin = if val < self.bin_edges[0] {
            self.underflow += weight;
            0
        } else if val >= self.bin_edges[self.n_bins] {
            self.overflow += weight;
            last
        } else {
            self.bin_index(val)
        };
        self.bin_content[bin] += weight;
        self.sumw2[bin] += weight * weight;
        self.entries += 1;
    }

    /// Bin of an in-range `val` (`bin_edges[0] <= val < bin_edges[n_bins]`).
    fn bin_index(&self, val: f64) -> usize {
        let width = (self.x_max - self.x_min) / self.n_bins as f64;
        let mut i = (((val - self.x_min) / width) as usize).min(self.n_bins - 1);
        // The division may round across an edge; the stored edges decide.
        if val < self.bin_edges[i] {
            i -= 1;
        } else if val >= self.bin_edges[i + 1] {
            i += 1;
        }
        i
    }

    /// Sum of all bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Whether `other` has the same name and binning.
    pub fn is_compatible(&self, other: &Histogram) -> bool {
        self.name == other.name && self.n_bins == other.n_bins && self.bin_edges == other.bin_edges
    }

    /// Bin-wise addition of `other` into `self`.
    pub fn merge(&mut self, other: &Histogram) -> Result<()> {
        if !self.is_compatible(other) {
            return Err(Error::Validation(format!(
                "cannot merge histogram '{}' ({} bins) with '{}' ({} bins)",
                self.name, self.n_bins, other.name, other.n_bins
            )));
        }
        for (a, b) in self.bin_content.iter_mut().zip(&other.bin_content) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        self.nan_entries += other.nan_entries;
        Ok(())
    }
}
