//! Persisted form of a histogram bank: one named group per selection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tth_core::{Error, Result};

use crate::bank::HistogramBank;
use crate::histogram::Histogram;

/// Histograms of one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramGroup {
    /// Selection name.
    pub name: String,
    /// Selection display name.
    pub display_name: String,
    /// Histograms in booking order.
    pub histograms: Vec<Histogram>,
}

/// A complete set of output histograms.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistogramStore {
    /// One group per selection.
    pub groups: Vec<HistogramGroup>,
}

impl From<&HistogramBank> for HistogramStore {
    fn from(bank: &HistogramBank) -> Self {
        let groups = bank
            .groups()
            .iter()
            .map(|g| HistogramGroup {
                name: g.selection.clone(),
                display_name: g.display_name.clone(),
                histograms: g.histograms().cloned().collect(),
            })
            .collect();
        Self { groups }
    }
}

impl HistogramStore {
    /// Group called `name`.
    pub fn group(&self, name: &str) -> Option<&HistogramGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Histogram `hist` of group `group`.
    pub fn get(&self, group: &str, hist: &str) -> Option<&Histogram> {
        self.group(group)?.histograms.iter().find(|h| h.name == hist)
    }

    /// Bin-wise addition of `other`; groups and histograms are matched by name.
    pub fn merge(&mut self, other: &HistogramStore) -> Result<()> {
        if self.groups.len() != other.groups.len() {
            return Err(Error::Validation(format!(
                "cannot merge stores with {} and {} groups",
                self.groups.len(),
                other.groups.len()
            )));
        }
        for mine in &mut self.groups {
            let theirs = other.group(&mine.name).ok_or_else(|| {
                Error::Validation(format!("group '{}' missing from merged store", mine.name))
            })?;
            if mine.histograms.len() != theirs.histograms.len() {
                return Err(Error::Validation(format!(
                    "group '{}': histogram count mismatch ({} vs {})",
                    mine.name,
                    mine.histograms.len(),
                    theirs.histograms.len()
                )));
            }
            for h in &mut mine.histograms {
                let t = theirs.histograms.iter().find(|t| t.name == h.name).ok_or_else(|| {
                    Error::Validation(format!(
                        "histogram '{}/{}' missing from merged store",
                        mine.name, h.name
                    ))
                })?;
                h.merge(t)?;
            }
        }
        Ok(())
    }

    /// Read a store from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the store as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("wrote {} histogram groups to {}", self.groups.len(), path.display());
        Ok(())
    }
}
