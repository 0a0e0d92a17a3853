//! Cross-section normalization of simulated samples.
//!
//! A simulated file is scaled by `cross_section × filter_efficiency /
//! total_generated`, where the sample id comes from the file name and the
//! total from the file's summary record. Real-data files are not scaled.

use std::collections::HashMap;
use std::path::Path;

use tth_core::{Error, EventWeights, Result};

use crate::config::NormSource;

/// One row of the cross-section table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XsEntry {
    /// Cross-section (pb).
    pub cross_section: f64,
    /// Generator filter efficiency.
    pub filter_efficiency: f64,
}

impl XsEntry {
    /// `cross_section × filter_efficiency`.
    pub fn weight(&self) -> f64 {
        self.cross_section * self.filter_efficiency
    }
}

/// Sample id → cross-section lookup table.
///
/// Text format: one `<sample_id> <cross_section> <filter_efficiency>` row per
/// line, whitespace-delimited, `#` comments. Ids are compared with leading
/// zeros removed.
#[derive(Debug, Clone, Default)]
pub struct XsTable {
    entries: HashMap<String, XsEntry>,
}

impl XsTable {
    /// Read a table from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("{}: {e}", path.display())))?;
        let table = Self::parse_str(&text);
        log::info!("loaded {} cross-section entries from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse table text. Malformed rows are skipped with a warning.
    pub fn parse_str(text: &str) -> Self {
        let mut entries = HashMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let parsed = match fields.as_slice() {
                [id, xs, eff, ..] => xs.parse::<f64>().ok().zip(eff.parse::<f64>().ok()).map(
                    |(cross_section, filter_efficiency)| {
                        (normalize_id(id), XsEntry { cross_section, filter_efficiency })
                    },
                ),
                _ => None,
            };
            match parsed {
                Some((id, entry)) => {
                    if entries.insert(id.clone(), entry).is_some() {
                        log::warn!("cross-section table line {}: duplicate id '{id}'", idx + 1);
                    }
                }
                None => log::warn!("cross-section table line {}: skipping '{line}'", idx + 1),
            }
        }
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `sample_id`.
    pub fn get(&self, sample_id: &str) -> Option<&XsEntry> {
        self.entries.get(&normalize_id(sample_id))
    }

    /// `cross_section × filter_efficiency` for `sample_id`; absence is fatal.
    pub fn lookup(&self, sample_id: &str) -> Result<f64> {
        self.get(sample_id)
            .map(XsEntry::weight)
            .ok_or_else(|| Error::NormalizationLookup { sample_id: sample_id.to_string() })
    }
}

fn normalize_id(id: &str) -> String {
    let trimmed = id.trim_start_matches('0');
    if trimmed.is_empty() && !id.is_empty() { "0".into() } else { trimmed.into() }
}

/// Whether a file holds real data or simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleKind {
    /// Recorded collision data; event weight 1.
    Data,
    /// Simulated sample with the given id.
    Mc {
        /// Sample (dataset) id.
        sample_id: String,
    },
}

/// Strip any directory components from `file_name`.
pub fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

/// Sample id: fourth dot-delimited field of the base name, leading zeros removed.
///
/// `user.jdandoy.mc15_13TeV.00410000.ttbar.root` → `410000`. Returns `None`
/// when the name has fewer than four fields or the field is empty or all zeros.
pub fn sample_id_from_file_name(file_name: &str) -> Option<String> {
    let field = base_name(file_name).split('.').nth(3)?;
    let id = field.trim_start_matches('0');
    (!id.is_empty()).then(|| id.to_string())
}

/// Classify a file by name: `pattern` followed by a digit (e.g. `data15`) marks data.
///
/// Simulation without an extractable sample id is treated as data.
pub fn classify_file(file_name: &str, data_pattern: &str) -> SampleKind {
    let base = base_name(file_name);
    let is_data = !data_pattern.is_empty()
        && base.match_indices(data_pattern).any(|(i, m)| {
            base[i + m.len()..].chars().next().is_some_and(|c| c.is_ascii_digit())
        });
    if is_data {
        return SampleKind::Data;
    }
    match sample_id_from_file_name(base) {
        Some(sample_id) => SampleKind::Mc { sample_id },
        None => {
            log::warn!(
                "'{base}' does not follow the <a>.<b>.<c>.<sample_id>.* naming convention; \
                 treating it as data (no normalization)"
            );
            SampleKind::Data
        }
    }
}

/// Per-file summary of the generated sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSummary {
    /// Per-lumi-block `totalEventsWeighted`.
    pub sum_weights: Option<Vec<f64>>,
    /// Weighted cutflow bin contents.
    pub cutflow: Option<Vec<f64>>,
}

impl FileSummary {
    /// Total generated (weighted) events according to `source`.
    ///
    /// An unset total (missing record or cutflow bin) is reported as `NaN`;
    /// unset, zero, negative and non-finite totals are all [`Error::DivisionHazard`].
    pub fn total_generated(&self, source: NormSource, cutflow_bin: usize, shard: &str) -> Result<f64> {
        let total: f64 = match source {
            NormSource::SumWeights => {
                self.sum_weights.as_ref().map_or(f64::NAN, |w| w.iter().sum())
            }
            NormSource::Cutflow => {
                self.cutflow.as_ref().and_then(|c| c.get(cutflow_bin)).copied().unwrap_or(f64::NAN)
            }
        };
        if !total.is_finite() || total <= 0.0 {
            return Err(Error::DivisionHazard { sample: shard.to_string(), total });
        }
        Ok(total)
    }
}

/// Resolved per-file normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    /// Sample id.
    pub sample_id: String,
    /// `cross_section × filter_efficiency`.
    pub xs_weight: f64,
    /// Total generated (weighted) events.
    pub total_generated: f64,
}

impl Normalization {
    /// Resolve normalization for a simulated file.
    pub fn resolve(
        sample_id: &str,
        table: &XsTable,
        summary: &FileSummary,
        source: NormSource,
        cutflow_bin: usize,
        shard: &str,
    ) -> Result<Self> {
        let xs_weight = table.lookup(sample_id)?;
        let total_generated = summary.total_generated(source, cutflow_bin, shard)?;
        log::info!(
            "{shard}: sample {sample_id}, xs*eff = {xs_weight}, total generated = {total_generated}"
        );
        Ok(Self { sample_id: sample_id.to_string(), xs_weight, total_generated })
    }

    /// Per-file factor `xs_weight / total_generated`.
    pub fn scale(&self) -> f64 {
        self.xs_weight / self.total_generated
    }
}

/// Combined event weight; 1 for data.
///
/// Computed once per event and shared by every selection and histogram fill.
pub fn event_weight(weights: Option<&EventWeights>, norm: Option<&Normalization>) -> f64 {
    match (weights, norm) {
        (Some(w), Some(n)) => w.product() * n.xs_weight / n.total_generated,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TABLE: &str = "\
# id      xs[pb]       filter-eff
410000    696.11       0.543
341270    0.2611       1.0   # ttH
00410501  7.3e+02      0.5
broken    line
345000    abc          1.0
";

    #[test]
    fn table_lookup() {
        let t = XsTable::parse_str(TABLE);
        assert_eq!(t.len(), 3);
        assert_relative_eq!(t.lookup("410000").unwrap(), 696.11 * 0.543);
        assert_relative_eq!(t.lookup("0341270").unwrap(), 0.2611);
        assert_relative_eq!(t.lookup("410501").unwrap(), 365.0);
        assert!(t.get("41000").is_none());
    }

    #[test]
    fn missing_id_is_fatal() {
        let t = XsTable::parse_str(TABLE);
        match t.lookup("999999") {
            Err(Error::NormalizationLookup { sample_id }) => assert_eq!(sample_id, "999999"),
            other => panic!("expected lookup failure, got {other:?}"),
        }
    }

    #[test]
    fn sample_id_extraction() {
        assert_eq!(
            sample_id_from_file_name("/eos/user.jdandoy.mc15_13TeV.00410000.ttbar.root").as_deref(),
            Some("410000")
        );
        assert_eq!(sample_id_from_file_name("a.b.c.341270").as_deref(), Some("341270"));
        assert_eq!(sample_id_from_file_name("ttbar.root"), None);
        assert_eq!(sample_id_from_file_name("a.b.c.000.root"), None);
    }

    #[test]
    fn file_classification() {
        assert_eq!(classify_file("user.x.data15_13TeV.00276262.root", "data"), SampleKind::Data);
        assert_eq!(
            classify_file("user.x.mc15_13TeV.410000.root", "data"),
            SampleKind::Mc { sample_id: "410000".into() }
        );
        // "data" not followed by a digit is not a data marker.
        assert_eq!(
            classify_file("user.x.metadata.410000.root", "data"),
            SampleKind::Mc { sample_id: "410000".into() }
        );
        assert_eq!(classify_file("odd_name.root", "data"), SampleKind::Data);
    }

    #[test]
    fn total_from_either_summary() {
        let s = FileSummary { sum_weights: Some(vec![400.0, 600.0]), cutflow: Some(vec![5.0, 3.0]) };
        assert_eq!(s.total_generated(NormSource::SumWeights, 0, "f").unwrap(), 1000.0);
        assert_eq!(s.total_generated(NormSource::Cutflow, 1, "f").unwrap(), 3.0);
    }

    #[test]
    fn unset_total_is_division_hazard() {
        let s = FileSummary { sum_weights: None, cutflow: Some(vec![5.0, 3.0]) };
        match s.total_generated(NormSource::Cutflow, 7, "f") {
            Err(Error::DivisionHazard { sample, total }) => {
                assert_eq!(sample, "f");
                assert!(total.is_nan());
            }
            other => panic!("expected division hazard, got {other:?}"),
        }
        assert!(matches!(
            s.total_generated(NormSource::SumWeights, 0, "f"),
            Err(Error::DivisionHazard { .. })
        ));
        assert!(matches!(
            FileSummary::default().total_generated(NormSource::Cutflow, 0, "f"),
            Err(Error::DivisionHazard { .. })
        ));

        let table = XsTable::parse_str("410000 2.0 0.5\n");
        let shard = "user.x.mc15.00410000.root";
        assert!(matches!(
            Normalization::resolve(
                "410000",
                &table,
                &FileSummary::default(),
                NormSource::SumWeights,
                0,
                shard
            ),
            Err(Error::DivisionHazard { .. })
        ));
    }

    #[test]
    fn zero_total_is_division_hazard() {
        let s = FileSummary { sum_weights: Some(vec![]), cutflow: Some(vec![0.0]) };
        assert!(matches!(
            s.total_generated(NormSource::SumWeights, 0, "f"),
            Err(Error::DivisionHazard { .. })
        ));
        assert!(matches!(
            s.total_generated(NormSource::Cutflow, 0, "f"),
            Err(Error::DivisionHazard { .. })
        ));
    }

    #[test]
    fn weight_composition() {
        let w = EventWeights { generator: 2.0, pileup: 1.5, lepton_sf: 1.1, btag_sf: 0.9 };
        let n = Normalization { sample_id: "1".into(), xs_weight: 100.0, total_generated: 1000.0 };
        assert_relative_eq!(event_weight(Some(&w), Some(&n)), 0.297, epsilon = 1e-12);
        assert_eq!(event_weight(None, None), 1.0);
        assert_relative_eq!(n.scale(), 0.1);
    }
}
