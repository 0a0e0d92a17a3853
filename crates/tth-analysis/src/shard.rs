//! Columnar input shards and per-event record assembly.
//!
//! A shard is the content of one input file: scalar columns (one value per
//! event), jagged columns (a variable-length list per event, stored as flat
//! values plus entry offsets), boolean trigger columns, and the file's summary
//! record. [`EventReader::bind`] resolves every column the analysis needs up
//! front so a missing column fails before the first event is processed.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tth_core::{Error, EventRecord, EventWeights, Jet, Lepton, MissingEt, Result};

use crate::normalize::{FileSummary, base_name};

/// Variable-length column: `offsets.len() == n_entries + 1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JaggedColumn {
    /// Flat array of all values across all entries.
    pub flat: Vec<f64>,
    /// Entry boundaries.
    pub offsets: Vec<usize>,
}

impl JaggedColumn {
    /// Build from per-entry lists.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        let mut flat = Vec::new();
        for r in rows {
            flat.extend_from_slice(r);
            offsets.push(flat.len());
        }
        Self { flat, offsets }
    }

    /// Number of entries.
    pub fn n_entries(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Flat index range of entry `row`.
    #[inline]
    fn range(&self, row: usize) -> Range<usize> {
        self.offsets[row]..self.offsets[row + 1]
    }

    fn validate(&self, name: &str) -> Result<()> {
        let ok = self.offsets.first() == Some(&0)
            && self.offsets.windows(2).all(|w| w[0] <= w[1])
            && self.offsets.last() == Some(&self.flat.len());
        if ok {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "jagged column '{name}': offsets inconsistent with {} values",
                self.flat.len()
            )))
        }
    }
}

/// One input file's columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    /// Input file name; drives data/MC detection and sample-id extraction.
    #[serde(default)]
    pub name: String,
    /// Per-lumi-block `totalEventsWeighted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum_weights: Option<Vec<f64>>,
    /// Weighted cutflow bin contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutflow: Option<Vec<f64>>,
    /// One value per event.
    #[serde(default)]
    pub scalars: HashMap<String, Vec<f64>>,
    /// Variable-length lists per event.
    #[serde(default)]
    pub jagged: HashMap<String, JaggedColumn>,
    /// Boolean decisions per event (triggers).
    #[serde(default)]
    pub flags: HashMap<String, Vec<bool>>,
}

impl Shard {
    /// Read a shard from a JSON file. An empty `name` defaults to the file name.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut shard: Shard = serde_json::from_str(&text)?;
        if shard.name.is_empty() {
            shard.name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        }
        Ok(shard)
    }

    /// Base name of the input file.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    /// Summary record of the generated sample.
    pub fn summary(&self) -> FileSummary {
        FileSummary { sum_weights: self.sum_weights.clone(), cutflow: self.cutflow.clone() }
    }

    fn missing(&self, field: &str) -> Error {
        Error::MissingField { field: field.to_string(), shard: self.name.clone() }
    }

    fn scalar(&self, name: &str) -> Result<&[f64]> {
        self.scalars.get(name).map(Vec::as_slice).ok_or_else(|| self.missing(name))
    }

    fn jagged(&self, name: &str) -> Result<&JaggedColumn> {
        let col = self.jagged.get(name).ok_or_else(|| self.missing(name))?;
        col.validate(name)?;
        Ok(col)
    }

    fn flag(&self, name: &str) -> Result<(&str, &[bool])> {
        self.flags
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .ok_or_else(|| self.missing(name))
    }
}

/// Which optional column groups the analysis needs.
#[derive(Debug, Clone)]
pub struct ColumnRequest<'a> {
    /// Read MC weight columns.
    pub is_mc: bool,
    /// Trigger columns to read.
    pub triggers: &'a [String],
    /// Jagged column holding the b-tag discriminant.
    pub btag_branch: &'a str,
    /// Read the `run_year` column.
    pub needs_era: bool,
}

struct LeptonCols<'a> {
    pt: &'a JaggedColumn,
    eta: &'a JaggedColumn,
    phi: &'a JaggedColumn,
    e: &'a JaggedColumn,
    charge: &'a JaggedColumn,
    topoetcone20: &'a JaggedColumn,
    ptvarcone: &'a JaggedColumn,
}

impl<'a> LeptonCols<'a> {
    fn bind(shard: &'a Shard, prefix: &str, ptvarcone: &str) -> Result<Self> {
        let col = move |var: &str| shard.jagged(&format!("{prefix}_{var}"));
        let cols = Self {
            pt: col("pt")?,
            eta: col("eta")?,
            phi: col("phi")?,
            e: col("e")?,
            charge: col("charge")?,
            topoetcone20: col("topoetcone20")?,
            ptvarcone: col(ptvarcone)?,
        };
        let others = [cols.eta, cols.phi, cols.e, cols.charge, cols.topoetcone20, cols.ptvarcone];
        check_same_shape(&format!("{prefix}_pt"), cols.pt, &others)?;
        Ok(cols)
    }

    fn read(&self, row: usize) -> Vec<Lepton> {
        self.pt
            .range(row)
            .map(|k| Lepton {
                pt: self.pt.flat[k],
                eta: self.eta.flat[k],
                phi: self.phi.flat[k],
                e: self.e.flat[k],
                charge: self.charge.flat[k],
                topoetcone20: self.topoetcone20.flat[k],
                ptvarcone: self.ptvarcone.flat[k],
            })
            .collect()
    }
}

struct JetCols<'a> {
    pt: &'a JaggedColumn,
    eta: &'a JaggedColumn,
    phi: &'a JaggedColumn,
    e: &'a JaggedColumn,
    btag: &'a JaggedColumn,
    jvt: &'a JaggedColumn,
}

impl<'a> JetCols<'a> {
    fn bind(shard: &'a Shard, btag_branch: &str) -> Result<Self> {
        let cols = Self {
            pt: shard.jagged("jet_pt")?,
            eta: shard.jagged("jet_eta")?,
            phi: shard.jagged("jet_phi")?,
            e: shard.jagged("jet_e")?,
            btag: shard.jagged(btag_branch)?,
            jvt: shard.jagged("jet_jvt")?,
        };
        check_same_shape("jet_pt", cols.pt, &[cols.eta, cols.phi, cols.e, cols.btag, cols.jvt])?;
        Ok(cols)
    }

    fn read(&self, row: usize) -> Vec<Jet> {
        self.pt
            .range(row)
            .map(|k| Jet {
                pt: self.pt.flat[k],
                eta: self.eta.flat[k],
                phi: self.phi.flat[k],
                e: self.e.flat[k],
                btag_score: self.btag.flat[k],
                jvt: self.jvt.flat[k],
            })
            .collect()
    }
}

fn check_same_shape(name: &str, reference: &JaggedColumn, others: &[&JaggedColumn]) -> Result<()> {
    if others.iter().all(|c| c.offsets == reference.offsets) {
        Ok(())
    } else {
        Err(Error::Validation(format!("columns of the '{name}' collection differ in multiplicity")))
    }
}

/// Columns of one shard bound for event-by-event reading.
pub struct EventReader<'a> {
    electrons: LeptonCols<'a>,
    muons: LeptonCols<'a>,
    jets: JetCols<'a>,
    met: [&'a [f64]; 2],
    weights: Option<[&'a [f64]; 4]>,
    run_year: Option<&'a [f64]>,
    triggers: Vec<(&'a str, &'a [bool])>,
    sample_id: Option<Arc<str>>,
    n_entries: usize,
}

impl<'a> EventReader<'a> {
    /// Resolve every requested column of `shard`.
    pub fn bind(shard: &'a Shard, req: &ColumnRequest<'_>, sample_id: Option<&str>) -> Result<Self> {
        let electrons = LeptonCols::bind(shard, "el", "ptvarcone20")?;
        let muons = LeptonCols::bind(shard, "mu", "ptvarcone30")?;
        let jets = JetCols::bind(shard, req.btag_branch)?;
        let met = [shard.scalar("met_met")?, shard.scalar("met_phi")?];
        let weights = if req.is_mc {
            Some([
                shard.scalar("weight_mc")?,
                shard.scalar("weight_pileup")?,
                shard.scalar("weight_leptonSF")?,
                shard.scalar("weight_bTagSF")?,
            ])
        } else {
            None
        };
        let run_year = if req.needs_era { Some(shard.scalar("run_year")?) } else { None };
        let triggers =
            req.triggers.iter().map(|t| shard.flag(t)).collect::<Result<Vec<_>>>()?;

        let n_entries = jets.pt.n_entries();
        let mut lengths: Vec<(&str, usize)> = vec![
            ("el_pt", electrons.pt.n_entries()),
            ("mu_pt", muons.pt.n_entries()),
            ("met_met", met[0].len()),
            ("met_phi", met[1].len()),
        ];
        if let Some(w) = &weights {
            lengths.extend(
                ["weight_mc", "weight_pileup", "weight_leptonSF", "weight_bTagSF"]
                    .into_iter()
                    .zip(w.iter().map(|c| c.len())),
            );
        }
        if let Some(y) = run_year {
            lengths.push(("run_year", y.len()));
        }
        lengths.extend(triggers.iter().map(|(n, c)| (*n, c.len())));
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n_entries) {
            return Err(Error::Validation(format!(
                "shard '{}': column '{name}' has {len} entries, expected {n_entries}",
                shard.name
            )));
        }
        if let Some(y) = run_year.and_then(|ys| ys.iter().find(|y| to_year(**y).is_none())) {
            return Err(Error::Validation(format!("shard '{}': invalid run_year {y}", shard.name)));
        }

        Ok(Self {
            electrons,
            muons,
            jets,
            met,
            weights,
            run_year,
            triggers,
            sample_id: sample_id.map(Arc::from),
            n_entries,
        })
    }

    /// Number of events.
    pub fn n_entries(&self) -> usize {
        self.n_entries
    }

    /// Assemble the record of event `row` (`row < n_entries()`).
    pub fn event(&self, row: usize) -> EventRecord {
        EventRecord {
            electrons: self.electrons.read(row),
            muons: self.muons.read(row),
            jets: self.jets.read(row),
            met: MissingEt { met: self.met[0][row], phi: self.met[1][row] },
            triggers: self.triggers.iter().map(|(n, c)| (n.to_string(), c[row])).collect(),
            weights: self.weights.map(|[mc, pu, lep, btag]| EventWeights {
                generator: mc[row],
                pileup: pu[row],
                lepton_sf: lep[row],
                btag_sf: btag[row],
            }),
            run_year: self.run_year.and_then(|y| to_year(y[row])),
            sample_id: self.sample_id.clone(),
        }
    }
}

fn to_year(v: f64) -> Option<u16> {
    (v.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&v)).then_some(v as u16)
}
