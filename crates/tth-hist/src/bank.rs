//! Per-selection histogram banks.
//!
//! Each selection owns one [`SelectionHists`] group. Per-object categories
//! carry an "all objects" set, a fixed number of per-slot sets (the leading
//! N objects), a multiplicity histogram and, for jet categories, an HT
//! histogram.

use serde::{Deserialize, Serialize};
use tth_core::{Error, Result, Selection};

use crate::binning::Binning;
use crate::histogram::Histogram;

/// Per-category number of leading objects that get their own histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCaps {
    /// Leading electrons.
    pub electrons: usize,
    /// Leading muons.
    pub muons: usize,
    /// Leading jets; also used for b-jets.
    pub jets: usize,
}

/// Name of the discriminant histograms when the tagger is not specified.
pub const DEFAULT_DISCRIMINANT: &str = "mv2c20";

impl Default for SlotCaps {
    fn default() -> Self {
        Self { electrons: 0, muons: 0, jets: 6 }
    }
}

/// Kinematic histograms for one object (or all objects) of a category.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicHists {
    /// Transverse momentum (GeV).
    pub pt: Histogram,
    /// Pseudorapidity.
    pub eta: Histogram,
    /// Azimuthal angle.
    pub phi: Histogram,
    /// Energy (GeV).
    pub e: Histogram,
    /// b-tagging discriminant; jet categories only.
    pub btag: Option<Histogram>,
}

impl KinematicHists {
    fn book(prefix: &str, suffix: &str, label: &str, discriminant: Option<&str>) -> Self {
        let name = |var: &str| format!("h_{prefix}_{var}_{suffix}");
        Self {
            pt: Histogram::new(name("pt"), format!("P_{{T}} of {label} (GeV)"), Binning::MOMENTUM),
            eta: Histogram::new(name("eta"), format!("#Eta of {label}"), Binning::ETA),
            phi: Histogram::new(name("phi"), format!("#Phi of {label}"), Binning::PHI),
            e: Histogram::new(name("e"), format!("Energy of {label} (GeV)"), Binning::MOMENTUM),
            btag: discriminant.map(|d| {
                Histogram::new(name(d), format!("{d} of {label}"), Binning::DISCRIMINANT)
            }),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Histogram> {
        [&self.pt, &self.eta, &self.phi, &self.e].into_iter().chain(self.btag.as_ref())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Histogram> {
        [&mut self.pt, &mut self.eta, &mut self.phi, &mut self.e]
            .into_iter()
            .chain(self.btag.as_mut())
    }
}

/// Histograms for one object category (electrons, muons, jets or b-jets).
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHists {
    /// One fill per object.
    pub all: KinematicHists,
    /// One set per leading-object slot.
    pub slots: Vec<KinematicHists>,
    /// Object multiplicity, one fill per event.
    pub n: Histogram,
    /// Scalar pT sum, one fill per event; jet categories only.
    pub ht: Option<Histogram>,
}

impl CollectionHists {
    fn book(
        prefix: &str,
        label: &str,
        plural: &str,
        n_slots: usize,
        discriminant: Option<&str>,
    ) -> Self {
        let is_jet = discriminant.is_some();
        Self {
            all: KinematicHists::book(prefix, "all", &format!("All {plural}"), discriminant),
            slots: (0..n_slots)
                .map(|i| {
                    KinematicHists::book(prefix, &i.to_string(), &format!("{label} {i}"), discriminant)
                })
                .collect(),
            n: Histogram::new(
                format!("h_{prefix}_n"),
                format!("Number of {plural}"),
                Binning::MULTIPLICITY,
            ),
            ht: is_jet.then(|| {
                Histogram::new(
                    format!("h_{prefix}_ht"),
                    format!("H_{{T}} of All {plural} (GeV)"),
                    Binning::MOMENTUM,
                )
            }),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Histogram> {
        self.all
            .iter()
            .chain(self.slots.iter().flat_map(KinematicHists::iter))
            .chain(std::iter::once(&self.n))
            .chain(self.ht.as_ref())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Histogram> {
        self.all
            .iter_mut()
            .chain(self.slots.iter_mut().flat_map(KinematicHists::iter_mut))
            .chain(std::iter::once(&mut self.n))
            .chain(self.ht.as_mut())
    }
}

/// All histograms booked for one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionHists {
    /// Selection name; also the output group name.
    pub selection: String,
    /// Selection display name.
    pub display_name: String,
    /// Electron histograms.
    pub electrons: CollectionHists,
    /// Muon histograms.
    pub muons: CollectionHists,
    /// Jet histograms.
    pub jets: CollectionHists,
    /// b-jet histograms.
    pub bjets: CollectionHists,
    /// Missing transverse energy (GeV).
    pub met: Histogram,
    /// Jets + leptons + MET scalar sum (GeV).
    pub ht_all: Histogram,
}

impl SelectionHists {
    /// Book the full histogram set for `selection`.
    ///
    /// Jet discriminant histograms are named `h_<cat>_<discriminant>_<slot>`.
    pub fn book(selection: &Selection, caps: SlotCaps, discriminant: &str) -> Self {
        Self {
            selection: selection.name.clone(),
            display_name: selection.display_name.clone(),
            electrons: CollectionHists::book("el", "Electron", "Electrons", caps.electrons, None),
            muons: CollectionHists::book("mu", "Muon", "Muons", caps.muons, None),
            jets: CollectionHists::book("jet", "Jet", "Jets", caps.jets, Some(discriminant)),
            bjets: CollectionHists::book("bjet", "B-Jet", "B-Jets", caps.jets, Some(discriminant)),
            met: Histogram::new("h_met", "MET (GeV)", Binning::MOMENTUM),
            ht_all: Histogram::new(
                "h_ht_all",
                "H_{T} of All Jets + Lepton + MET (GeV)",
                Binning::MOMENTUM,
            ),
        }
    }

    /// Every histogram of the group, in booking order.
    pub fn histograms(&self) -> impl Iterator<Item = &Histogram> {
        self.electrons
            .iter()
            .chain(self.muons.iter())
            .chain(self.jets.iter())
            .chain(self.bjets.iter())
            .chain([&self.met, &self.ht_all])
    }

    /// Mutable access to every histogram, in booking order.
    pub fn histograms_mut(&mut self) -> impl Iterator<Item = &mut Histogram> {
        self.electrons
            .iter_mut()
            .chain(self.muons.iter_mut())
            .chain(self.jets.iter_mut())
            .chain(self.bjets.iter_mut())
            .chain([&mut self.met, &mut self.ht_all])
    }

    /// Look up a histogram by name.
    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms().find(|h| h.name == name)
    }

    /// Bin-wise addition of `other` into `self`.
    pub fn merge(&mut self, other: &SelectionHists) -> Result<()> {
        if self.selection != other.selection {
            return Err(Error::Validation(format!(
                "cannot merge selection '{}' with '{}'",
                self.selection, other.selection
            )));
        }
        let theirs: Vec<&Histogram> = other.histograms().collect();
        let mut n_mine = 0usize;
        for (mine, theirs) in self.histograms_mut().zip(&theirs) {
            mine.merge(theirs)?;
            n_mine += 1;
        }
        if n_mine != theirs.len() {
            return Err(Error::Validation(format!(
                "selection '{}': histogram count mismatch ({n_mine} vs {})",
                self.selection,
                theirs.len()
            )));
        }
        Ok(())
    }
}

/// One histogram group per selection, in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBank {
    groups: Vec<SelectionHists>,
    caps: SlotCaps,
}

impl HistogramBank {
    /// Book an empty bank for `catalog` with [`DEFAULT_DISCRIMINANT`] histograms.
    pub fn book(catalog: &[Selection], caps: SlotCaps) -> Self {
        Self::book_with_discriminant(catalog, caps, DEFAULT_DISCRIMINANT)
    }

    /// Book an empty bank whose jet discriminant histograms are named after `discriminant`.
    pub fn book_with_discriminant(catalog: &[Selection], caps: SlotCaps, discriminant: &str) -> Self {
        let groups = catalog.iter().map(|s| SelectionHists::book(s, caps, discriminant)).collect();
        Self { groups, caps }
    }

    /// Histogram groups, in catalog order.
    pub fn groups(&self) -> &[SelectionHists] {
        &self.groups
    }

    /// Slot caps the bank was booked with.
    pub fn caps(&self) -> SlotCaps {
        self.caps
    }

    /// Group of the selection called `name`.
    pub fn group(&self, name: &str) -> Option<&SelectionHists> {
        self.groups.iter().find(|g| g.selection == name)
    }

    /// Group at catalog position `index`.
    pub fn group_mut(&mut self, index: usize) -> Option<&mut SelectionHists> {
        self.groups.get_mut(index)
    }

    /// Bin-wise addition of `other` into `self`.
    pub fn merge_from(&mut self, other: &HistogramBank) -> Result<()> {
        if self.groups.len() != other.groups.len() {
            return Err(Error::Validation(format!(
                "cannot merge banks with {} and {} selections",
                self.groups.len(),
                other.groups.len()
            )));
        }
        for (mine, theirs) in self.groups.iter_mut().zip(&other.groups) {
            mine.merge(theirs)?;
        }
        Ok(())
    }
}

/// Merge two banks booked from the same catalog.
///
/// Addition is associative and commutative, so shards may be merged in any order.
pub fn merge(mut a: HistogramBank, b: HistogramBank) -> Result<HistogramBank> {
    a.merge_from(&b)?;
    Ok(a)
}
