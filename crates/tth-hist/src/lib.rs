//! # tth-hist
//!
//! Weighted fixed-binning histograms for the ttH histogrammer.
//!
//! A [`HistogramBank`] holds one group of histograms per selection. Banks are
//! filled event by event, merged bin-wise across independently processed
//! shards, and persisted as a [`HistogramStore`].
//!
//! ## Example
//!
//! ```
//! use tth_core::{EventRecord, Selection};
//! use tth_hist::{HistogramBank, SlotCaps};
//!
//! let catalog = vec![Selection::new("inclusive")];
//! let mut bank = HistogramBank::book(&catalog, SlotCaps::default());
//! bank.fill(0, &EventRecord::empty(), &[], 1.0);
//! assert_eq!(bank.groups()[0].jets.n.bin_content[0], 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bank;
pub mod binning;
pub mod fill;
pub mod histogram;
pub mod store;

pub use bank::{
    CollectionHists, DEFAULT_DISCRIMINANT, HistogramBank, KinematicHists, SelectionHists, SlotCaps,
    merge,
};
pub use binning::Binning;
pub use histogram::Histogram;
pub use store::{HistogramGroup, HistogramStore};
