//! # tth-core
//!
//! Core types for the ttH histogrammer: the per-event record, selection
//! rules over object multiplicities, b-jet tagging, and the shared error type.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod btag;
pub mod error;
pub mod event;
pub mod selection;

pub use btag::{BTagClassifier, DEFAULT_BTAG_WP};
pub use error::{Error, Result};
pub use event::{EventRecord, EventWeights, Jet, Lepton, MEV_PER_GEV, MissingEt};
pub use selection::{CountCut, Selection};
