//! b-jet identification against a discriminant working point.

use crate::event::Jet;

/// Default working point of the MV2c20 tagger (77% efficiency).
pub const DEFAULT_BTAG_WP: f64 = -0.4434;

/// Tags jets whose discriminant score is strictly above the working point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BTagClassifier {
    /// Working-point threshold.
    pub working_point: f64,
}

impl Default for BTagClassifier {
    fn default() -> Self {
        Self { working_point: DEFAULT_BTAG_WP }
    }
}

impl BTagClassifier {
    /// Create a classifier with the given threshold.
    pub fn new(working_point: f64) -> Self {
        Self { working_point }
    }

    /// Whether a single score passes (`score > working_point`).
    #[inline]
    pub fn is_btagged(&self, score: f64) -> bool {
        score > self.working_point
    }

    /// Indices of b-tagged jets, in jet order.
    pub fn tag(&self, jets: &[Jet]) -> Vec<usize> {
        jets.iter()
            .enumerate()
            .filter(|(_, j)| self.is_btagged(j.btag_score))
            .map(|(i, _)| i)
            .collect()
    }
}
