//! Fixed binnings used when booking histograms.

use serde::{Deserialize, Serialize};

/// Uniform binning: `n_bins` bins on `[x_min, x_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub x_min: f64,
    /// Upper edge of the last bin.
    pub x_max: f64,
}

impl Binning {
    /// Transverse momentum / energy in GeV.
    pub const MOMENTUM: Binning = Binning::new(50, 0.0, 300.0);
    /// Pseudorapidity.
    pub const ETA: Binning = Binning::new(50, -4.0, 4.0);
    /// Azimuthal angle.
    pub const PHI: Binning = Binning::new(50, -3.14, 3.14);
    /// b-tagging discriminant.
    pub const DISCRIMINANT: Binning = Binning::new(50, -1.0, 1.0);
    /// Object multiplicity.
    pub const MULTIPLICITY: Binning = Binning::new(20, 0.0, 20.0);

    /// Create a uniform binning.
    pub const fn new(n_bins: usize, x_min: f64, x_max: f64) -> Self {
        Self { n_bins, x_min, x_max }
    }

    /// Bin edges (length `n_bins + 1`).
    pub fn edges(&self) -> Vec<f64> {
        let width = (self.x_max - self.x_min) / self.n_bins as f64;
        let mut edges: Vec<f64> =
            (0..=self.n_bins).map(|i| self.x_min + width * i as f64).collect();
        // Pin the last edge so accumulated rounding never shrinks the range.
        if let Some(last) = edges.last_mut() {
            *last = self.x_max;
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_edges() {
        let e = Binning::new(4, 0.0, 2.0).edges();
        assert_eq!(e.len(), 5);
        assert_relative_eq!(e[1], 0.5);
        assert_eq!(e[4], 2.0);

        let phi = Binning::PHI.edges();
        assert_eq!(phi[0], -3.14);
        assert_eq!(phi[50], 3.14);
    }
}
