//! Per-event snapshot of reconstructed objects.
//!
//! Momenta and energies are stored in MeV, as written by the upstream ntuple
//! production. Histogram filling converts to GeV with [`MEV_PER_GEV`].

use std::sync::Arc;

/// MeV → GeV conversion divisor applied to every momentum/energy before filling.
pub const MEV_PER_GEV: f64 = 1000.0;

/// A reconstructed electron or muon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lepton {
    /// Transverse momentum (MeV).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle.
    pub phi: f64,
    /// Energy (MeV).
    pub e: f64,
    /// Electric charge.
    pub charge: f64,
    /// Calorimeter isolation (`topoetcone20`).
    pub topoetcone20: f64,
    /// Track isolation (`ptvarcone20` for electrons, `ptvarcone30` for muons).
    pub ptvarcone: f64,
}

/// A reconstructed jet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jet {
    /// Transverse momentum (MeV).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle.
    pub phi: f64,
    /// Energy (MeV).
    pub e: f64,
    /// b-tagging discriminant score.
    pub btag_score: f64,
    /// Jet-vertex-tagger quality score.
    pub jvt: f64,
}

/// Missing transverse energy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MissingEt {
    /// Magnitude (MeV).
    pub met: f64,
    /// Azimuthal angle.
    pub phi: f64,
}

/// Per-event Monte-Carlo weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventWeights {
    /// Generator weight.
    pub generator: f64,
    /// Pileup reweighting factor.
    pub pileup: f64,
    /// Lepton scale factor.
    pub lepton_sf: f64,
    /// b-tagging scale factor.
    pub btag_sf: f64,
}

impl EventWeights {
    /// Product of all per-event weights.
    pub fn product(&self) -> f64 {
        self.generator * self.pileup * self.lepton_sf * self.btag_sf
    }
}

/// One recorded collision event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Electrons in input order.
    pub electrons: Vec<Lepton>,
    /// Muons in input order.
    pub muons: Vec<Lepton>,
    /// Jets in input order.
    pub jets: Vec<Jet>,
    /// Missing transverse energy.
    pub met: MissingEt,
    /// Named trigger decisions.
    pub triggers: Vec<(String, bool)>,
    /// MC weights; `None` for real data.
    pub weights: Option<EventWeights>,
    /// Data-taking year, when known.
    pub run_year: Option<u16>,
    /// Sample identifier used for normalization (`None` for data).
    pub sample_id: Option<Arc<str>>,
}

impl EventRecord {
    /// An event with no objects, no triggers and no MC weights.
    pub fn empty() -> Self {
        Self {
            electrons: Vec::new(),
            muons: Vec::new(),
            jets: Vec::new(),
            met: MissingEt::default(),
            triggers: Vec::new(),
            weights: None,
            run_year: None,
            sample_id: None,
        }
    }

    /// Decision of trigger `name`, if recorded for this event.
    pub fn trigger(&self, name: &str) -> Option<bool> {
        self.triggers.iter().find(|(n, _)| n == name).map(|&(_, pass)| pass)
    }

    /// Number of electrons plus muons.
    pub fn n_leptons(&self) -> usize {
        self.electrons.len() + self.muons.len()
    }

    /// Whether the event comes from simulation.
    pub fn is_mc(&self) -> bool {
        self.weights.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weight_product() {
        let w = EventWeights { generator: 2.0, pileup: 1.5, lepton_sf: 1.1, btag_sf: 0.9 };
        assert_relative_eq!(w.product(), 2.97, epsilon = 1e-12);
    }

    #[test]
    fn trigger_lookup() {
        let mut ev = EventRecord::empty();
        ev.triggers = vec![("HLT_mu50".into(), true), ("HLT_e60".into(), false)];
        assert_eq!(ev.trigger("HLT_mu50"), Some(true));
        assert_eq!(ev.trigger("HLT_e60"), Some(false));
        assert_eq!(ev.trigger("HLT_xe70"), None);
        assert!(!ev.is_mc());
    }
}
