//! Event-level histogram filling.

use tth_core::{EventRecord, Jet, Lepton, MEV_PER_GEV};

use crate::bank::{CollectionHists, HistogramBank, KinematicHists, SelectionHists};

impl KinematicHists {
    fn fill_lepton(&mut self, l: &Lepton, weight: f64) {
        self.pt.fill(l.pt / MEV_PER_GEV, weight);
        self.eta.fill(l.eta, weight);
        self.phi.fill(l.phi, weight);
        self.e.fill(l.e / MEV_PER_GEV, weight);
    }

    fn fill_jet(&mut self, j: &Jet, weight: f64) {
        self.pt.fill(j.pt / MEV_PER_GEV, weight);
        self.eta.fill(j.eta, weight);
        self.phi.fill(j.phi, weight);
        self.e.fill(j.e / MEV_PER_GEV, weight);
        if let Some(h) = self.btag.as_mut() {
            h.fill(j.btag_score, weight);
        }
    }
}

impl CollectionHists {
    /// Fill lepton histograms; returns the scalar pT sum in GeV.
    fn fill_leptons(&mut self, leptons: &[Lepton], weight: f64) -> f64 {
        self.n.fill(leptons.len() as f64, weight);
        let mut sum_pt = 0.0;
        for (i, l) in leptons.iter().enumerate() {
            self.all.fill_lepton(l, weight);
            if let Some(slot) = self.slots.get_mut(i) {
                slot.fill_lepton(l, weight);
            }
            sum_pt += l.pt / MEV_PER_GEV;
        }
        sum_pt
    }

    /// Fill jet histograms for `jets` (already in category order); returns HT in GeV.
    fn fill_jets<'a>(&mut self, jets: impl IntoIterator<Item = &'a Jet>, weight: f64) -> f64 {
        let mut ht = 0.0;
        let mut n = 0usize;
        for (i, j) in jets.into_iter().enumerate() {
            self.all.fill_jet(j, weight);
            if let Some(slot) = self.slots.get_mut(i) {
                slot.fill_jet(j, weight);
            }
            ht += j.pt / MEV_PER_GEV;
            n += 1;
        }
        self.n.fill(n as f64, weight);
        if let Some(h) = self.ht.as_mut() {
            h.fill(ht, weight);
        }
        ht
    }
}

impl SelectionHists {
    /// Fill every histogram of this group for one matched event.
    ///
    /// `bjets` holds indices into `event.jets`, in jet order. `weight` is the
    /// combined event weight, computed once per event by the caller.
    pub fn fill_event(&mut self, event: &EventRecord, bjets: &[usize], weight: f64) {
        let lepton_pt = self.electrons.fill_leptons(&event.electrons, weight)
            + self.muons.fill_leptons(&event.muons, weight);

        let jet_ht = self.jets.fill_jets(&event.jets, weight);
        self.bjets.fill_jets(bjets.iter().filter_map(|&i| event.jets.get(i)), weight);

        let met = event.met.met / MEV_PER_GEV;
        self.met.fill(met, weight);
        self.ht_all.fill(jet_ht + lepton_pt + met, weight);
    }
}

impl HistogramBank {
    /// Fill the group at catalog position `index`; out-of-range indices are ignored.
    pub fn fill(&mut self, index: usize, event: &EventRecord, bjets: &[usize], weight: f64) {
        if let Some(group) = self.group_mut(index) {
            log::trace!("filling '{}' with weight {weight}", group.selection);
            group.fill_event(event, bjets, weight);
        }
    }
}
