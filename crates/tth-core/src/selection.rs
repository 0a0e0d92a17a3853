//! Selection rules over object multiplicities.
//!
//! Every count dimension is optional; `None` leaves that dimension
//! unconstrained. Selections are evaluated independently of one another, so
//! an event may satisfy several of them.

use serde::{Deserialize, Serialize};

use crate::event::EventRecord;

/// Count requirement with exact or at-least semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountCut {
    /// `n == k`
    Exact(usize),
    /// `n >= k`
    AtLeast(usize),
}

impl CountCut {
    /// Build from a count and an equality flag.
    pub fn new(n: usize, equality: bool) -> Self {
        if equality { CountCut::Exact(n) } else { CountCut::AtLeast(n) }
    }

    /// Whether `n` satisfies this requirement.
    #[inline]
    pub fn accepts(self, n: usize) -> bool {
        match self {
            CountCut::Exact(k) => n == k,
            CountCut::AtLeast(k) => n >= k,
        }
    }
}

/// A named selection category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Identifier; also the output group name.
    pub name: String,
    /// Human-readable description.
    pub display_name: String,
    /// Exact electron count.
    pub electrons: Option<usize>,
    /// Exact muon count.
    pub muons: Option<usize>,
    /// Exact electron + muon count.
    pub leptons: Option<usize>,
    /// Jet count requirement.
    pub jets: Option<CountCut>,
    /// b-jet count requirement.
    pub bjets: Option<CountCut>,
    /// Data-taking years this selection applies to; empty means all.
    pub eras: Vec<u16>,
}

impl Selection {
    /// Create an unconstrained selection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            electrons: None,
            muons: None,
            leptons: None,
            jets: None,
            bjets: None,
            eras: Vec::new(),
        }
    }

    /// Set the display name.
    pub fn display_name(mut self, s: impl Into<String>) -> Self {
        self.display_name = s.into();
        self
    }

    /// Require exactly `n` electrons.
    pub fn electrons(mut self, n: usize) -> Self {
        self.electrons = Some(n);
        self
    }

    /// Require exactly `n` muons.
    pub fn muons(mut self, n: usize) -> Self {
        self.muons = Some(n);
        self
    }

    /// Require exactly `n` leptons of either flavour.
    pub fn leptons(mut self, n: usize) -> Self {
        self.leptons = Some(n);
        self
    }

    /// Set the jet requirement.
    pub fn jets(mut self, cut: CountCut) -> Self {
        self.jets = Some(cut);
        self
    }

    /// Set the b-jet requirement.
    pub fn bjets(mut self, cut: CountCut) -> Self {
        self.bjets = Some(cut);
        self
    }

    /// Restrict to the given data-taking years.
    pub fn eras(mut self, years: &[u16]) -> Self {
        self.eras = years.to_vec();
        self
    }

    /// Whether this selection depends on the event's data-taking year.
    pub fn uses_eras(&self) -> bool {
        !self.eras.is_empty()
    }

    /// Evaluate all predicates (logical AND) for one event with `n_bjets` tagged jets.
    pub fn matches(&self, event: &EventRecord, n_bjets: usize) -> bool {
        if let Some(n) = self.electrons
            && event.electrons.len() != n
        {
            return false;
        }
        if let Some(n) = self.muons
            && event.muons.len() != n
        {
            return false;
        }
        if let Some(n) = self.leptons
            && event.n_leptons() != n
        {
            return false;
        }
        if let Some(cut) = self.jets
            && !cut.accepts(event.jets.len())
        {
            return false;
        }
        if let Some(cut) = self.bjets
            && !cut.accepts(n_bjets)
        {
            return false;
        }
        if self.uses_eras() {
            return event.run_year.is_some_and(|y| self.eras.contains(&y));
        }
        true
    }
}
