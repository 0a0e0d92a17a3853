//! Trigger gate and per-event selection matching.

use tth_core::{BTagClassifier, EventRecord, Selection};

/// Passes events for which at least one configured trigger fired.
///
/// With no triggers configured, every event passes.
#[derive(Debug, Clone, Default)]
pub struct TriggerGate {
    triggers: Vec<String>,
}

impl TriggerGate {
    /// Gate on `triggers`.
    pub fn new(triggers: Vec<String>) -> Self {
        Self { triggers }
    }

    /// Configured trigger names.
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    /// Whether `event` passes the gate.
    pub fn passes(&self, event: &EventRecord) -> bool {
        self.triggers.is_empty() || self.triggers.iter().any(|t| event.trigger(t) == Some(true))
    }
}

/// Result of classifying one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Whether the event passed the trigger gate.
    pub passed_trigger: bool,
    /// Indices of b-tagged jets, in jet order.
    pub bjets: Vec<usize>,
    /// Catalog positions of every matched selection, in catalog order.
    pub matches: Vec<usize>,
}

/// Evaluates the full selection catalog against one event at a time.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    catalog: Vec<Selection>,
    btag: BTagClassifier,
    gate: TriggerGate,
}

impl EventClassifier {
    /// Create a classifier.
    pub fn new(catalog: Vec<Selection>, btag: BTagClassifier, gate: TriggerGate) -> Self {
        Self { catalog, btag, gate }
    }

    /// Selection catalog, in evaluation order.
    pub fn catalog(&self) -> &[Selection] {
        &self.catalog
    }

    /// Trigger gate.
    pub fn gate(&self) -> &TriggerGate {
        &self.gate
    }

    /// Gate, tag and match one event.
    ///
    /// Every selection is evaluated independently; an event may match several.
    /// An event failing the trigger gate matches none.
    pub fn classify(&self, event: &EventRecord) -> Classification {
        if !self.gate.passes(event) {
            return Classification::default();
        }
        let bjets = self.btag.tag(&event.jets);
        let matches = self
            .catalog
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                let pass = s.matches(event, bjets.len());
                log::trace!("selection '{}': {}", s.name, if pass { "pass" } else { "fail" });
                pass
            })
            .map(|(i, _)| i)
            .collect();
        Classification { passed_trigger: true, bjets, matches }
    }
}
