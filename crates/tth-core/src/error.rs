//! Error types for the ttH histogrammer

use thiserror::Error;

/// Histogrammer error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration resource unreadable or malformed
    #[error("Config load failure: {0}")]
    ConfigLoad(String),

    /// Simulated sample has no cross-section entry
    #[error("Normalization lookup failure: no cross-section entry for sample '{sample_id}'")]
    NormalizationLookup {
        /// Sample identifier that was looked up.
        sample_id: String,
    },

    /// Required input column absent
    #[error("Missing field '{field}' in shard '{shard}'")]
    MissingField {
        /// Column name.
        field: String,
        /// Shard (input file) name.
        shard: String,
    },

    /// Total generated event count is zero, negative or not finite
    #[error("Division hazard: total generated events for '{sample}' is {total}")]
    DivisionHazard {
        /// Shard (input file) name.
        sample: String,
        /// Offending total.
        total: f64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Whether this error aborts only the current shard (as opposed to the whole run).
    pub fn is_shard_fatal(&self) -> bool {
        !matches!(self, Error::ConfigLoad(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_culprit() {
        let e = Error::MissingField { field: "jet_pt".into(), shard: "a.root".into() };
        assert_eq!(e.to_string(), "Missing field 'jet_pt' in shard 'a.root'");

        let e = Error::NormalizationLookup { sample_id: "410000".into() };
        assert!(e.to_string().contains("410000"));
    }

    #[test]
    fn config_failure_is_run_fatal() {
        assert!(!Error::ConfigLoad("x".into()).is_shard_fatal());
        assert!(Error::DivisionHazard { sample: "s".into(), total: 0.0 }.is_shard_fatal());
    }
}
