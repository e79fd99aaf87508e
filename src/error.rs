//! Crate-level error type.
//!
//! Component errors (`CompositionError`, `JudgeError`, `RefinementError`,
//! `EvolutionError`) live with their modules; this enum is the umbrella
//! for callers that drive several components and for config loading.

use thiserror::Error;

use crate::compose::CompositionError;
use crate::evolve::EvolutionError;

/// All error types surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Structural composition failure (configuration/programming error).
    #[error("composition error: {0}")]
    Composition(#[from] CompositionError),

    /// Evolution configuration failure.
    #[error("evolution error: {0}")]
    Evolution(#[from] EvolutionError),

    /// Bad or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_error_conversion() {
        let err: Error = CompositionError::EmptyRegistry.into();
        assert!(matches!(err, Error::Composition(_)));
        assert!(err.to_string().contains("no skeletons"));
    }

    #[test]
    fn test_evolution_error_conversion() {
        let err: Error = EvolutionError::EmptyPopulation.into();
        assert!(matches!(err, Error::Evolution(_)));
    }

    #[test]
    fn test_config_error_message() {
        let err = Error::Config("missing field".to_string());
        assert_eq!(err.to_string(), "config error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>(": : :").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(matches!(err, Error::Yaml(_)));
    }
}
