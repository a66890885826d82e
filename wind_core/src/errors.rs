//! # Error Types
//!
//! Structured error types for wind_core. Every failure carries enough context
//! for a caller (UI, report generator, LLM tool) to explain what went wrong
//! and whether it can simply retry.
//!
//! ## Taxonomy
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `InvalidInput`, `MissingField` | Geometry or parameters rejected before any computation |
//! | `CalculationFailed` | Unexpected numeric failure (degenerate zone area, NaN) |
//! | `CacheIntegrity` | Fingerprint or checksum mismatch inside the result cache |
//! | `WorkflowFailed` | The asynchronous calculation task failed |
//! | `InvalidTransition` | An event was dispatched in a state that does not accept it |
//! | `Configuration` | A policy file or policy value is unusable |
//!
//! Coefficient lookup misses are *not* errors; they are reported as
//! [`CalcWarning`]s on the finished result.
//!
//! ## Example
//!
//! ```rust
//! use wind_core::errors::{CalcError, CalcResult};
//!
//! fn validate_height(height_ft: f64) -> CalcResult<()> {
//!     if height_ft <= 0.0 {
//!         return Err(CalcError::invalid_input(
//!             "height_ft",
//!             height_ft.to_string(),
//!             "Height must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_height(-1.0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for wind_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for wind calculations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// An input value is invalid (non-positive dimension, bad speed, ...)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A required field is missing
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Computation produced an unusable value
    #[error("Calculation failed: {calculation_type} - {reason}")]
    CalculationFailed {
        calculation_type: String,
        reason: String,
    },

    /// Cache entry failed its integrity check
    #[error("Cache integrity error for key {key}: {reason}")]
    CacheIntegrity { key: String, reason: String },

    /// The asynchronous calculation task failed
    #[error("Workflow failed: {message}")]
    WorkflowFailed { message: String },

    /// Event not accepted by the current workflow state
    #[error("Invalid transition: event '{event}' is not allowed in state '{state}'")]
    InvalidTransition { state: String, event: String },

    /// Policy or configuration problem
    #[error("Invalid configuration for '{key}': {reason}")]
    Configuration { key: String, reason: String },

    /// JSON/TOML serialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },
}

impl CalcError {
    /// Create an InvalidInput error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        CalcError::MissingField {
            field: field.into(),
        }
    }

    /// Create a CalculationFailed error
    pub fn calculation_failed(
        calculation_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalcError::CalculationFailed {
            calculation_type: calculation_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a CacheIntegrity error
    pub fn cache_integrity(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::CacheIntegrity {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a WorkflowFailed error
    pub fn workflow_failed(message: impl Into<String>) -> Self {
        CalcError::WorkflowFailed {
            message: message.into(),
        }
    }

    /// Create an InvalidTransition error
    pub fn invalid_transition(state: impl Into<String>, event: impl Into<String>) -> Self {
        CalcError::InvalidTransition {
            state: state.into(),
            event: event.into(),
        }
    }

    /// Create a Configuration error
    pub fn configuration(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization(reason: impl Into<String>) -> Self {
        CalcError::SerializationError {
            reason: reason.into(),
        }
    }

    /// True when the failure came from the input itself, before any computation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CalcError::InvalidInput { .. } | CalcError::MissingField { .. }
        )
    }

    /// Check if this is a recoverable error (the same request may be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CalcError::CalculationFailed { .. }
                | CalcError::WorkflowFailed { .. }
                | CalcError::CacheIntegrity { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::MissingField { .. } => "MISSING_FIELD",
            CalcError::CalculationFailed { .. } => "CALCULATION_FAILED",
            CalcError::CacheIntegrity { .. } => "CACHE_INTEGRITY",
            CalcError::WorkflowFailed { .. } => "WORKFLOW_FAILED",
            CalcError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CalcError::Configuration { .. } => "CONFIGURATION_ERROR",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
        }
    }
}

impl From<serde_json::Error> for CalcError {
    fn from(err: serde_json::Error) -> Self {
        CalcError::serialization(err.to_string())
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Category of a non-fatal finding attached to a calculation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Coefficients came from interpolation, clamping or the fallback set
    LowConfidenceCoefficients,
    /// Geometry is valid but unusual (e.g. very unequal L-shape legs)
    DegenerateGeometry,
    /// Zone 1' enhancement was applied to the result
    Zone1Prime,
    /// Pressure increase is large enough to warrant professional review
    ProfessionalReview,
    /// Geometry is elongated enough that wind-tunnel testing should be considered
    WindTunnel,
    /// Building is tall relative to its footprint
    AdditionalAnalysis,
    /// Input was adjusted to a code minimum (e.g. height below 15 ft)
    CodeMinimum,
}

/// A structured, non-fatal finding.
///
/// ## JSON Example
///
/// ```json
/// { "kind": "low_confidence_coefficients", "message": "corner-sw: interpolated between rows" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl CalcWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        CalcWarning {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CalcWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = CalcError::invalid_input("height_ft", "-5.0", "Height must be positive");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"InvalidInput\""));
        let roundtrip: CalcError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CalcError::missing_field("length2").error_code(), "MISSING_FIELD");
        assert_eq!(
            CalcError::cache_integrity("abc", "checksum").error_code(),
            "CACHE_INTEGRITY"
        );
        assert_eq!(
            CalcError::invalid_transition("idle", "RETRY").error_code(),
            "INVALID_TRANSITION"
        );
    }

    #[test]
    fn test_recoverability() {
        assert!(CalcError::workflow_failed("boom").is_recoverable());
        assert!(CalcError::calculation_failed("zones", "zero area").is_recoverable());
        assert!(!CalcError::invalid_input("width", "0", "must be positive").is_recoverable());
        assert!(CalcError::missing_field("height").is_validation());
    }

    #[test]
    fn test_warning_serializes_snake_case() {
        let warning = CalcWarning::new(WarningKind::LowConfidenceCoefficients, "fallback used");
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("low_confidence_coefficients"));
        assert_eq!(warning.to_string(), "fallback used");
    }
}
