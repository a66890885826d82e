//! # wind_core - Low-Rise Wind Pressure Engine
//!
//! `wind_core` computes ASCE 7 components-and-cladding wind pressures for
//! low-rise buildings: it splits a footprint into pressure zones, resolves
//! pressure coefficients from a supplied table, evaluates velocity pressure,
//! flags elongated or tall buildings for the Zone 1' enhancement, and
//! combines everything into per-zone net design pressures.
//!
//! ## Design Philosophy
//!
//! - **Stateless core**: zone decomposition, coefficients, velocity pressure
//!   and the engine are pure functions over immutable inputs
//! - **JSON-First**: all inputs and outputs implement Serialize/Deserialize
//! - **Rich Errors**: structured error types and structured warnings
//! - **Explicit state**: the cache and workflow are constructed and passed
//!   around by the caller, never global
//!
//! ## Quick Start
//!
//! ```rust
//! use wind_core::geometry::BuildingGeometry;
//! use wind_core::parameters::{CalculationRequest, ExposureCategory, WindParameters};
//! use wind_core::policy::EnginePolicy;
//! use wind_core::pressure::{calculate, illustrative_roof_table};
//!
//! let request = CalculationRequest::new(
//!     BuildingGeometry::rectangle(100.0, 80.0, 30.0),
//!     WindParameters::new(120.0, ExposureCategory::C),
//! );
//! let result = calculate(&request, &illustrative_roof_table(), &EnginePolicy::default()).unwrap();
//!
//! println!("qz = {:.2} psf", result.qz_psf());
//! println!("controlling zone: {} at {:.1} psf", result.controlling_zone_id, result.max_pressure_psf);
//! ```
//!
//! ## Modules
//!
//! - [`geometry`] - Building footprints, polygons and zone decomposition
//! - [`parameters`] - Wind parameters, code enums and the calculation request
//! - [`pressure`] - Velocity pressure, coefficients, Zone 1' and the engine
//! - [`cache`] - Fingerprinted LRU/TTL result cache
//! - [`workflow`] - Calculation state machine and async runner
//! - [`policy`] - Overridable constants and TOML configuration
//! - [`errors`] - Structured error and warning types

pub mod cache;
pub mod errors;
pub mod geometry;
pub mod parameters;
pub mod policy;
pub mod pressure;
pub mod workflow;

// Re-export commonly used types at crate root for convenience
pub use cache::{ResultCache, CacheMetrics};
pub use errors::{CalcError, CalcResult, CalcWarning, WarningKind};
pub use geometry::BuildingGeometry;
pub use parameters::{CalculationRequest, WindParameters};
pub use policy::EnginePolicy;
pub use pressure::{CalculationResult, DesignOutcome};
pub use workflow::{CalculationWorkflow, WorkflowState};
