//! # Pressure Calculations
//!
//! - [`velocity`]: exposure coefficient Kz and velocity pressure qz
//! - [`coefficients`]: external GCp table resolution and internal GCpi
//! - [`zone1_prime`]: elongated/tall building enhancement analysis
//! - [`engine`]: per-zone net design pressures

pub mod coefficients;
pub mod engine;
pub mod velocity;
pub mod zone1_prime;

pub use coefficients::{
    illustrative_roof_table, internal_pressure, CoefficientResolver, CoefficientRow, CoefficientTable,
    Confidence, InternalPressure, ResolutionMethod, ResolvedCoefficients,
};
pub use engine::{
    calculate, calculate_design, calculate_with_velocity_pressure, net_pressure, CalculationResult,
    DesignOutcome, InternalPressureCase, ZonePressure,
};
pub use velocity::{VelocityPressureInput, VelocityPressureResult};
pub use zone1_prime::{Zone1PrimeAnalysis, Zone1PrimeInput, Zone1PrimeTrigger, TriggerKind};
