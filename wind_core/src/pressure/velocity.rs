//! # Velocity Pressure
//!
//! Exposure coefficient and velocity pressure per ASCE 7 Chapter 26.
//!
//! ```text
//! Kz = 2.01 * (z / zg)^(2 / alpha)
//! qz = 0.00256 * Kz * Kzt * Kd * (V * I)^2      [psf, V in mph]
//! ```
//!
//! Heights below the policy minimum (15 ft) are evaluated at the minimum,
//! matching the note to ASCE 7 Table 26.10-1.

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::parameters::{AsceEdition, ExposureCategory, RiskCategory, WindParameters};
use crate::policy::VelocityPolicy;

/// Velocity pressure constant for V in mph and qz in psf. Fixed by the standard.
pub const VELOCITY_PRESSURE_CONSTANT: f64 = 0.00256;

/// Kz coefficient in the continuous power-law form
const KZ_COEFFICIENT: f64 = 2.01;

/// Terrain constants used when the exposure/edition lookup has no row
pub const FALLBACK_TERRAIN: TerrainConstants = TerrainConstants {
    alpha: 9.5,
    zg_ft: 900.0,
};

/// Power-law exponent and gradient height for one exposure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainConstants {
    pub alpha: f64,
    pub zg_ft: f64,
}

/// ASCE 7-10/16/22 terrain exposure constants (Table 26.11-1, US customary).
const TERRAIN_TABLE: [(AsceEdition, ExposureCategory, TerrainConstants); 9] = [
    (AsceEdition::Asce7_10, ExposureCategory::B, TerrainConstants { alpha: 7.0, zg_ft: 1200.0 }),
    (AsceEdition::Asce7_10, ExposureCategory::C, TerrainConstants { alpha: 9.5, zg_ft: 900.0 }),
    (AsceEdition::Asce7_10, ExposureCategory::D, TerrainConstants { alpha: 11.5, zg_ft: 700.0 }),
    (AsceEdition::Asce7_16, ExposureCategory::B, TerrainConstants { alpha: 7.0, zg_ft: 1200.0 }),
    (AsceEdition::Asce7_16, ExposureCategory::C, TerrainConstants { alpha: 9.5, zg_ft: 900.0 }),
    (AsceEdition::Asce7_16, ExposureCategory::D, TerrainConstants { alpha: 11.5, zg_ft: 700.0 }),
    (AsceEdition::Asce7_22, ExposureCategory::B, TerrainConstants { alpha: 7.0, zg_ft: 1200.0 }),
    (AsceEdition::Asce7_22, ExposureCategory::C, TerrainConstants { alpha: 9.5, zg_ft: 900.0 }),
    (AsceEdition::Asce7_22, ExposureCategory::D, TerrainConstants { alpha: 11.5, zg_ft: 700.0 }),
];

/// Look up terrain constants for an exposure and edition.
pub fn terrain_constants(exposure: ExposureCategory, edition: AsceEdition) -> Option<TerrainConstants> {
    TERRAIN_TABLE
        .iter()
        .find(|(e, x, _)| *e == edition && *x == exposure)
        .map(|(_, _, constants)| *constants)
}

/// Inputs for a velocity pressure evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityPressureInput {
    pub height_ft: f64,
    pub basic_wind_speed_mph: f64,
    pub exposure: ExposureCategory,
    pub edition: AsceEdition,
    pub risk_category: RiskCategory,
    pub kzt: f64,
    pub kd: f64,
}

impl VelocityPressureInput {
    /// Velocity pressure at `height_ft` for the given wind parameters
    pub fn from_wind(height_ft: f64, wind: &WindParameters) -> Self {
        VelocityPressureInput {
            height_ft,
            basic_wind_speed_mph: wind.basic_wind_speed_mph,
            exposure: wind.exposure_category,
            edition: wind.asce_edition,
            risk_category: wind.risk_category,
            kzt: wind.topographic_factor,
            kd: wind.directionality_factor,
        }
    }

    pub fn validate(&self) -> CalcResult<()> {
        if !self.height_ft.is_finite() || self.height_ft <= 0.0 {
            return Err(CalcError::invalid_input(
                "height_ft",
                self.height_ft.to_string(),
                "Height must be positive",
            ));
        }
        if !self.basic_wind_speed_mph.is_finite() || self.basic_wind_speed_mph <= 0.0 {
            return Err(CalcError::invalid_input(
                "basic_wind_speed_mph",
                self.basic_wind_speed_mph.to_string(),
                "Wind speed must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityPressureResult {
    /// Height actually used for Kz (after the code minimum)
    pub evaluated_height_ft: f64,
    pub terrain: TerrainConstants,
    /// True when the lookup missed and [`FALLBACK_TERRAIN`] was used
    pub terrain_fallback: bool,
    pub kz: f64,
    pub kzt: f64,
    pub kd: f64,
    pub importance_factor: f64,
    /// Velocity pressure qz (psf)
    pub qz_psf: f64,
}

/// Exposure coefficient Kz at height `z_ft`.
pub fn exposure_coefficient(z_ft: f64, terrain: TerrainConstants) -> f64 {
    KZ_COEFFICIENT * (z_ft / terrain.zg_ft).powf(2.0 / terrain.alpha)
}

/// Compute Kz and qz.
///
/// # Example
///
/// ```rust
/// use wind_core::parameters::{AsceEdition, ExposureCategory, RiskCategory};
/// use wind_core::policy::VelocityPolicy;
/// use wind_core::pressure::velocity::{calculate, VelocityPressureInput};
///
/// let input = VelocityPressureInput {
///     height_ft: 30.0,
///     basic_wind_speed_mph: 120.0,
///     exposure: ExposureCategory::C,
///     edition: AsceEdition::Asce7_22,
///     risk_category: RiskCategory::II,
///     kzt: 1.0,
///     kd: 0.85,
/// };
/// let result = calculate(&input, &VelocityPolicy::default()).unwrap();
/// assert!((result.kz - 0.98).abs() < 0.01);
/// ```
pub fn calculate(input: &VelocityPressureInput, policy: &VelocityPolicy) -> CalcResult<VelocityPressureResult> {
    input.validate()?;

    let (terrain, terrain_fallback) = match terrain_constants(input.exposure, input.edition) {
        Some(constants) => (constants, false),
        None => {
            tracing::warn!(
                exposure = input.exposure.code(),
                edition = input.edition.display_name(),
                "no terrain constants for exposure; using alpha 9.5, zg 900 ft"
            );
            (FALLBACK_TERRAIN, true)
        }
    };

    let evaluated_height_ft = input.height_ft.max(policy.minimum_height_ft);
    let kz = exposure_coefficient(evaluated_height_ft, terrain);
    let importance_factor = input.risk_category.importance_factor();
    let speed = input.basic_wind_speed_mph * importance_factor;
    let qz_psf = VELOCITY_PRESSURE_CONSTANT * kz * input.kzt * input.kd * speed * speed;

    if !qz_psf.is_finite() {
        return Err(CalcError::calculation_failed(
            "velocity_pressure",
            format!("qz evaluated to {}", qz_psf),
        ));
    }

    Ok(VelocityPressureResult {
        evaluated_height_ft,
        terrain,
        terrain_fallback,
        kz,
        kzt: input.kzt,
        kd: input.kd,
        importance_factor,
        qz_psf,
    })
}
