//! # Wind Pressure Engine
//!
//! Composes zone decomposition, coefficient resolution, velocity pressure and
//! the Zone 1' analysis into per-zone net design pressures.
//!
//! ## Per-Zone Pipeline
//!
//! ```text
//! effective area  = min(request area, zone area)
//! GCp             = resolve(effective area) mapped to the zone type
//! p(+GCpi)        = |qz * (GCp - GCpi+)|
//! p(-GCpi)        = |qz * (GCp - GCpi-)|
//! net pressure    = max(p(+GCpi), p(-GCpi))
//! ```
//!
//! When Zone 1' is required, corner zones (and perimeter zones on very
//! elongated plans) are scaled by `1 + increase% / 100` before the result is
//! assembled. A [`CalculationResult`] is never modified after it is returned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult, CalcWarning, WarningKind};
use crate::geometry::{decompose, ZoneSizes, ZoneType};
use crate::parameters::{CalculationRequest, EnclosureClassification};
use crate::policy::EnginePolicy;

use super::coefficients::{
    internal_pressure, CoefficientResolver, CoefficientTable, Confidence, InternalPressure,
    ResolutionMethod,
};
use super::velocity::{self, VelocityPressureInput, VelocityPressureResult};
use super::zone1_prime::{self, Zone1PrimeAnalysis, Zone1PrimeInput};

/// Which internal pressure sign produced the controlling pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalPressureCase {
    PositiveInternal,
    NegativeInternal,
    /// GCpi is zero (open building or internal pressure excluded)
    NotApplicable,
}

impl InternalPressureCase {
    pub fn display_name(&self) -> &'static str {
        match self {
            InternalPressureCase::PositiveInternal => "+GCpi",
            InternalPressureCase::NegativeInternal => "-GCpi",
            InternalPressureCase::NotApplicable => "n/a",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePressure {
    pub zone_id: String,
    pub zone_type: ZoneType,
    pub area_sqft: f64,
    /// Area the coefficients were resolved at
    pub effective_area_sqft: f64,
    pub gcp: f64,
    pub resolution: ResolutionMethod,
    pub confidence: Confidence,
    /// |qz (GCp - GCpi+)| in psf
    pub pressure_positive_internal_psf: f64,
    /// |qz (GCp - GCpi-)| in psf
    pub pressure_negative_internal_psf: f64,
    /// Controlling (larger) of the two cases, in psf
    pub net_pressure_psf: f64,
    pub controlling_case: InternalPressureCase,
    pub zone1_prime_applied: bool,
}

/// Output of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub shape: String,
    pub enclosure: EnclosureClassification,
    pub professional_mode: bool,
    pub velocity: VelocityPressureResult,
    pub internal_pressure: InternalPressure,
    pub zone_sizes: Vec<ZoneSizes>,
    pub zones: Vec<ZonePressure>,
    pub zone1_prime: Zone1PrimeAnalysis,
    pub controlling_zone_id: String,
    pub controlling_load_case: InternalPressureCase,
    pub max_pressure_psf: f64,
    pub warnings: Vec<CalcWarning>,
}

impl CalculationResult {
    /// Velocity pressure qz (psf)
    pub fn qz_psf(&self) -> f64 {
        self.velocity.qz_psf
    }

    pub fn zone(&self, id: &str) -> Option<&ZonePressure> {
        self.zones.iter().find(|z| z.zone_id == id)
    }

    /// Largest net pressure among zones of one type
    pub fn max_pressure_for(&self, zone_type: ZoneType) -> Option<f64> {
        self.zones
            .iter()
            .filter(|z| z.zone_type == zone_type)
            .map(|z| z.net_pressure_psf)
            .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.max(p))))
    }

    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// Result of a design run, with both enclosure cases when glazing failure is considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DesignOutcome {
    Single { result: CalculationResult },
    GlazingFailure {
        intact: CalculationResult,
        breached: CalculationResult,
    },
}

impl DesignOutcome {
    /// The as-specified result (intact envelope when glazing failure is considered)
    pub fn primary(&self) -> &CalculationResult {
        match self {
            DesignOutcome::Single { result } => result,
            DesignOutcome::GlazingFailure { intact, .. } => intact,
        }
    }

    pub fn results(&self) -> Vec<&CalculationResult> {
        match self {
            DesignOutcome::Single { result } => vec![result],
            DesignOutcome::GlazingFailure { intact, breached } => vec![intact, breached],
        }
    }
}

// ============================================================================
// Calculation
// ============================================================================

/// Net pressure magnitude for one internal pressure case.
pub fn net_pressure(qz_psf: f64, gcp: f64, gcpi: f64) -> f64 {
    (qz_psf * (gcp - gcpi)).abs()
}

/// Run the full pipeline for a request.
///
/// # Example
///
/// ```rust
/// use wind_core::geometry::{BuildingGeometry, ZoneType};
/// use wind_core::parameters::{CalculationRequest, ExposureCategory, WindParameters};
/// use wind_core::policy::EnginePolicy;
/// use wind_core::pressure::coefficients::illustrative_roof_table;
/// use wind_core::pressure::engine::calculate;
///
/// let request = CalculationRequest::new(
///     BuildingGeometry::rectangle(100.0, 80.0, 30.0),
///     WindParameters::new(120.0, ExposureCategory::C),
/// );
/// let result = calculate(&request, &illustrative_roof_table(), &EnginePolicy::default()).unwrap();
///
/// let corner = result.max_pressure_for(ZoneType::Corner).unwrap();
/// let field = result.max_pressure_for(ZoneType::Field).unwrap();
/// assert!(corner > field);
/// ```
pub fn calculate(
    request: &CalculationRequest,
    table: &CoefficientTable,
    policy: &EnginePolicy,
) -> CalcResult<CalculationResult> {
    request.validate()?;
    let input = VelocityPressureInput::from_wind(request.geometry.height(), &request.wind);
    let velocity = velocity::calculate(&input, &policy.velocity)?;
    calculate_with_velocity_pressure(request, velocity, table, policy)
}

/// Run the pipeline with an already computed velocity pressure.
pub fn calculate_with_velocity_pressure(
    request: &CalculationRequest,
    velocity: VelocityPressureResult,
    table: &CoefficientTable,
    policy: &EnginePolicy,
) -> CalcResult<CalculationResult> {
    request.validate()?;
    policy.validate()?;
    if !velocity.qz_psf.is_finite() || velocity.qz_psf < 0.0 {
        return Err(CalcError::calculation_failed(
            "wind_pressure",
            format!("velocity pressure {} is not usable", velocity.qz_psf),
        ));
    }

    let resolver = CoefficientResolver::new(table)?;
    let decomposition = decompose(&request.geometry, policy)?;
    let zone1 = zone1_prime::analyze(&Zone1PrimeInput::from_request(request), &policy.zone1_prime)?;

    let classification = request.wind.building_classification;
    let gcpi = if request.wind.include_internal_pressure {
        internal_pressure(classification)
    } else {
        InternalPressure::NONE
    };

    let mut warnings = decomposition.warnings.clone();
    if velocity.evaluated_height_ft > request.geometry.height() {
        warnings.push(CalcWarning::new(
            WarningKind::CodeMinimum,
            format!(
                "Mean roof height {:.1} ft evaluated at the {:.0} ft code minimum",
                request.geometry.height(),
                velocity.evaluated_height_ft
            ),
        ));
    }
    if velocity.terrain_fallback {
        warnings.push(CalcWarning::new(
            WarningKind::LowConfidenceCoefficients,
            "Terrain constants not found; default exposure constants were used",
        ));
    }
    if let Some(edition) = table.edition {
        if edition != request.wind.asce_edition {
            warnings.push(CalcWarning::new(
                WarningKind::LowConfidenceCoefficients,
                format!(
                    "Coefficient table is from {} but the calculation uses {}",
                    edition, request.wind.asce_edition
                ),
            ));
        }
    }

    let qz = velocity.qz_psf;
    let multiplier = zone1.multiplier();
    let enhance_perimeter = zone1.enhances_perimeter(&policy.zone1_prime);
    let mut misses: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();

    let mut zones = Vec::with_capacity(decomposition.zones.len());
    for zone in &decomposition.zones {
        let effective_area_sqft = request.effective_wind_area_sqft.min(zone.area);
        let resolved = resolver.resolve(effective_area_sqft)?;
        let gcp = resolved.for_zone(zone.zone_type, policy.reentrant_corner.coefficient_multiplier);
        if resolved.is_lookup_miss() {
            misses
                .entry(method_label(resolved.method))
                .or_default()
                .push(zone.id.clone());
        }

        let zone1_prime_applied = zone1.is_required
            && (zone.zone_type.is_corner() || (enhance_perimeter && zone.zone_type == ZoneType::Perimeter));
        let factor = if zone1_prime_applied { multiplier } else { 1.0 };

        let positive = net_pressure(qz, gcp, gcpi.positive) * factor;
        let negative = net_pressure(qz, gcp, gcpi.negative) * factor;
        let (net_pressure_psf, controlling_case) = controlling(positive, negative, &gcpi);

        zones.push(ZonePressure {
            zone_id: zone.id.clone(),
            zone_type: zone.zone_type,
            area_sqft: zone.area,
            effective_area_sqft,
            gcp,
            resolution: resolved.method,
            confidence: resolved.confidence,
            pressure_positive_internal_psf: positive,
            pressure_negative_internal_psf: negative,
            net_pressure_psf,
            controlling_case,
            zone1_prime_applied,
        });
    }

    for (method, ids) in misses {
        warnings.push(CalcWarning::new(
            WarningKind::LowConfidenceCoefficients,
            format!("No exact coefficient row; {} for zones: {}", method, ids.join(", ")),
        ));
    }

    if zone1.is_required {
        let scope = if enhance_perimeter { "corner and perimeter" } else { "corner" };
        warnings.push(CalcWarning::new(
            WarningKind::Zone1Prime,
            format!(
                "Zone 1' enhancement applied: {} pressures increased by {:.0}% (aspect ratio {:.2})",
                scope, zone1.pressure_increase_percent, zone1.aspect_ratio
            ),
        ));
    }
    warnings.extend(zone1.warnings.iter().cloned());

    let controlling_zone = zones
        .iter()
        .fold(None::<&ZonePressure>, |best, z| match best {
            Some(b) if b.net_pressure_psf >= z.net_pressure_psf => Some(b),
            _ => Some(z),
        })
        .ok_or_else(|| CalcError::calculation_failed("wind_pressure", "decomposition produced no zones"))?;

    let controlling_zone_id = controlling_zone.zone_id.clone();
    let controlling_load_case = controlling_zone.controlling_case;
    let max_pressure_psf = controlling_zone.net_pressure_psf;

    if !max_pressure_psf.is_finite() {
        return Err(CalcError::calculation_failed(
            "wind_pressure",
            format!("maximum pressure evaluated to {}", max_pressure_psf),
        ));
    }

    tracing::debug!(
        shape = request.geometry.shape_name(),
        zones = zones.len(),
        qz,
        max_pressure_psf,
        controlling_zone = %controlling_zone_id,
        "wind pressure calculation complete"
    );

    Ok(CalculationResult {
        shape: request.geometry.shape_name().to_string(),
        enclosure: classification,
        professional_mode: request.professional_mode,
        velocity,
        internal_pressure: gcpi,
        zone_sizes: decomposition.sizes,
        zones,
        zone1_prime: zone1,
        controlling_zone_id,
        controlling_load_case,
        max_pressure_psf,
        warnings,
    })
}

/// Run the request, producing both enclosure cases when glazing failure is considered.
pub fn calculate_design(
    request: &CalculationRequest,
    table: &CoefficientTable,
    policy: &EnginePolicy,
) -> CalcResult<DesignOutcome> {
    if !request.wind.consider_glazing_failure {
        return Ok(DesignOutcome::Single {
            result: calculate(request, table, policy)?,
        });
    }

    let with_classification = |classification| {
        let mut variant = request.clone();
        variant.wind.building_classification = classification;
        calculate(&variant, table, policy)
    };
    Ok(DesignOutcome::GlazingFailure {
        intact: with_classification(EnclosureClassification::Enclosed)?,
        breached: with_classification(EnclosureClassification::PartiallyEnclosed)?,
    })
}

fn controlling(positive: f64, negative: f64, gcpi: &InternalPressure) -> (f64, InternalPressureCase) {
    if gcpi.positive == 0.0 && gcpi.negative == 0.0 {
        (positive, InternalPressureCase::NotApplicable)
    } else if positive >= negative {
        (positive, InternalPressureCase::PositiveInternal)
    } else {
        (negative, InternalPressureCase::NegativeInternal)
    }
}

fn method_label(method: ResolutionMethod) -> &'static str {
    match method {
        ResolutionMethod::Exact => "exact",
        ResolutionMethod::Interpolated => "interpolated",
        ResolutionMethod::Clamped => "clamped to table bounds",
        ResolutionMethod::Fallback => "conservative fallback used",
    }
}
