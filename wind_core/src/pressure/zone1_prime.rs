//! # Zone 1' Analysis
//!
//! Flags elongated or tall low-rise buildings whose corner (and, for very
//! elongated plans, perimeter) pressures need an enhancement, and quantifies
//! the increase.
//!
//! ```text
//! aspect_ratio = max(L/W, W/L)
//! height_ratio = h / min(L, W)
//! required     = aspect_ratio >= 2.0  OR  (height_ratio >= 1.0 AND aspect_ratio >= 1.5)
//! ```
//!
//! The stepped increase percentages come from [`Zone1PrimePolicy::increase_steps`]
//! so they can be corrected without touching this module.

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult, CalcWarning, WarningKind};
use crate::parameters::{CalculationRequest, ExposureCategory};
use crate::policy::Zone1PrimePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    AspectRatio,
    HeightRatio,
    ExposureEffect,
    ComponentSize,
}

impl TriggerKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            TriggerKind::AspectRatio => "Aspect ratio",
            TriggerKind::HeightRatio => "Height ratio",
            TriggerKind::ExposureEffect => "Exposure effect",
            TriggerKind::ComponentSize => "Component size",
        }
    }
}

/// One evaluated trigger condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone1PrimeTrigger {
    pub kind: TriggerKind,
    pub triggered: bool,
    pub value: f64,
    pub threshold: f64,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone1PrimeInput {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub exposure: ExposureCategory,
    pub effective_wind_area_sqft: f64,
}

impl Zone1PrimeInput {
    /// Uses the bounding box of the footprint, so L-shapes are judged by
    /// their overall plan proportions.
    pub fn from_request(request: &CalculationRequest) -> Self {
        let (length, width) = request.geometry.bounding_dimensions();
        Zone1PrimeInput {
            length,
            width,
            height: request.geometry.height(),
            exposure: request.wind.exposure_category,
            effective_wind_area_sqft: request.effective_wind_area_sqft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone1PrimeAnalysis {
    pub aspect_ratio: f64,
    pub height_ratio: f64,
    pub is_required: bool,
    pub pressure_increase_percent: f64,
    /// Always in the order aspect_ratio, height_ratio, exposure_effect, component_size
    pub triggers: Vec<Zone1PrimeTrigger>,
    /// 0-100
    pub confidence: f64,
    pub explanation: String,
    pub warnings: Vec<CalcWarning>,
}

impl Zone1PrimeAnalysis {
    /// Factor applied to enhanced zone pressures
    pub fn multiplier(&self) -> f64 {
        if self.is_required {
            1.0 + self.pressure_increase_percent / 100.0
        } else {
            1.0
        }
    }

    /// Whether perimeter zones are enhanced along with corners
    pub fn enhances_perimeter(&self, policy: &Zone1PrimePolicy) -> bool {
        self.is_required && self.aspect_ratio >= policy.perimeter_enhancement_aspect_ratio
    }

    pub fn trigger(&self, kind: TriggerKind) -> Option<&Zone1PrimeTrigger> {
        self.triggers.iter().find(|t| t.kind == kind)
    }
}

/// Run the Zone 1' analysis.
pub fn analyze(input: &Zone1PrimeInput, policy: &Zone1PrimePolicy) -> CalcResult<Zone1PrimeAnalysis> {
    for (field, value) in [
        ("length", input.length),
        ("width", input.width),
        ("height", input.height),
        ("effective_wind_area_sqft", input.effective_wind_area_sqft),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(CalcError::invalid_input(field, value.to_string(), "Must be a positive number"));
        }
    }

    let aspect_ratio = (input.length / input.width).max(input.width / input.length);
    let height_ratio = input.height / input.length.min(input.width);

    let aspect_triggered = aspect_ratio >= policy.aspect_ratio_threshold;
    let height_triggered = height_ratio >= policy.height_ratio_threshold;
    let exposure_triggered = input.exposure.is_open_terrain() && aspect_triggered;
    let component_triggered = input.effective_wind_area_sqft <= policy.component_area_threshold_sqft;

    let triggers = vec![
        Zone1PrimeTrigger {
            kind: TriggerKind::AspectRatio,
            triggered: aspect_triggered,
            value: aspect_ratio,
            threshold: policy.aspect_ratio_threshold,
            impact: "Elongated plan increases corner vortex suction".to_string(),
        },
        Zone1PrimeTrigger {
            kind: TriggerKind::HeightRatio,
            triggered: height_triggered,
            value: height_ratio,
            threshold: policy.height_ratio_threshold,
            impact: "Tall building relative to plan dimension".to_string(),
        },
        Zone1PrimeTrigger {
            kind: TriggerKind::ExposureEffect,
            triggered: exposure_triggered,
            value: aspect_ratio,
            threshold: policy.aspect_ratio_threshold,
            impact: format!("{} terrain amplifies elongated-building effects", input.exposure),
        },
        Zone1PrimeTrigger {
            kind: TriggerKind::ComponentSize,
            triggered: component_triggered,
            value: input.effective_wind_area_sqft,
            threshold: policy.component_area_threshold_sqft,
            impact: "Small components see the peak local pressures".to_string(),
        },
    ];

    let is_required =
        aspect_triggered || (height_triggered && aspect_ratio >= policy.required_aspect_with_height);

    let mut pressure_increase_percent = policy
        .step_increase(aspect_ratio)
        .or(height_triggered.then_some(policy.height_only_increase_percent))
        .unwrap_or(0.0);
    if exposure_triggered {
        pressure_increase_percent += policy.exposure_bonus_percent;
    }

    let mut confidence = policy.base_confidence;
    if aspect_ratio < policy.borderline_aspect_ratio && height_ratio < policy.borderline_height_ratio {
        confidence = policy.borderline_confidence;
    }
    if input.effective_wind_area_sqft > policy.large_area_threshold_sqft {
        confidence -= policy.large_area_confidence_penalty;
    }
    let confidence = confidence.clamp(0.0, 100.0);

    let mut warnings = Vec::new();
    if pressure_increase_percent > policy.review_increase_percent {
        warnings.push(CalcWarning::new(
            WarningKind::ProfessionalReview,
            format!(
                "Zone 1' increase of {:.0}% requires professional review",
                pressure_increase_percent
            ),
        ));
    }
    if aspect_ratio >= policy.wind_tunnel_aspect_ratio {
        warnings.push(CalcWarning::new(
            WarningKind::WindTunnel,
            format!("Aspect ratio {:.2}: consider wind-tunnel testing", aspect_ratio),
        ));
    }
    if height_ratio >= policy.additional_analysis_height_ratio {
        warnings.push(CalcWarning::new(
            WarningKind::AdditionalAnalysis,
            format!("Height ratio {:.2}: additional analysis may be required", height_ratio),
        ));
    }

    let explanation = explain(&triggers, is_required, pressure_increase_percent, aspect_ratio, height_ratio);

    tracing::debug!(
        aspect_ratio,
        height_ratio,
        is_required,
        pressure_increase_percent,
        "zone 1' analysis complete"
    );

    Ok(Zone1PrimeAnalysis {
        aspect_ratio,
        height_ratio,
        is_required,
        pressure_increase_percent,
        triggers,
        confidence,
        explanation,
        warnings,
    })
}

fn explain(
    triggers: &[Zone1PrimeTrigger],
    is_required: bool,
    increase_percent: f64,
    aspect_ratio: f64,
    height_ratio: f64,
) -> String {
    if !is_required {
        return format!(
            "Zone 1' enhancement not required: aspect ratio {:.2} and height ratio {:.2} are within normal limits.",
            aspect_ratio, height_ratio
        );
    }

    let active: Vec<String> = triggers
        .iter()
        .filter(|t| t.triggered)
        .map(|t| format!("{} {:.2} (threshold {:.2})", t.kind.display_name().to_lowercase(), t.value, t.threshold))
        .collect();
    format!(
        "Zone 1' enhancement required; triggered by {}. Corner pressures increase by {:.0}%.",
        active.join(", "),
        increase_percent
    )
}
