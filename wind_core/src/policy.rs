//! # Engine Policy
//!
//! Every overridable constant used by the engine lives here, grouped by the
//! component that consumes it. Several of these are engineering judgement
//! rather than code-table values (the re-entrant corner treatment and the
//! Zone 1' increase steps), so they are kept as data that can be replaced
//! from a TOML file without touching the calculation code.
//!
//! ## TOML Example
//!
//! ```toml
//! [zone_sizing]
//! corner_cap_ft = 15.0
//! perimeter_cap_ft = 15.0
//!
//! [reentrant_corner]
//! coefficient_multiplier = 1.25
//!
//! [[zone1_prime.increase_steps]]
//! min_aspect_ratio = 3.0
//! increase_percent = 30.0
//!
//! [cache]
//! capacity = 250
//! ```
//!
//! Missing sections and keys fall back to [`EnginePolicy::default`].

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

// ============================================================================
// Zone Sizing
// ============================================================================

/// Zone width rule: `min(edge_fraction * least dimension, height_fraction * H, cap)`,
/// floored at `max(min_fraction * least dimension, min_size_ft)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSizingPolicy {
    pub edge_fraction: f64,
    pub height_fraction: f64,
    pub corner_cap_ft: f64,
    pub perimeter_cap_ft: f64,
    pub min_fraction: f64,
    pub min_size_ft: f64,
    /// When set, interior fields deeper than `factor * H` from the perimeter
    /// band are split into a `field_prime` core and a `field` ring.
    pub field_prime_band_ft_per_height: Option<f64>,
}

impl Default for ZoneSizingPolicy {
    fn default() -> Self {
        ZoneSizingPolicy {
            edge_fraction: 0.1,
            height_fraction: 0.4,
            corner_cap_ft: 20.0,
            perimeter_cap_ft: 20.0,
            min_fraction: 0.04,
            min_size_ft: 3.0,
            field_prime_band_ft_per_height: None,
        }
    }
}

impl ZoneSizingPolicy {
    pub fn validate(&self) -> CalcResult<()> {
        positive("zone_sizing.edge_fraction", self.edge_fraction)?;
        positive("zone_sizing.height_fraction", self.height_fraction)?;
        positive("zone_sizing.corner_cap_ft", self.corner_cap_ft)?;
        positive("zone_sizing.perimeter_cap_ft", self.perimeter_cap_ft)?;
        non_negative("zone_sizing.min_fraction", self.min_fraction)?;
        non_negative("zone_sizing.min_size_ft", self.min_size_ft)?;
        below_half("zone_sizing.edge_fraction", self.edge_fraction)?;
        below_half("zone_sizing.min_fraction", self.min_fraction)?;
        if self.corner_cap_ft < self.perimeter_cap_ft {
            return Err(CalcError::configuration(
                "zone_sizing.corner_cap_ft",
                "Corner cap must be at least the perimeter cap so corners cover the band overlap",
            ));
        }
        if let Some(factor) = self.field_prime_band_ft_per_height {
            positive("zone_sizing.field_prime_band_ft_per_height", factor)?;
        }
        Ok(())
    }
}

// ============================================================================
// Re-entrant Corners
// ============================================================================

/// Heuristic treatment of the concave junction of an L-shaped footprint.
///
/// Not a literal ASCE 7 table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReentrantCornerPolicy {
    /// Multiplier applied to the corner GCp (> 1.0 means more suction)
    pub coefficient_multiplier: f64,
    /// Re-entrant zone size relative to the leg's corner size
    pub size_factor: f64,
    /// Leg area ratio above which the L-shape is flagged as degenerate
    pub degenerate_leg_area_ratio: f64,
}

impl Default for ReentrantCornerPolicy {
    fn default() -> Self {
        ReentrantCornerPolicy {
            coefficient_multiplier: 1.2,
            size_factor: 1.0,
            degenerate_leg_area_ratio: 10.0,
        }
    }
}

impl ReentrantCornerPolicy {
    pub fn validate(&self) -> CalcResult<()> {
        if !self.coefficient_multiplier.is_finite() || self.coefficient_multiplier < 1.0 {
            return Err(CalcError::configuration(
                "reentrant_corner.coefficient_multiplier",
                "Multiplier must be >= 1.0 so re-entrant corners are never less severe than corners",
            ));
        }
        positive("reentrant_corner.size_factor", self.size_factor)?;
        positive(
            "reentrant_corner.degenerate_leg_area_ratio",
            self.degenerate_leg_area_ratio,
        )
    }
}

// ============================================================================
// Zone 1'
// ============================================================================

/// One step of the aspect-ratio-driven pressure increase table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncreaseStep {
    pub min_aspect_ratio: f64,
    pub increase_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone1PrimePolicy {
    pub aspect_ratio_threshold: f64,
    pub height_ratio_threshold: f64,
    pub component_area_threshold_sqft: f64,
    /// Aspect ratio required alongside a height-ratio trigger
    pub required_aspect_with_height: f64,
    /// Ordered from largest `min_aspect_ratio` to smallest
    pub increase_steps: Vec<IncreaseStep>,
    pub height_only_increase_percent: f64,
    pub exposure_bonus_percent: f64,
    /// Aspect ratio at which perimeter zones are enhanced along with corners
    pub perimeter_enhancement_aspect_ratio: f64,
    pub base_confidence: f64,
    pub borderline_confidence: f64,
    pub borderline_aspect_ratio: f64,
    pub borderline_height_ratio: f64,
    pub large_area_threshold_sqft: f64,
    pub large_area_confidence_penalty: f64,
    pub review_increase_percent: f64,
    pub wind_tunnel_aspect_ratio: f64,
    pub additional_analysis_height_ratio: f64,
}

impl Default for Zone1PrimePolicy {
    fn default() -> Self {
        Zone1PrimePolicy {
            aspect_ratio_threshold: 2.0,
            height_ratio_threshold: 1.0,
            component_area_threshold_sqft: 10.0,
            required_aspect_with_height: 1.5,
            increase_steps: vec![
                IncreaseStep { min_aspect_ratio: 3.0, increase_percent: 30.0 },
                IncreaseStep { min_aspect_ratio: 2.5, increase_percent: 25.0 },
                IncreaseStep { min_aspect_ratio: 2.0, increase_percent: 20.0 },
            ],
            height_only_increase_percent: 15.0,
            exposure_bonus_percent: 5.0,
            perimeter_enhancement_aspect_ratio: 3.0,
            base_confidence: 95.0,
            borderline_confidence: 85.0,
            borderline_aspect_ratio: 1.8,
            borderline_height_ratio: 0.8,
            large_area_threshold_sqft: 100.0,
            large_area_confidence_penalty: 5.0,
            review_increase_percent: 25.0,
            wind_tunnel_aspect_ratio: 4.0,
            additional_analysis_height_ratio: 2.0,
        }
    }
}

impl Zone1PrimePolicy {
    pub fn validate(&self) -> CalcResult<()> {
        positive("zone1_prime.aspect_ratio_threshold", self.aspect_ratio_threshold)?;
        positive("zone1_prime.height_ratio_threshold", self.height_ratio_threshold)?;
        for pair in self.increase_steps.windows(2) {
            if pair[0].min_aspect_ratio <= pair[1].min_aspect_ratio {
                return Err(CalcError::configuration(
                    "zone1_prime.increase_steps",
                    "Steps must be ordered by strictly decreasing min_aspect_ratio",
                ));
            }
        }
        for step in &self.increase_steps {
            non_negative("zone1_prime.increase_steps.increase_percent", step.increase_percent)?;
        }
        non_negative("zone1_prime.height_only_increase_percent", self.height_only_increase_percent)?;
        non_negative("zone1_prime.exposure_bonus_percent", self.exposure_bonus_percent)?;
        if !(0.0..=100.0).contains(&self.base_confidence)
            || !(0.0..=100.0).contains(&self.borderline_confidence)
        {
            return Err(CalcError::configuration(
                "zone1_prime.base_confidence",
                "Confidence values must be within 0-100",
            ));
        }
        Ok(())
    }

    /// Stepped increase for an aspect ratio, `None` when no step applies
    pub fn step_increase(&self, aspect_ratio: f64) -> Option<f64> {
        self.increase_steps
            .iter()
            .find(|step| aspect_ratio >= step.min_aspect_ratio)
            .map(|step| step.increase_percent)
    }
}

// ============================================================================
// Velocity Pressure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityPolicy {
    /// Heights below this are evaluated at this height. Zero (the default)
    /// evaluates Kz at the actual mean roof height.
    pub minimum_height_ft: f64,
}

/// Lower bound of ASCE 7 Table 26.10-1
pub const CODE_MINIMUM_HEIGHT_FT: f64 = 15.0;

impl VelocityPolicy {
    /// Evaluate heights below 15 ft at 15 ft, as the Kz table does.
    pub fn code_minimum() -> Self {
        VelocityPolicy {
            minimum_height_ft: CODE_MINIMUM_HEIGHT_FT,
        }
    }
}

impl Default for VelocityPolicy {
    fn default() -> Self {
        VelocityPolicy { minimum_height_ft: 0.0 }
    }
}

// ============================================================================
// Cache and Workflow
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub default_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: 100,
            default_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub history_limit: usize,
    pub event_log_limit: usize,
    /// Progress updates are clamped to this value until the result arrives
    pub progress_ceiling: u8,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            history_limit: 10,
            event_log_limit: 100,
            progress_ceiling: 90,
        }
    }
}

// ============================================================================
// Engine Policy
// ============================================================================

/// All policy groups, loadable from TOML with environment overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginePolicy {
    pub zone_sizing: ZoneSizingPolicy,
    pub reentrant_corner: ReentrantCornerPolicy,
    pub zone1_prime: Zone1PrimePolicy,
    pub velocity: VelocityPolicy,
    pub cache: CacheConfig,
    pub workflow: WorkflowConfig,
}

impl EnginePolicy {
    /// Parse a policy from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> CalcResult<Self> {
        let policy: EnginePolicy = toml::from_str(content).map_err(|e| {
            CalcError::configuration("file", format!("Failed to parse TOML: {}", e))
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load a policy file from disk.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> CalcResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            CalcError::configuration(
                "file",
                format!("Failed to read {}: {}", path.as_ref().display(), e),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `WINDCALC_*` environment overrides for the runtime knobs.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = env::var("WINDCALC_CACHE_CAPACITY") {
            match raw.parse::<usize>() {
                Ok(capacity) if capacity > 0 => self.cache.capacity = capacity,
                _ => tracing::warn!(
                    "Invalid WINDCALC_CACHE_CAPACITY value '{}': expected positive integer",
                    raw
                ),
            }
        }

        if let Ok(raw) = env::var("WINDCALC_CACHE_TTL_SECS") {
            match raw.parse::<i64>() {
                Ok(ttl) if ttl > 0 => self.cache.default_ttl_secs = ttl,
                _ => tracing::warn!(
                    "Invalid WINDCALC_CACHE_TTL_SECS value '{}': expected positive seconds",
                    raw
                ),
            }
        }

        if let Ok(raw) = env::var("WINDCALC_HISTORY_LIMIT") {
            match raw.parse::<usize>() {
                Ok(limit) => self.workflow.history_limit = limit,
                Err(_) => tracing::warn!(
                    "Invalid WINDCALC_HISTORY_LIMIT value '{}': expected integer",
                    raw
                ),
            }
        }

        self
    }

    pub fn validate(&self) -> CalcResult<()> {
        self.zone_sizing.validate()?;
        self.reentrant_corner.validate()?;
        self.zone1_prime.validate()?;
        non_negative("velocity.minimum_height_ft", self.velocity.minimum_height_ft)?;
        if self.cache.capacity == 0 {
            return Err(CalcError::configuration("cache.capacity", "Capacity must be at least 1"));
        }
        if self.cache.default_ttl_secs <= 0 {
            return Err(CalcError::configuration(
                "cache.default_ttl_secs",
                "TTL must be positive",
            ));
        }
        if self.workflow.progress_ceiling > 100 {
            return Err(CalcError::configuration(
                "workflow.progress_ceiling",
                "Progress ceiling must be within 0-100",
            ));
        }
        Ok(())
    }
}

fn positive(key: &str, value: f64) -> CalcResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CalcError::configuration(key, format!("{} must be positive", value)));
    }
    Ok(())
}

/// Zone widths on both sides of a footprint must leave an interior.
fn below_half(key: &str, value: f64) -> CalcResult<()> {
    if value >= 0.5 {
        return Err(CalcError::configuration(
            key,
            format!("{} must be below 0.5 of the least dimension", value),
        ));
    }
    Ok(())
}

fn non_negative(key: &str, value: f64) -> CalcResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CalcError::configuration(key, format!("{} must not be negative", value)));
    }
    Ok(())
}
