//! # Wind Parameters
//!
//! Caller-supplied value objects describing the wind climate and the building's
//! code classification. These are immutable for the duration of one calculation.
//!
//! ## JSON Example
//!
//! ```json
//! {
//!   "geometry": { "shape": "rectangle", "length": 100.0, "width": 80.0, "height": 30.0 },
//!   "wind": {
//!     "basic_wind_speed_mph": 120.0,
//!     "exposure_category": "C",
//!     "asce_edition": "7-22",
//!     "risk_category": "II",
//!     "building_classification": "enclosed"
//!   },
//!   "effective_wind_area_sqft": 10.0,
//!   "location": { "city": "Tampa", "state": "FL" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::geometry::BuildingGeometry;

// ============================================================================
// Code Classifications
// ============================================================================

/// Terrain exposure category (ASCE 7 Section 26.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExposureCategory {
    /// Urban and suburban areas, wooded terrain
    B,
    /// Open terrain with scattered obstructions
    #[default]
    C,
    /// Flat, unobstructed areas and water surfaces
    D,
}

impl ExposureCategory {
    pub const ALL: [ExposureCategory; 3] =
        [ExposureCategory::B, ExposureCategory::C, ExposureCategory::D];

    pub fn code(&self) -> &'static str {
        match self {
            ExposureCategory::B => "B",
            ExposureCategory::C => "C",
            ExposureCategory::D => "D",
        }
    }

    /// Parse from common string representations ("C", "exp c", "Exposure C")
    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        let normalized = s.trim().to_uppercase().replace("EXPOSURE", "").replace("EXP", "");
        match normalized.trim() {
            "B" => Ok(ExposureCategory::B),
            "C" => Ok(ExposureCategory::C),
            "D" => Ok(ExposureCategory::D),
            _ => Err(CalcError::invalid_input(
                "exposure_category",
                s,
                "Exposure must be B, C or D",
            )),
        }
    }

    /// Open exposures where wind reaches the building with little shielding
    pub fn is_open_terrain(&self) -> bool {
        matches!(self, ExposureCategory::C | ExposureCategory::D)
    }
}

impl std::fmt::Display for ExposureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Exposure {}", self.code())
    }
}

/// ASCE 7 edition used for the calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AsceEdition {
    #[serde(rename = "7-10")]
    Asce7_10,
    #[serde(rename = "7-16")]
    Asce7_16,
    #[default]
    #[serde(rename = "7-22")]
    Asce7_22,
}

impl AsceEdition {
    pub const ALL: [AsceEdition; 3] = [
        AsceEdition::Asce7_10,
        AsceEdition::Asce7_16,
        AsceEdition::Asce7_22,
    ];

    pub fn year(&self) -> u16 {
        match self {
            AsceEdition::Asce7_10 => 2010,
            AsceEdition::Asce7_16 => 2016,
            AsceEdition::Asce7_22 => 2022,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AsceEdition::Asce7_10 => "ASCE 7-10",
            AsceEdition::Asce7_16 => "ASCE 7-16",
            AsceEdition::Asce7_22 => "ASCE 7-22",
        }
    }

    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        let normalized = s.trim().to_uppercase().replace("ASCE", "").replace([' ', '_'], "");
        match normalized.as_str() {
            "7-10" | "710" | "10" | "2010" => Ok(AsceEdition::Asce7_10),
            "7-16" | "716" | "16" | "2016" => Ok(AsceEdition::Asce7_16),
            "7-22" | "722" | "22" | "2022" => Ok(AsceEdition::Asce7_22),
            _ => Err(CalcError::invalid_input(
                "asce_edition",
                s,
                "Edition must be 7-10, 7-16 or 7-22",
            )),
        }
    }
}

impl std::fmt::Display for AsceEdition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Risk category (ASCE 7 Table 1.5-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RiskCategory {
    I,
    #[default]
    II,
    III,
    IV,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 4] = [
        RiskCategory::I,
        RiskCategory::II,
        RiskCategory::III,
        RiskCategory::IV,
    ];

    /// Wind importance factor Iw
    pub fn importance_factor(&self) -> f64 {
        match self {
            RiskCategory::I => 0.87,
            RiskCategory::II => 1.0,
            RiskCategory::III | RiskCategory::IV => 1.15,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RiskCategory::I => "I",
            RiskCategory::II => "II",
            RiskCategory::III => "III",
            RiskCategory::IV => "IV",
        }
    }

    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        match s.trim().to_uppercase().replace("RISK", "").replace("CATEGORY", "").trim() {
            "I" | "1" => Ok(RiskCategory::I),
            "II" | "2" => Ok(RiskCategory::II),
            "III" | "3" => Ok(RiskCategory::III),
            "IV" | "4" => Ok(RiskCategory::IV),
            _ => Err(CalcError::invalid_input(
                "risk_category",
                s,
                "Risk category must be I, II, III or IV",
            )),
        }
    }
}

/// Enclosure classification governing internal pressure (ASCE 7 Section 26.12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnclosureClassification {
    #[default]
    Enclosed,
    PartiallyEnclosed,
    Open,
}

impl EnclosureClassification {
    pub const ALL: [EnclosureClassification; 3] = [
        EnclosureClassification::Enclosed,
        EnclosureClassification::PartiallyEnclosed,
        EnclosureClassification::Open,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            EnclosureClassification::Enclosed => "Enclosed",
            EnclosureClassification::PartiallyEnclosed => "Partially Enclosed",
            EnclosureClassification::Open => "Open",
        }
    }

    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "enclosed" => Ok(EnclosureClassification::Enclosed),
            "partially_enclosed" | "partial" => Ok(EnclosureClassification::PartiallyEnclosed),
            "open" => Ok(EnclosureClassification::Open),
            _ => Err(CalcError::invalid_input(
                "building_classification",
                s,
                "Classification must be enclosed, partially_enclosed or open",
            )),
        }
    }
}

impl std::fmt::Display for EnclosureClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Wind Parameters
// ============================================================================

fn default_topographic_factor() -> f64 {
    1.0
}

fn default_directionality_factor() -> f64 {
    0.85
}

fn default_true() -> bool {
    true
}

fn default_effective_wind_area() -> f64 {
    10.0
}

/// Wind climate and classification inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindParameters {
    /// Basic (ultimate) wind speed V in mph
    pub basic_wind_speed_mph: f64,

    pub exposure_category: ExposureCategory,

    #[serde(default)]
    pub asce_edition: AsceEdition,

    /// Topographic factor Kzt (1.0 for flat sites)
    #[serde(default = "default_topographic_factor")]
    pub topographic_factor: f64,

    /// Wind directionality factor Kd (0.85 for buildings)
    #[serde(default = "default_directionality_factor")]
    pub directionality_factor: f64,

    #[serde(default)]
    pub risk_category: RiskCategory,

    #[serde(default)]
    pub building_classification: EnclosureClassification,

    /// Include GCpi in net pressures. When false both internal cases use 0.
    #[serde(default = "default_true")]
    pub include_internal_pressure: bool,

    /// Compute both intact and breached envelope results (glazing failure)
    #[serde(default)]
    pub consider_glazing_failure: bool,
}

impl WindParameters {
    /// Parameters with code-default factors (Kzt = 1.0, Kd = 0.85, Risk II, enclosed).
    pub fn new(basic_wind_speed_mph: f64, exposure_category: ExposureCategory) -> Self {
        WindParameters {
            basic_wind_speed_mph,
            exposure_category,
            asce_edition: AsceEdition::default(),
            topographic_factor: default_topographic_factor(),
            directionality_factor: default_directionality_factor(),
            risk_category: RiskCategory::default(),
            building_classification: EnclosureClassification::default(),
            include_internal_pressure: true,
            consider_glazing_failure: false,
        }
    }

    pub fn with_edition(mut self, edition: AsceEdition) -> Self {
        self.asce_edition = edition;
        self
    }

    pub fn with_risk_category(mut self, risk: RiskCategory) -> Self {
        self.risk_category = risk;
        self
    }

    pub fn with_classification(mut self, classification: EnclosureClassification) -> Self {
        self.building_classification = classification;
        self
    }

    pub fn with_glazing_failure(mut self, enabled: bool) -> Self {
        self.consider_glazing_failure = enabled;
        self
    }

    pub fn validate(&self) -> CalcResult<()> {
        if !self.basic_wind_speed_mph.is_finite() || self.basic_wind_speed_mph <= 0.0 {
            return Err(CalcError::invalid_input(
                "basic_wind_speed_mph",
                self.basic_wind_speed_mph.to_string(),
                "Wind speed must be positive",
            ));
        }
        if !self.topographic_factor.is_finite() || self.topographic_factor <= 0.0 {
            return Err(CalcError::invalid_input(
                "topographic_factor",
                self.topographic_factor.to_string(),
                "Kzt must be positive",
            ));
        }
        if !self.directionality_factor.is_finite()
            || self.directionality_factor <= 0.0
            || self.directionality_factor > 1.0
        {
            return Err(CalcError::invalid_input(
                "directionality_factor",
                self.directionality_factor.to_string(),
                "Kd must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Calculation Request
// ============================================================================

/// Site location, used only to distinguish cached results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLocation {
    pub city: String,
    pub state: String,
}

impl SiteLocation {
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        SiteLocation {
            city: city.into(),
            state: state.into(),
        }
    }
}

/// Everything the engine needs for one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub geometry: BuildingGeometry,

    pub wind: WindParameters,

    /// Component effective wind area in sq ft. Each zone resolves its
    /// coefficients at `min(effective_wind_area_sqft, zone area)`.
    #[serde(default = "default_effective_wind_area")]
    pub effective_wind_area_sqft: f64,

    #[serde(default)]
    pub location: Option<SiteLocation>,

    #[serde(default)]
    pub professional_mode: bool,
}

impl CalculationRequest {
    pub fn new(geometry: BuildingGeometry, wind: WindParameters) -> Self {
        CalculationRequest {
            geometry,
            wind,
            effective_wind_area_sqft: default_effective_wind_area(),
            location: None,
            professional_mode: false,
        }
    }

    pub fn with_effective_area(mut self, area_sqft: f64) -> Self {
        self.effective_wind_area_sqft = area_sqft;
        self
    }

    pub fn with_location(mut self, location: SiteLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_professional_mode(mut self, enabled: bool) -> Self {
        self.professional_mode = enabled;
        self
    }

    /// Validate geometry, wind parameters and effective area.
    pub fn validate(&self) -> CalcResult<()> {
        self.geometry.validate()?;
        self.wind.validate()?;
        if !self.effective_wind_area_sqft.is_finite() || self.effective_wind_area_sqft <= 0.0 {
            return Err(CalcError::invalid_input(
                "effective_wind_area_sqft",
                self.effective_wind_area_sqft.to_string(),
                "Effective wind area must be positive",
            ));
        }
        Ok(())
    }
}
