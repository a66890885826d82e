//! # Pressure Coefficients
//!
//! Resolves external (GCp) and internal (GCpi) pressure coefficients.
//!
//! External coefficients come from a table supplied by the caller (the
//! persistence layer owns the actual ASCE figure values). Each row covers an
//! effective-wind-area range:
//!
//! ```json
//! [
//!   { "areaMin": 0.0,  "areaMax": 10.0, "gcp_field": -1.7, "gcp_perimeter": -2.3, "gcp_corner": -3.2 },
//!   { "areaMin": 20.0, "areaMax": 50.0, "gcp_field": -1.5, "gcp_perimeter": -2.0, "gcp_corner": -2.6 }
//! ]
//! ```
//!
//! ## Resolution Order
//!
//! 1. **Exact**: a row whose `[areaMin, areaMax]` contains the area
//! 2. **Interpolated**: the area falls in a gap between two rows; each
//!    coefficient is interpolated linearly across the gap
//! 3. **Clamped**: the area is below the first row or above the last row
//! 4. **Fallback**: the table is empty; conservative small-area values are used
//!
//! Anything other than an exact hit is a lookup miss and is reported as a
//! low-confidence warning on the final result.
//!
//! A valid table never lets |GCp| grow with area, and every resolution
//! method preserves that ordering.

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::geometry::ZoneType;
use crate::parameters::{AsceEdition, EnclosureClassification};

/// Conservative coefficients used when no table data is available
/// (ASCE 7-16 Fig. 30.3-2A, 10 sq ft).
pub const FALLBACK_COEFFICIENTS: ExternalCoefficients = ExternalCoefficients {
    field: -1.7,
    perimeter: -2.3,
    corner: -3.2,
};

// ============================================================================
// Table
// ============================================================================

/// One effective-area band of an external coefficient table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    #[serde(rename = "areaMin", alias = "area_min")]
    pub area_min: f64,
    #[serde(rename = "areaMax", alias = "area_max")]
    pub area_max: f64,
    pub gcp_field: f64,
    pub gcp_perimeter: f64,
    pub gcp_corner: f64,
}

impl CoefficientRow {
    pub fn new(area_min: f64, area_max: f64, field: f64, perimeter: f64, corner: f64) -> Self {
        CoefficientRow {
            area_min,
            area_max,
            gcp_field: field,
            gcp_perimeter: perimeter,
            gcp_corner: corner,
        }
    }

    fn contains(&self, area: f64) -> bool {
        area >= self.area_min && area <= self.area_max
    }

    fn coefficients(&self) -> ExternalCoefficients {
        ExternalCoefficients {
            field: self.gcp_field,
            perimeter: self.gcp_perimeter,
            corner: self.gcp_corner,
        }
    }
}

fn default_roof_type() -> String {
    "flat".to_string()
}

/// Externally supplied coefficient table, rows sorted ascending by `areaMin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientTable {
    #[serde(default = "default_roof_type")]
    pub roof_type: String,
    /// Edition the values were taken from, if known
    #[serde(default)]
    pub edition: Option<AsceEdition>,
    pub rows: Vec<CoefficientRow>,
}

impl CoefficientTable {
    pub fn new(rows: Vec<CoefficientRow>) -> Self {
        CoefficientTable {
            roof_type: default_roof_type(),
            edition: None,
            rows,
        }
    }

    pub fn with_edition(mut self, edition: AsceEdition) -> Self {
        self.edition = Some(edition);
        self
    }

    /// Parse either a bare row array or a full table object.
    pub fn from_json(json: &str) -> CalcResult<Self> {
        if let Ok(rows) = serde_json::from_str::<Vec<CoefficientRow>>(json) {
            return Ok(CoefficientTable::new(rows));
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Check ordering, signs and monotonicity.
    pub fn validate(&self) -> CalcResult<()> {
        for (i, row) in self.rows.iter().enumerate() {
            let field = |name: &str| format!("rows[{}].{}", i, name);
            if !row.area_min.is_finite() || row.area_min < 0.0 {
                return Err(CalcError::invalid_input(
                    field("areaMin"),
                    row.area_min.to_string(),
                    "Area bounds must be non-negative",
                ));
            }
            if !row.area_max.is_finite() || row.area_max < row.area_min {
                return Err(CalcError::invalid_input(
                    field("areaMax"),
                    row.area_max.to_string(),
                    "areaMax must not be below areaMin",
                ));
            }
            for (name, value) in [
                ("gcp_field", row.gcp_field),
                ("gcp_perimeter", row.gcp_perimeter),
                ("gcp_corner", row.gcp_corner),
            ] {
                if !value.is_finite() || value > 0.0 {
                    return Err(CalcError::invalid_input(
                        field(name),
                        value.to_string(),
                        "External coefficients must be suction (<= 0)",
                    ));
                }
            }
        }

        for (i, pair) in self.rows.windows(2).enumerate() {
            let (lo, hi) = (&pair[0], &pair[1]);
            if hi.area_min < lo.area_max {
                return Err(CalcError::invalid_input(
                    format!("rows[{}].areaMin", i + 1),
                    hi.area_min.to_string(),
                    "Rows must be sorted by area and must not overlap",
                ));
            }
            if hi.gcp_field < lo.gcp_field
                || hi.gcp_perimeter < lo.gcp_perimeter
                || hi.gcp_corner < lo.gcp_corner
            {
                return Err(CalcError::invalid_input(
                    format!("rows[{}]", i + 1),
                    format!("{:?}", hi),
                    "Coefficient magnitude must not increase with effective area",
                ));
            }
        }
        Ok(())
    }
}

/// Illustrative low-slope roof table shaped like ASCE 7-16 Fig. 30.3-2A.
///
/// Intended for demos and tests; production callers supply their own rows.
pub fn illustrative_roof_table() -> CoefficientTable {
    CoefficientTable::new(vec![
        CoefficientRow::new(0.0, 10.0, -1.7, -2.3, -3.2),
        CoefficientRow::new(20.0, 50.0, -1.5, -2.0, -2.6),
        CoefficientRow::new(100.0, 200.0, -1.3, -1.7, -2.0),
        CoefficientRow::new(500.0, 1_000_000.0, -1.0, -1.4, -1.5),
    ])
}

// ============================================================================
// Resolution
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalCoefficients {
    pub field: f64,
    pub perimeter: f64,
    pub corner: f64,
}

impl ExternalCoefficients {
    fn lerp(a: &ExternalCoefficients, b: &ExternalCoefficients, t: f64) -> Self {
        let mix = |x: f64, y: f64| x + t * (y - x);
        ExternalCoefficients {
            field: mix(a.field, b.field),
            perimeter: mix(a.perimeter, b.perimeter),
            corner: mix(a.corner, b.corner),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Interpolated,
    Clamped,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCoefficients {
    pub effective_area_sqft: f64,
    pub coefficients: ExternalCoefficients,
    pub method: ResolutionMethod,
    pub confidence: Confidence,
}

impl ResolvedCoefficients {
    /// GCp for a zone type. Re-entrant corners scale the corner value.
    pub fn for_zone(&self, zone_type: ZoneType, reentrant_multiplier: f64) -> f64 {
        match zone_type {
            ZoneType::Field | ZoneType::FieldPrime => self.coefficients.field,
            ZoneType::Perimeter => self.coefficients.perimeter,
            ZoneType::Corner => self.coefficients.corner,
            ZoneType::ReentrantCorner => self.coefficients.corner * reentrant_multiplier,
        }
    }

    /// True when the area had no exact row
    pub fn is_lookup_miss(&self) -> bool {
        self.method != ResolutionMethod::Exact
    }
}

/// Resolves coefficients from a validated table.
#[derive(Debug, Clone, Copy)]
pub struct CoefficientResolver<'a> {
    table: &'a CoefficientTable,
}

impl<'a> CoefficientResolver<'a> {
    /// Validate the table once and wrap it.
    pub fn new(table: &'a CoefficientTable) -> CalcResult<Self> {
        table.validate()?;
        Ok(CoefficientResolver { table })
    }

    pub fn table(&self) -> &CoefficientTable {
        self.table
    }

    /// Resolve all three external coefficients at an effective area.
    ///
    /// # Example
    ///
    /// ```rust
    /// use wind_core::pressure::coefficients::{
    ///     illustrative_roof_table, CoefficientResolver, ResolutionMethod,
    /// };
    ///
    /// let table = illustrative_roof_table();
    /// let resolver = CoefficientResolver::new(&table).unwrap();
    ///
    /// // 15 sq ft sits halfway between the 10 and 20 sq ft rows
    /// let resolved = resolver.resolve(15.0).unwrap();
    /// assert_eq!(resolved.method, ResolutionMethod::Interpolated);
    /// assert!((resolved.coefficients.field - (-1.6)).abs() < 1e-9);
    /// ```
    pub fn resolve(&self, effective_area_sqft: f64) -> CalcResult<ResolvedCoefficients> {
        if !effective_area_sqft.is_finite() || effective_area_sqft <= 0.0 {
            return Err(CalcError::invalid_input(
                "effective_area_sqft",
                effective_area_sqft.to_string(),
                "Effective wind area must be positive",
            ));
        }

        let rows = &self.table.rows;
        let resolved = |coefficients, method, confidence| ResolvedCoefficients {
            effective_area_sqft,
            coefficients,
            method,
            confidence,
        };

        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            tracing::warn!(
                area = effective_area_sqft,
                "coefficient table is empty; using conservative fallback"
            );
            return Ok(resolved(FALLBACK_COEFFICIENTS, ResolutionMethod::Fallback, Confidence::Low));
        };

        if let Some(row) = rows.iter().find(|row| row.contains(effective_area_sqft)) {
            return Ok(resolved(row.coefficients(), ResolutionMethod::Exact, Confidence::High));
        }

        if effective_area_sqft < first.area_min {
            return Ok(resolved(first.coefficients(), ResolutionMethod::Clamped, Confidence::Medium));
        }
        if effective_area_sqft > last.area_max {
            return Ok(resolved(last.coefficients(), ResolutionMethod::Clamped, Confidence::Medium));
        }

        for pair in rows.windows(2) {
            let (lo, hi) = (&pair[0], &pair[1]);
            if effective_area_sqft > lo.area_max && effective_area_sqft < hi.area_min {
                let t = (effective_area_sqft - lo.area_max) / (hi.area_min - lo.area_max);
                let coefficients = ExternalCoefficients::lerp(&lo.coefficients(), &hi.coefficients(), t);
                return Ok(resolved(coefficients, ResolutionMethod::Interpolated, Confidence::Medium));
            }
        }

        // unreachable for a validated table; stay conservative anyway
        Ok(resolved(FALLBACK_COEFFICIENTS, ResolutionMethod::Fallback, Confidence::Low))
    }
}

// ============================================================================
// Internal Pressure
// ============================================================================

/// Internal pressure coefficient pair (+GCpi, -GCpi)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InternalPressure {
    pub positive: f64,
    pub negative: f64,
}

impl InternalPressure {
    pub const NONE: InternalPressure = InternalPressure {
        positive: 0.0,
        negative: 0.0,
    };
}

/// ASCE 7 Table 26.13-1
const INTERNAL_PRESSURE_TABLE: [(EnclosureClassification, InternalPressure); 3] = [
    (
        EnclosureClassification::Enclosed,
        InternalPressure { positive: 0.18, negative: -0.18 },
    ),
    (
        EnclosureClassification::PartiallyEnclosed,
        InternalPressure { positive: 0.55, negative: -0.55 },
    ),
    (EnclosureClassification::Open, InternalPressure::NONE),
];

/// GCpi for an enclosure classification.
pub fn internal_pressure(classification: EnclosureClassification) -> InternalPressure {
    INTERNAL_PRESSURE_TABLE
        .iter()
        .find(|(c, _)| *c == classification)
        .map(|(_, gcpi)| *gcpi)
        .unwrap_or(InternalPressure::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolve(area: f64) -> ResolvedCoefficients {
        let table = illustrative_roof_table();
        let resolver = CoefficientResolver::new(&table).unwrap();
        resolver.resolve(area).unwrap()
    }

    #[test]
    fn test_exact_match() {
        let resolved = resolve(35.0);
        assert_eq!(resolved.method, ResolutionMethod::Exact);
        assert_eq!(resolved.confidence, Confidence::High);
        assert_eq!(resolved.coefficients.corner, -2.6);
        assert!(!resolved.is_lookup_miss());
    }

    #[test]
    fn test_row_boundaries_are_inclusive() {
        assert_eq!(resolve(10.0).method, ResolutionMethod::Exact);
        assert_eq!(resolve(20.0).coefficients.field, -1.5);
    }

    #[test]
    fn test_gap_interpolation() {
        // 75 sq ft is halfway between 50 and 100
        let resolved = resolve(75.0);
        assert_eq!(resolved.method, ResolutionMethod::Interpolated);
        assert!((resolved.coefficients.field - (-1.4)).abs() < 1e-9);
        assert!((resolved.coefficients.perimeter - (-1.85)).abs() < 1e-9);
        assert!((resolved.coefficients.corner - (-2.3)).abs() < 1e-9);
        assert!(resolved.is_lookup_miss());
    }

    #[test]
    fn test_clamping_outside_table() {
        let table = CoefficientTable::new(vec![
            CoefficientRow::new(10.0, 100.0, -1.5, -2.0, -2.5),
            CoefficientRow::new(200.0, 500.0, -1.0, -1.2, -1.4),
        ]);
        let resolver = CoefficientResolver::new(&table).unwrap();

        let below = resolver.resolve(2.0).unwrap();
        assert_eq!(below.method, ResolutionMethod::Clamped);
        assert_eq!(below.coefficients.corner, -2.5);

        let above = resolver.resolve(10_000.0).unwrap();
        assert_eq!(above.method, ResolutionMethod::Clamped);
        assert_eq!(above.coefficients.corner, -1.4);
    }

    #[test]
    fn test_empty_table_uses_flagged_fallback() {
        let table = CoefficientTable::new(Vec::new());
        let resolved = CoefficientResolver::new(&table).unwrap().resolve(50.0).unwrap();
        assert_eq!(resolved.method, ResolutionMethod::Fallback);
        assert_eq!(resolved.confidence, Confidence::Low);
        assert_eq!(resolved.coefficients, FALLBACK_COEFFICIENTS);
    }

    #[test]
    fn test_zone_mapping() {
        let resolved = resolve(5.0);
        assert_eq!(resolved.for_zone(ZoneType::Field, 1.2), -1.7);
        assert_eq!(resolved.for_zone(ZoneType::FieldPrime, 1.2), -1.7);
        assert_eq!(resolved.for_zone(ZoneType::Perimeter, 1.2), -2.3);
        assert_eq!(resolved.for_zone(ZoneType::Corner, 1.2), -3.2);
        assert!((resolved.for_zone(ZoneType::ReentrantCorner, 1.2) - (-3.84)).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_tables_rejected() {
        let overlapping = CoefficientTable::new(vec![
            CoefficientRow::new(0.0, 50.0, -1.7, -2.3, -3.2),
            CoefficientRow::new(20.0, 100.0, -1.5, -2.0, -2.6),
        ]);
        assert!(CoefficientResolver::new(&overlapping).is_err());

        let increasing = CoefficientTable::new(vec![
            CoefficientRow::new(0.0, 10.0, -1.0, -2.3, -3.2),
            CoefficientRow::new(20.0, 100.0, -1.5, -2.0, -2.6),
        ]);
        assert!(CoefficientResolver::new(&increasing).is_err());

        let positive = CoefficientTable::new(vec![CoefficientRow::new(0.0, 10.0, 0.3, -2.3, -3.2)]);
        assert!(CoefficientResolver::new(&positive).is_err());
    }

    #[test]
    fn test_non_positive_area_rejected() {
        let table = illustrative_roof_table();
        let resolver = CoefficientResolver::new(&table).unwrap();
        assert!(resolver.resolve(0.0).is_err());
        assert!(resolver.resolve(f64::NAN).is_err());
    }

    #[test]
    fn test_table_json_formats() {
        let bare = r#"[{ "areaMin": 0.0, "areaMax": 10.0, "gcp_field": -1.7, "gcp_perimeter": -2.3, "gcp_corner": -3.2 }]"#;
        let table = CoefficientTable::from_json(bare).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.roof_type, "flat");

        let full = r#"{ "roof_type": "gable", "edition": "7-16",
            "rows": [{ "area_min": 0.0, "area_max": 10.0, "gcp_field": -1.0, "gcp_perimeter": -1.8, "gcp_corner": -2.8 }] }"#;
        let table = CoefficientTable::from_json(full).unwrap();
        assert_eq!(table.edition, Some(AsceEdition::Asce7_16));
        assert_eq!(table.rows[0].gcp_corner, -2.8);
    }

    #[test]
    fn test_internal_pressure_table() {
        let enclosed = internal_pressure(EnclosureClassification::Enclosed);
        assert_eq!((enclosed.positive, enclosed.negative), (0.18, -0.18));
        let partial = internal_pressure(EnclosureClassification::PartiallyEnclosed);
        assert_eq!((partial.positive, partial.negative), (0.55, -0.55));
        assert_eq!(internal_pressure(EnclosureClassification::Open), InternalPressure::NONE);
    }

    /// Valid tables: increasing disjoint area bands, coefficients rising toward zero.
    fn valid_table() -> impl Strategy<Value = CoefficientTable> {
        prop::collection::vec(
            (0.0f64..50.0, 0.0f64..100.0, 0.0f64..0.3, 0.0f64..0.3, 0.0f64..0.3),
            1..6,
        )
        .prop_map(|steps| {
            let mut area = 0.0;
            let (mut field, mut perimeter, mut corner) = (-2.0, -3.0, -4.0);
            let rows = steps
                .into_iter()
                .map(|(gap, span, df, dp, dc)| {
                    let area_min = area + gap;
                    let area_max = area_min + span;
                    area = area_max;
                    field = (field + df).min(0.0);
                    perimeter = (perimeter + dp).min(0.0);
                    corner = (corner + dc).min(0.0);
                    CoefficientRow::new(area_min, area_max, field, perimeter, corner)
                })
                .collect();
            CoefficientTable::new(rows)
        })
    }

    proptest! {
        #[test]
        fn prop_gcp_magnitude_never_increases_with_area(
            table in valid_table(),
            a in 0.01f64..1000.0,
            b in 0.01f64..1000.0,
        ) {
            let resolver = CoefficientResolver::new(&table).unwrap();
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let lo = resolver.resolve(small).unwrap().coefficients;
            let hi = resolver.resolve(large).unwrap().coefficients;
            prop_assert!(hi.field.abs() <= lo.field.abs() + 1e-12);
            prop_assert!(hi.perimeter.abs() <= lo.perimeter.abs() + 1e-12);
            prop_assert!(hi.corner.abs() <= lo.corner.abs() + 1e-12);
        }
    }
}
