//! # Pressure Zone Decomposition
//!
//! Partitions a footprint into field, perimeter and corner zones per the
//! ASCE 7 components-and-cladding zone layout.
//!
//! ## Zone Width
//!
//! ```text
//! corner    = min(0.1 * least dim, 0.4 * H, corner cap)
//! perimeter = min(0.1 * least dim, 0.4 * H, perimeter cap)
//! each floored at max(0.04 * least dim, min(3 ft, 0.25 * least dim))
//! ```
//!
//! ## Rectangle Layout
//!
//! ```text
//!  +----+-----------------+----+
//!  | NW |        N        | NE |
//!  +----+-----------------+----+
//!  |    |                 |    |
//!  | W  |      field      |  E |
//!  |    |                 |    |
//!  +----+-----------------+----+
//!  | SW |        S        | SE |
//!  +----+-----------------+----+
//! ```
//!
//! Corner squares have side `corner`; strips have depth `perimeter`. The
//! corner cap is never below the perimeter cap, so when the two sizes differ
//! the field becomes a notched 12-vertex polygon and the zones still tile
//! the footprint exactly.
//!
//! L-shapes are decomposed one leg at a time. At the concave junction the
//! narrower leg's corner is reclassified as a re-entrant corner and the
//! wider leg's shared-edge strip is split so a second re-entrant zone sits
//! on the other side of the junction.

use serde::{Deserialize, Serialize};

use super::{BuildingGeometry, Point, Polygon};
use crate::errors::{CalcError, CalcResult, CalcWarning, WarningKind};
use crate::policy::{EnginePolicy, ZoneSizingPolicy};

const EPS: f64 = 1e-9;

const MAX_FLOOR_FRACTION: f64 = 0.25;

/// Maximum allowed mismatch between summed zone areas and the footprint
pub const PARTITION_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Field,
    Perimeter,
    Corner,
    ReentrantCorner,
    FieldPrime,
}

impl ZoneType {
    pub const ALL: [ZoneType; 5] = [
        ZoneType::Field,
        ZoneType::Perimeter,
        ZoneType::Corner,
        ZoneType::ReentrantCorner,
        ZoneType::FieldPrime,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ZoneType::Field => "Field (Zone 1)",
            ZoneType::Perimeter => "Perimeter (Zone 2)",
            ZoneType::Corner => "Corner (Zone 3)",
            ZoneType::ReentrantCorner => "Re-entrant Corner",
            ZoneType::FieldPrime => "Field (Zone 1')",
        }
    }

    /// Nominal GCp at a 10 sq ft effective area (ASCE 7-16 Fig. 30.3-2A,
    /// flat/gable roof). Area-dependent values come from the coefficient table.
    pub fn nominal_gcp(&self, policy: &EnginePolicy) -> f64 {
        match self {
            ZoneType::Field | ZoneType::FieldPrime => -1.7,
            ZoneType::Perimeter => -2.3,
            ZoneType::Corner => -3.2,
            ZoneType::ReentrantCorner => -3.2 * policy.reentrant_corner.coefficient_multiplier,
        }
    }

    pub fn is_corner(&self) -> bool {
        matches!(self, ZoneType::Corner | ZoneType::ReentrantCorner)
    }
}

impl std::fmt::Display for ZoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One pressure zone of a decomposed footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureZone {
    /// Stable identifier, e.g. "corner-sw" or "leg2-perimeter-n"
    pub id: String,
    pub zone_type: ZoneType,
    pub boundary: Polygon,
    /// Plan area (sq ft), always > 0
    pub area: f64,
    /// Nominal external coefficient (<= 0, suction)
    pub base_gcp: f64,
    pub is_zone1_prime: bool,
}

impl PressureZone {
    fn new(id: impl Into<String>, zone_type: ZoneType, boundary: Polygon, policy: &EnginePolicy) -> Self {
        let area = boundary.area();
        PressureZone {
            id: id.into(),
            zone_type,
            boundary,
            area,
            base_gcp: zone_type.nominal_gcp(policy),
            is_zone1_prime: zone_type == ZoneType::FieldPrime,
        }
    }

    fn reclassify(&mut self, id: impl Into<String>, zone_type: ZoneType, policy: &EnginePolicy) {
        self.id = id.into();
        self.zone_type = zone_type;
        self.base_gcp = zone_type.nominal_gcp(policy);
        self.is_zone1_prime = zone_type == ZoneType::FieldPrime;
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.boundary = self.boundary.translated(dx, dy);
    }
}

/// Zone widths for one rectangular leg (ft)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSizes {
    pub corner: f64,
    pub perimeter: f64,
}

impl ZoneSizes {
    pub fn compute(length: f64, width: f64, height: f64, policy: &ZoneSizingPolicy) -> Self {
        let least = length.min(width);
        let base = (policy.edge_fraction * least).min(policy.height_fraction * height);
        // the absolute floor never exceeds a quarter of the least dimension,
        // so narrow footprints still keep an interior field
        let floor = (policy.min_fraction * least).max(policy.min_size_ft.min(MAX_FLOOR_FRACTION * least));
        ZoneSizes {
            corner: base.min(policy.corner_cap_ft).max(floor),
            perimeter: base.min(policy.perimeter_cap_ft).max(floor),
        }
    }
}

/// Output of [`decompose`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDecomposition {
    pub zones: Vec<PressureZone>,
    /// One entry per rectangular leg (one for rectangles, two for L-shapes)
    pub sizes: Vec<ZoneSizes>,
    pub footprint_area: f64,
    pub warnings: Vec<CalcWarning>,
}

impl ZoneDecomposition {
    pub fn total_zone_area(&self) -> f64 {
        self.zones.iter().map(|z| z.area).sum()
    }

    /// Relative difference between summed zone area and footprint area
    pub fn partition_error(&self) -> f64 {
        (self.total_zone_area() - self.footprint_area).abs() / self.footprint_area
    }

    pub fn zones_of_type(&self, zone_type: ZoneType) -> impl Iterator<Item = &PressureZone> {
        self.zones.iter().filter(move |z| z.zone_type == zone_type)
    }

    pub fn find(&self, id: &str) -> Option<&PressureZone> {
        self.zones.iter().find(|z| z.id == id)
    }
}

/// Decompose a footprint into pressure zones.
///
/// # Example
///
/// ```rust
/// use wind_core::geometry::{decompose, BuildingGeometry, ZoneType};
/// use wind_core::policy::EnginePolicy;
///
/// let geometry = BuildingGeometry::rectangle(100.0, 80.0, 30.0);
/// let result = decompose(&geometry, &EnginePolicy::default()).unwrap();
///
/// assert_eq!(result.zones_of_type(ZoneType::Corner).count(), 4);
/// assert_eq!(result.zones_of_type(ZoneType::Perimeter).count(), 4);
/// assert!(result.partition_error() < 0.01);
/// ```
pub fn decompose(geometry: &BuildingGeometry, policy: &EnginePolicy) -> CalcResult<ZoneDecomposition> {
    geometry.validate()?;

    let mut warnings = Vec::new();
    let (zones, sizes) = match *geometry {
        BuildingGeometry::Rectangle { length, width, height } => {
            let sizes = ZoneSizes::compute(length, width, height, &policy.zone_sizing);
            let zones = rectangle_zones("", length, width, height, sizes, policy)?;
            (zones, vec![sizes])
        }
        BuildingGeometry::LShape {
            length1,
            width1,
            length2,
            width2,
            height,
        } => l_shape_zones(length1, width1, length2, width2, height, policy, &mut warnings)?,
    };

    let decomposition = ZoneDecomposition {
        zones,
        sizes,
        footprint_area: geometry.footprint_area(),
        warnings,
    };
    verify_partition(&decomposition)?;

    tracing::debug!(
        shape = geometry.shape_name(),
        zones = decomposition.zones.len(),
        "decomposed footprint"
    );
    Ok(decomposition)
}

fn verify_partition(decomposition: &ZoneDecomposition) -> CalcResult<()> {
    if let Some(zone) = decomposition.zones.iter().find(|z| !(z.area > 0.0)) {
        return Err(CalcError::calculation_failed(
            "zone_decomposition",
            format!("zone '{}' has non-positive area {}", zone.id, zone.area),
        ));
    }
    let error = decomposition.partition_error();
    if !(error <= PARTITION_TOLERANCE) {
        return Err(CalcError::calculation_failed(
            "zone_decomposition",
            format!(
                "zone areas sum to {:.2} sq ft but footprint is {:.2} sq ft",
                decomposition.total_zone_area(),
                decomposition.footprint_area
            ),
        ));
    }
    Ok(())
}

// ============================================================================
// Rectangle
// ============================================================================

fn rectangle_zones(
    prefix: &str,
    length: f64,
    width: f64,
    height: f64,
    sizes: ZoneSizes,
    policy: &EnginePolicy,
) -> CalcResult<Vec<PressureZone>> {
    let (l, w) = (length, width);
    let c = sizes.corner;
    let p = sizes.perimeter;

    if 2.0 * c >= l - EPS || 2.0 * c >= w - EPS {
        return Err(CalcError::calculation_failed(
            "zone_decomposition",
            format!(
                "{}zone width {:.2} ft leaves no interior on a {:.2} x {:.2} ft footprint",
                prefix, c, l, w
            ),
        ));
    }

    let id = |name: &str| format!("{}{}", prefix, name);
    let mut zones = vec![
        PressureZone::new(id("corner-sw"), ZoneType::Corner, Polygon::rectangle(0.0, 0.0, c, c), policy),
        PressureZone::new(id("corner-se"), ZoneType::Corner, Polygon::rectangle(l - c, 0.0, l, c), policy),
        PressureZone::new(id("corner-ne"), ZoneType::Corner, Polygon::rectangle(l - c, w - c, l, w), policy),
        PressureZone::new(id("corner-nw"), ZoneType::Corner, Polygon::rectangle(0.0, w - c, c, w), policy),
        PressureZone::new(id("perimeter-s"), ZoneType::Perimeter, Polygon::rectangle(c, 0.0, l - c, p), policy),
        PressureZone::new(id("perimeter-e"), ZoneType::Perimeter, Polygon::rectangle(l - p, c, l, w - c), policy),
        PressureZone::new(id("perimeter-n"), ZoneType::Perimeter, Polygon::rectangle(c, w - p, l - c, w), policy),
        PressureZone::new(id("perimeter-w"), ZoneType::Perimeter, Polygon::rectangle(0.0, c, p, w - c), policy),
    ];

    if (c - p).abs() < EPS {
        let band = policy
            .zone_sizing
            .field_prime_band_ft_per_height
            .map(|factor| factor * height);
        zones.extend(field_zones(prefix, p, l, w, band, policy));
    } else {
        // corners are deeper than the strips; notch the field around them
        let field = Polygon::new(vec![
            Point::new(c, p),
            Point::new(l - c, p),
            Point::new(l - c, c),
            Point::new(l - p, c),
            Point::new(l - p, w - c),
            Point::new(l - c, w - c),
            Point::new(l - c, w - p),
            Point::new(c, w - p),
            Point::new(c, w - c),
            Point::new(p, w - c),
            Point::new(p, c),
            Point::new(c, c),
        ]);
        zones.push(PressureZone::new(id("field"), ZoneType::Field, field, policy));
    }

    Ok(zones)
}

/// Interior field, optionally split into a field ring and a Zone 1' core.
fn field_zones(
    prefix: &str,
    p: f64,
    l: f64,
    w: f64,
    band: Option<f64>,
    policy: &EnginePolicy,
) -> Vec<PressureZone> {
    let id = |name: &str| format!("{}{}", prefix, name);
    let (x0, y0, x1, y1) = (p, p, l - p, w - p);

    let band = match band {
        Some(b) if x1 - x0 > 2.0 * b + EPS && y1 - y0 > 2.0 * b + EPS => b,
        _ => {
            return vec![PressureZone::new(
                id("field"),
                ZoneType::Field,
                Polygon::rectangle(x0, y0, x1, y1),
                policy,
            )]
        }
    };

    vec![
        PressureZone::new(id("field-s"), ZoneType::Field, Polygon::rectangle(x0, y0, x1, y0 + band), policy),
        PressureZone::new(id("field-n"), ZoneType::Field, Polygon::rectangle(x0, y1 - band, x1, y1), policy),
        PressureZone::new(
            id("field-w"),
            ZoneType::Field,
            Polygon::rectangle(x0, y0 + band, x0 + band, y1 - band),
            policy,
        ),
        PressureZone::new(
            id("field-e"),
            ZoneType::Field,
            Polygon::rectangle(x1 - band, y0 + band, x1, y1 - band),
            policy,
        ),
        PressureZone::new(
            id("field-prime"),
            ZoneType::FieldPrime,
            Polygon::rectangle(x0 + band, y0 + band, x1 - band, y1 - band),
            policy,
        ),
    ]
}

// ============================================================================
// L-Shape
// ============================================================================

fn l_shape_zones(
    length1: f64,
    width1: f64,
    length2: f64,
    width2: f64,
    height: f64,
    policy: &EnginePolicy,
    warnings: &mut Vec<CalcWarning>,
) -> CalcResult<(Vec<PressureZone>, Vec<ZoneSizes>)> {
    let sizes1 = ZoneSizes::compute(length1, width1, height, &policy.zone_sizing);
    let sizes2 = ZoneSizes::compute(length2, width2, height, &policy.zone_sizing);

    let mut leg1 = rectangle_zones("leg1-", length1, width1, height, sizes1, policy)?;
    let mut leg2 = rectangle_zones("leg2-", length2, width2, height, sizes2, policy)?;
    for zone in &mut leg2 {
        zone.translate(0.0, width1);
    }

    let area1 = length1 * width1;
    let area2 = length2 * width2;
    let leg_ratio = area1.max(area2) / area1.min(area2);
    if leg_ratio > policy.reentrant_corner.degenerate_leg_area_ratio {
        warnings.push(CalcWarning::new(
            WarningKind::DegenerateGeometry,
            format!(
                "L-shape legs differ in area by a factor of {:.1}; zone layout may not reflect the actual envelope",
                leg_ratio
            ),
        ));
    }

    let junction_x = length1.min(length2);
    if (length1 - length2).abs() < EPS {
        warnings.push(CalcWarning::new(
            WarningKind::DegenerateGeometry,
            "L-shape legs have equal length; footprint is rectangular and has no re-entrant corner",
        ));
    } else if length2 < length1 {
        // leg 2 is narrower: its south-east corner touches the junction
        reclassify_corner(&mut leg2, "leg2-corner-se", "leg2-reentrant-corner", policy);
        split_shared_strip(&mut leg1, "leg1-perimeter-n", junction_x, sizes1, length1, policy);
    } else {
        reclassify_corner(&mut leg1, "leg1-corner-ne", "leg1-reentrant-corner", policy);
        split_shared_strip(&mut leg2, "leg2-perimeter-s", junction_x, sizes2, length2, policy);
    }

    leg1.extend(leg2);
    Ok((leg1, vec![sizes1, sizes2]))
}

fn reclassify_corner(zones: &mut [PressureZone], id: &str, new_id: &str, policy: &EnginePolicy) {
    if let Some(zone) = zones.iter_mut().find(|z| z.id == id) {
        zone.reclassify(new_id, ZoneType::ReentrantCorner, policy);
    }
}

/// Split the wider leg's strip along the junction edge at `junction_x`,
/// carving a re-entrant zone immediately past the concave vertex.
fn split_shared_strip(
    zones: &mut Vec<PressureZone>,
    strip_id: &str,
    junction_x: f64,
    sizes: ZoneSizes,
    leg_length: f64,
    policy: &EnginePolicy,
) {
    let strip_start = sizes.corner;
    let strip_end = leg_length - sizes.corner;
    if junction_x <= strip_start + EPS || junction_x >= strip_end - EPS {
        // junction falls inside a corner square of the wider leg
        return;
    }

    let Some(index) = zones.iter().position(|z| z.id == strip_id) else {
        return;
    };
    let strip = zones.remove(index);
    let Some((lo, hi)) = strip.boundary.bounds() else {
        zones.insert(index, strip);
        return;
    };

    let reentrant_end = (junction_x + policy.reentrant_corner.size_factor * sizes.corner).min(strip_end);
    let mut pieces = vec![
        PressureZone::new(
            format!("{}-a", strip_id),
            ZoneType::Perimeter,
            Polygon::rectangle(lo.x, lo.y, junction_x, hi.y),
            policy,
        ),
        PressureZone::new(
            strip_id.replace("perimeter", "reentrant"),
            ZoneType::ReentrantCorner,
            Polygon::rectangle(junction_x, lo.y, reentrant_end, hi.y),
            policy,
        ),
    ];
    if reentrant_end < strip_end - EPS {
        pieces.push(PressureZone::new(
            format!("{}-b", strip_id),
            ZoneType::Perimeter,
            Polygon::rectangle(reentrant_end, lo.y, hi.x, hi.y),
            policy,
        ));
    }

    for (offset, piece) in pieces.into_iter().enumerate() {
        zones.insert(index + offset, piece);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> EnginePolicy {
        EnginePolicy::default()
    }

    #[test]
    fn test_zone_sizes_follow_least_dimension() {
        // 100 x 80 x 30: min(8, 12, 20) = 8, floor max(3.2, 3) = 3.2
        let sizes = ZoneSizes::compute(100.0, 80.0, 30.0, &policy().zone_sizing);
        assert!((sizes.corner - 8.0).abs() < 1e-9);
        assert!((sizes.perimeter - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_zone_sizes_follow_height_for_low_buildings() {
        // 200 x 200 x 10: min(20, 4, 20) = 4, floor max(8, 3) = 8
        let sizes = ZoneSizes::compute(200.0, 200.0, 10.0, &policy().zone_sizing);
        assert!((sizes.corner - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_zone_sizes_respect_caps() {
        let mut sizing = policy().zone_sizing;
        sizing.corner_cap_ft = 12.0;
        sizing.perimeter_cap_ft = 6.0;
        let sizes = ZoneSizes::compute(400.0, 300.0, 60.0, &sizing);
        assert_eq!(sizes.corner, 12.0);
        // floor is max(0.04 * 300, 3) = 12, which overrides the 6 ft cap
        assert_eq!(sizes.perimeter, 12.0);
    }

    #[test]
    fn test_rectangle_layout() {
        let geometry = BuildingGeometry::rectangle(100.0, 80.0, 30.0);
        let result = decompose(&geometry, &policy()).unwrap();

        assert_eq!(result.zones.len(), 9);
        assert_eq!(result.zones_of_type(ZoneType::Corner).count(), 4);
        assert_eq!(result.zones_of_type(ZoneType::Perimeter).count(), 4);
        assert_eq!(result.zones_of_type(ZoneType::Field).count(), 1);
        assert!(result.zones.iter().all(|z| z.boundary.vertices.len() == 4));

        let corner = result.find("corner-ne").unwrap();
        assert!((corner.area - 64.0).abs() < 1e-9);
        let field = result.find("field").unwrap();
        assert!((field.area - 84.0 * 64.0).abs() < 1e-9);
        assert!(result.partition_error() < 1e-12);
    }

    #[test]
    fn test_base_coefficients_are_suction() {
        let result = decompose(&BuildingGeometry::rectangle(60.0, 40.0, 20.0), &policy()).unwrap();
        assert!(result.zones.iter().all(|z| z.base_gcp <= 0.0));
        let corner = result.find("corner-sw").unwrap();
        let field = result.find("field").unwrap();
        assert!(corner.base_gcp < field.base_gcp);
    }

    #[test]
    fn test_unequal_caps_notch_the_field() {
        let mut policy = policy();
        policy.zone_sizing.corner_cap_ft = 10.0;
        policy.zone_sizing.perimeter_cap_ft = 5.0;
        policy.zone_sizing.min_size_ft = 0.0;
        policy.zone_sizing.min_fraction = 0.0;
        let result = decompose(&BuildingGeometry::rectangle(200.0, 150.0, 50.0), &policy).unwrap();

        let field = result.find("field").unwrap();
        assert_eq!(field.boundary.vertices.len(), 12);
        // (200 - 10)(150 - 10) - 4 * (10 - 5)^2
        assert!((field.area - (190.0 * 140.0 - 100.0)).abs() < 1e-6);
        assert!(result.partition_error() < 1e-12);
    }

    #[test]
    fn test_field_prime_split() {
        let mut policy = policy();
        policy.zone_sizing.field_prime_band_ft_per_height = Some(0.6);
        let result = decompose(&BuildingGeometry::rectangle(300.0, 200.0, 20.0), &policy).unwrap();

        let core = result.find("field-prime").unwrap();
        assert_eq!(core.zone_type, ZoneType::FieldPrime);
        assert!(core.is_zone1_prime);
        assert_eq!(result.zones_of_type(ZoneType::Field).count(), 4);
        assert!(result.partition_error() < 1e-12);
    }

    #[test]
    fn test_field_prime_skipped_when_field_too_small() {
        let mut policy = policy();
        policy.zone_sizing.field_prime_band_ft_per_height = Some(5.0);
        let result = decompose(&BuildingGeometry::rectangle(60.0, 40.0, 20.0), &policy).unwrap();
        assert!(result.find("field-prime").is_none());
        assert!(result.find("field").is_some());
    }

    #[test]
    fn test_narrow_footprint_still_decomposes() {
        // 40 x 6 x 10: min(0.6, 4) = 0.6, floor max(0.24, min(3, 1.5)) = 1.5
        let result = decompose(&BuildingGeometry::rectangle(40.0, 6.0, 10.0), &policy()).unwrap();
        assert!((result.sizes[0].corner - 1.5).abs() < 1e-9);
        assert_eq!(result.zones_of_type(ZoneType::Field).count(), 1);
        assert!(result.partition_error() < 1e-12);

        let sliver = decompose(&BuildingGeometry::rectangle(50.0, 0.5, 10.0), &policy()).unwrap();
        assert!(sliver.partition_error() < 0.01);
    }

    #[test]
    fn test_oversized_zone_fraction_is_computation_error() {
        let mut policy = policy();
        policy.zone_sizing.min_fraction = 0.5;
        let err = decompose(&BuildingGeometry::rectangle(50.0, 5.0, 10.0), &policy).unwrap_err();
        assert_eq!(err.error_code(), "CALCULATION_FAILED");
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_invalid_geometry_is_validation_error() {
        let err = decompose(&BuildingGeometry::rectangle(-10.0, 40.0, 10.0), &policy()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_l_shape_reentrant_zones() {
        let geometry = BuildingGeometry::l_shape(120.0, 40.0, 50.0, 60.0, 25.0);
        let result = decompose(&geometry, &policy()).unwrap();

        let reentrant: Vec<_> = result.zones_of_type(ZoneType::ReentrantCorner).collect();
        assert_eq!(reentrant.len(), 2);

        // both re-entrant zones touch the concave vertex (50, 40)
        for zone in &reentrant {
            assert!(zone
                .boundary
                .vertices
                .iter()
                .any(|p| (p.x - 50.0).abs() < 1e-9 && (p.y - 40.0).abs() < 1e-9));
            assert!(zone.base_gcp < ZoneType::Corner.nominal_gcp(&policy()));
        }

        assert!(result.find("leg2-reentrant-corner").is_some());
        assert!(result.find("leg1-reentrant-n").is_some());
        assert!(result.find("leg1-perimeter-n-a").is_some());
        assert!(result.find("leg1-perimeter-n-b").is_some());
        assert!(result.partition_error() < 1e-9);
        assert!(result.warnings.is_empty());
        assert_eq!(result.sizes.len(), 2);
    }

    #[test]
    fn test_l_shape_with_longer_upper_leg() {
        let geometry = BuildingGeometry::l_shape(50.0, 60.0, 120.0, 40.0, 25.0);
        let result = decompose(&geometry, &policy()).unwrap();
        assert!(result.find("leg1-reentrant-corner").is_some());
        assert!(result.find("leg2-reentrant-s").is_some());
        assert!(result.partition_error() < 1e-9);
    }

    #[test]
    fn test_l_shape_leg2_is_translated() {
        let geometry = BuildingGeometry::l_shape(120.0, 40.0, 50.0, 60.0, 25.0);
        let result = decompose(&geometry, &policy()).unwrap();
        let (lo, hi) = result.find("leg2-corner-nw").unwrap().boundary.bounds().unwrap();
        assert!((hi.y - 100.0).abs() < 1e-9);
        assert!(lo.y >= 40.0);
    }

    #[test]
    fn test_degenerate_l_shape_warns() {
        let geometry = BuildingGeometry::l_shape(400.0, 200.0, 20.0, 20.0, 20.0);
        let result = decompose(&geometry, &policy()).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::DegenerateGeometry));
    }

    #[test]
    fn test_aligned_legs_have_no_reentrant_corner() {
        let geometry = BuildingGeometry::l_shape(80.0, 40.0, 80.0, 30.0, 20.0);
        let result = decompose(&geometry, &policy()).unwrap();
        assert_eq!(result.zones_of_type(ZoneType::ReentrantCorner).count(), 0);
        assert_eq!(result.warnings.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_rectangle_zones_partition_footprint(
            length in 1.0f64..1000.0,
            width in 1.0f64..1000.0,
            height in 5.0f64..200.0,
        ) {
            let geometry = BuildingGeometry::rectangle(length, width, height);
            let result = decompose(&geometry, &EnginePolicy::default()).unwrap();
            let expected = length * width;
            prop_assert!((result.total_zone_area() - expected).abs() / expected <= PARTITION_TOLERANCE);
            prop_assert!(result.zones.iter().all(|z| z.area > 0.0));
        }

        #[test]
        fn prop_l_shape_zones_partition_footprint(
            length1 in 20.0f64..500.0,
            width1 in 20.0f64..500.0,
            length2 in 20.0f64..500.0,
            width2 in 20.0f64..500.0,
            height in 5.0f64..100.0,
        ) {
            let geometry = BuildingGeometry::l_shape(length1, width1, length2, width2, height);
            let result = decompose(&geometry, &EnginePolicy::default()).unwrap();
            prop_assert!(result.partition_error() <= PARTITION_TOLERANCE);
            prop_assert!(result.zones.iter().all(|z| z.area > 0.0));
        }
    }
}
