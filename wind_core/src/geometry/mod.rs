//! # Building Geometry
//!
//! Footprint shapes accepted by the engine and the planar primitives used
//! to describe pressure-zone boundaries.
//!
//! All lengths are in feet. The footprint lies in the first quadrant with
//! its south-west corner at the origin; `length` runs along x and `width`
//! along y.
//!
//! ```text
//!  L-shape layout (leg 2 sits on top of leg 1, flush with the west edge)
//!
//!  y
//!  ^   +-----------+
//!  |   |   leg 2   |  width2
//!  |   +-----------+-------+
//!  |   |        leg 1      |  width1
//!  +---+-------------------+--> x
//!          length2 < length1
//! ```

pub mod zones;

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

pub use zones::{decompose, PressureZone, ZoneDecomposition, ZoneSizes, ZoneType};

/// Building footprint and mean roof height.
///
/// ## JSON Examples
///
/// ```json
/// { "shape": "rectangle", "length": 100.0, "width": 80.0, "height": 30.0 }
/// ```
///
/// ```json
/// { "shape": "l_shape", "length1": 120.0, "width1": 40.0,
///   "length2": 50.0, "width2": 60.0, "height": 25.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum BuildingGeometry {
    Rectangle {
        length: f64,
        width: f64,
        height: f64,
    },
    LShape {
        length1: f64,
        width1: f64,
        length2: f64,
        width2: f64,
        height: f64,
    },
}

impl BuildingGeometry {
    pub fn rectangle(length: f64, width: f64, height: f64) -> Self {
        BuildingGeometry::Rectangle { length, width, height }
    }

    pub fn l_shape(length1: f64, width1: f64, length2: f64, width2: f64, height: f64) -> Self {
        BuildingGeometry::LShape {
            length1,
            width1,
            length2,
            width2,
            height,
        }
    }

    /// Parse loosely-typed JSON, reporting absent dimensions as `MissingField`.
    pub fn from_json(json: &str) -> CalcResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            let message = e.to_string();
            match missing_field_name(&message) {
                Some(field) => CalcError::missing_field(field),
                None => CalcError::serialization(message),
            }
        })
    }

    /// Reject non-positive or non-finite dimensions. Values are never clamped.
    pub fn validate(&self) -> CalcResult<()> {
        for (field, value) in self.dimensions() {
            if !value.is_finite() || value <= 0.0 {
                return Err(CalcError::invalid_input(
                    field,
                    value.to_string(),
                    "Dimension must be a positive number",
                ));
            }
        }
        Ok(())
    }

    fn dimensions(&self) -> Vec<(&'static str, f64)> {
        match *self {
            BuildingGeometry::Rectangle { length, width, height } => {
                vec![("length", length), ("width", width), ("height", height)]
            }
            BuildingGeometry::LShape {
                length1,
                width1,
                length2,
                width2,
                height,
            } => vec![
                ("length1", length1),
                ("width1", width1),
                ("length2", length2),
                ("width2", width2),
                ("height", height),
            ],
        }
    }

    /// Mean roof height (ft)
    pub fn height(&self) -> f64 {
        match *self {
            BuildingGeometry::Rectangle { height, .. } | BuildingGeometry::LShape { height, .. } => {
                height
            }
        }
    }

    /// Plan area of the footprint (sq ft)
    pub fn footprint_area(&self) -> f64 {
        match *self {
            BuildingGeometry::Rectangle { length, width, .. } => length * width,
            BuildingGeometry::LShape {
                length1,
                width1,
                length2,
                width2,
                ..
            } => length1 * width1 + length2 * width2,
        }
    }

    /// Overall (length, width) of the bounding box
    pub fn bounding_dimensions(&self) -> (f64, f64) {
        match *self {
            BuildingGeometry::Rectangle { length, width, .. } => (length, width),
            BuildingGeometry::LShape {
                length1,
                width1,
                length2,
                width2,
                ..
            } => (length1.max(length2), width1 + width2),
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            BuildingGeometry::Rectangle { .. } => "rectangle",
            BuildingGeometry::LShape { .. } => "l_shape",
        }
    }
}

fn missing_field_name(message: &str) -> Option<String> {
    let start = message.find("missing field `")? + "missing field `".len();
    let rest = &message[start..];
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

// ============================================================================
// Planar Primitives
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Simple polygon with counter-clockwise vertices.
///
/// The ring is closed implicitly: the last vertex connects back to the
/// first, so a rectangle has exactly four vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Polygon { vertices }
    }

    /// Axis-aligned rectangle from its lower-left and upper-right corners
    pub fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Polygon::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    /// Enclosed area by the shoelace formula
    pub fn area(&self) -> f64 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let twice_area: f64 = (0..n)
            .map(|i| {
                let a = self.vertices[i];
                let b = self.vertices[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();
        (twice_area / 2.0).abs()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Polygon::new(
            self.vertices
                .iter()
                .map(|p| Point::new(p.x + dx, p.y + dy))
                .collect(),
        )
    }

    /// Vertices with the first point repeated at the end, for consumers
    /// that expect an explicitly closed ring (GeoJSON, DXF polylines).
    pub fn closed_ring(&self) -> Vec<Point> {
        let mut ring = self.vertices.clone();
        if let Some(first) = self.vertices.first() {
            ring.push(*first);
        }
        ring
    }

    /// (min, max) corners of the bounding box
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = self.vertices.first()?;
        let init = (*first, *first);
        Some(self.vertices.iter().fold(init, |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}
