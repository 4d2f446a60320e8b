//! Conversion from GeoJSON geometry records into host geometry.
//!
//! | GeoJSON            | host tag     |
//! |--------------------|--------------|
//! | `Point`            | `point`      |
//! | `LineString`       | `polyline`   |
//! | `MultiLineString`  | `polyline`   |
//! | `Polygon`          | `polygon`    |
//! | `MultiPolygon`     | `polygon`    |
//! | `MultiPoint`       | `multipoint` |
//!
//! Multipolygon parts are flattened into a single ring list, so part
//! boundaries are lost. Coordinates are passed through without validation.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::{ViewerError, ViewerResult};
use crate::geojson::{Position, RawGeometry};

pub const WGS84_WKID: u32 = 4326;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl SpatialReference {
    pub const fn new(wkid: u32) -> Self {
        Self { wkid }
    }
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::new(WGS84_WKID)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    Point,
    Polyline,
    Polygon,
    Multipoint,
}

impl GeometryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "point",
            GeometryType::Polyline => "polyline",
            GeometryType::Polygon => "polygon",
            GeometryType::Multipoint => "multipoint",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Point { coordinates: Position },
    Polyline { paths: Vec<Vec<Position>> },
    Polygon { rings: Vec<Vec<Position>> },
    Multipoint { points: Vec<Position> },
}

impl Shape {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Shape::Point { .. } => GeometryType::Point,
            Shape::Polyline { .. } => GeometryType::Polyline,
            Shape::Polygon { .. } => GeometryType::Polygon,
            Shape::Multipoint { .. } => GeometryType::Multipoint,
        }
    }

    /// Visits every position in document order.
    pub fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_> {
        match self {
            Shape::Point { coordinates } => Box::new(std::iter::once(coordinates)),
            Shape::Multipoint { points } => Box::new(points.iter()),
            Shape::Polyline { paths: parts } | Shape::Polygon { rings: parts } => {
                Box::new(parts.iter().flatten())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedGeometry {
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

impl ConvertedGeometry {
    pub fn geometry_type(&self) -> GeometryType {
        self.shape.geometry_type()
    }

    pub fn extent(&self) -> Option<Extent> {
        Extent::from_positions(self.shape.positions())
    }
}

/// Axis-aligned bounds in the geometry's own coordinate reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    /// Positions without two finite leading ordinates are skipped.
    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Option<Self> {
        let mut extent: Option<Extent> = None;
        for position in positions {
            let (Some(&x), Some(&y)) = (position.first(), position.get(1)) else {
                continue;
            };
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            let point = Extent {
                xmin: x,
                ymin: y,
                xmax: x,
                ymax: y,
            };
            extent = Some(match extent {
                Some(current) => current.union(&point),
                None => point,
            });
        }
        extent
    }

    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    pub fn combine<'a>(extents: impl IntoIterator<Item = &'a Extent>) -> Option<Extent> {
        extents
            .into_iter()
            .fold(None, |acc: Option<Extent>, next| match acc {
                Some(current) => Some(current.union(next)),
                None => Some(*next),
            })
    }
}

/// Converts a raw geometry, returning `None` when its type is unknown,
/// missing, or its coordinates do not have the shape the type requires.
pub fn convert(raw: &RawGeometry, spatial_reference: SpatialReference) -> Option<ConvertedGeometry> {
    match convert_strict(raw, spatial_reference) {
        Ok(converted) => Some(converted),
        Err(err) => {
            warn!("Dropping feature geometry: {err}");
            None
        }
    }
}

/// Like [`convert`] but reports why a geometry could not be converted.
pub fn convert_strict(
    raw: &RawGeometry,
    spatial_reference: SpatialReference,
) -> ViewerResult<ConvertedGeometry> {
    let kind = raw.type_name();
    let shape = match kind {
        "Point" => Shape::Point {
            coordinates: coordinates(raw)?,
        },
        "LineString" => Shape::Polyline {
            paths: vec![coordinates(raw)?],
        },
        "MultiLineString" => Shape::Polyline {
            paths: coordinates(raw)?,
        },
        "Polygon" => Shape::Polygon {
            rings: coordinates(raw)?,
        },
        "MultiPolygon" => {
            let parts: Vec<Vec<Vec<Position>>> = coordinates(raw)?;
            Shape::Polygon {
                rings: parts.into_iter().flatten().collect(),
            }
        }
        "MultiPoint" => Shape::Multipoint {
            points: coordinates(raw)?,
        },
        other => return Err(ViewerError::UnsupportedGeometry(other.to_string())),
    };
    Ok(ConvertedGeometry {
        shape,
        spatial_reference,
    })
}

fn coordinates<T: DeserializeOwned>(raw: &RawGeometry) -> ViewerResult<T> {
    T::deserialize(&raw.coordinates).map_err(|err| {
        ViewerError::UnsupportedGeometry(format!("{} (coordinates: {err})", raw.type_name()))
    })
}
