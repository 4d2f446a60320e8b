//! GeoJSON input model and document normalization.
//!
//! Uploaded documents are accepted when the top-level `type` is
//! `FeatureCollection` or `Feature`. A bare feature is wrapped into a
//! single-element collection. Any `crs` member, at the top level or on a
//! feature, is discarded; coordinates are always read as geographic WGS84.
//!
//! Geometry types are kept as raw strings here. Mapping them onto host
//! geometry happens in [`crate::geometry`], where unknown types are dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ViewerError, ViewerResult};

const CRS_MEMBER: &str = "crs";

/// One position. Extra ordinates (z, m) are carried through untouched.
pub type Position = Vec<f64>;

/// External geometry record as it appears in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGeometry {
    #[serde(rename = "type", default)]
    pub geometry_type: Option<String>,
    #[serde(default)]
    pub coordinates: Value,
}

impl RawGeometry {
    pub fn new(geometry_type: &str, coordinates: Value) -> Self {
        Self {
            geometry_type: Some(geometry_type.to_string()),
            coordinates,
        }
    }

    pub fn type_name(&self) -> &str {
        self.geometry_type.as_deref().unwrap_or("<missing>")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    #[serde(default)]
    pub geometry: Option<RawGeometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl RawFeature {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|props| props.get(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<RawFeature>,
}

impl FeatureCollection {
    /// Parses and normalizes an uploaded document.
    pub fn parse(text: &str) -> ViewerResult<Self> {
        let document: Value = serde_json::from_str(text)?;
        Self::from_value(document)
    }

    pub fn from_value(document: Value) -> ViewerResult<Self> {
        let Value::Object(mut root) = document else {
            return Err(ViewerError::malformed("GeoJSON root must be an object"));
        };
        root.remove(CRS_MEMBER);
        let kind = root
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ViewerError::malformed("GeoJSON object is missing 'type'"))?
            .to_string();

        let features = match kind.as_str() {
            "FeatureCollection" => match root.remove("features") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(ViewerError::malformed(
                        "FeatureCollection 'features' must be an array",
                    ));
                }
                None => Vec::new(),
            },
            "Feature" => vec![Value::Object(root)],
            other => {
                return Err(ViewerError::malformed(format!(
                    "Unsupported GeoJSON type '{other}'; expected FeatureCollection or Feature"
                )));
            }
        };

        if features.is_empty() {
            return Err(ViewerError::malformed("GeoJSON contains no features"));
        }

        let features = features
            .into_iter()
            .enumerate()
            .map(|(idx, feature)| parse_feature(idx, feature))
            .collect::<ViewerResult<Vec<_>>>()?;
        Ok(FeatureCollection { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn parse_feature(idx: usize, feature: Value) -> ViewerResult<RawFeature> {
    let Value::Object(mut object) = feature else {
        return Err(ViewerError::malformed(format!(
            "Feature {idx} is not an object"
        )));
    };
    object.remove(CRS_MEMBER);
    if let Some(Value::Object(geometry)) = object.get_mut("geometry") {
        geometry.remove(CRS_MEMBER);
    }
    serde_json::from_value(Value::Object(object))
        .map_err(|err| ViewerError::malformed(format!("Feature {idx}: {err}")))
}
