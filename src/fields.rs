//! Field model and attribute type inference.
//!
//! A layer's fields are inferred once, when the layer is built, from every
//! feature's value for each property key. Inference is never re-run for an
//! existing layer.

use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::value::AttributeValue;

pub const OBJECT_ID_FIELD: &str = "OBJECTID";
pub const FID_FIELD: &str = "FID";

pub type Attributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Integer,
    Double,
    String,
    ObjectId,
}

impl FieldType {
    /// Field types offered for classification.
    pub fn is_classifiable(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Double | FieldType::String
        )
    }

    /// Maps an `esriFieldType*` name onto a field type. Geometry, blob, and
    /// raster columns have no attribute representation and yield `None`.
    pub fn from_esri(name: &str) -> Option<Self> {
        let trimmed = name.strip_prefix("esriFieldType").unwrap_or(name);
        match trimmed {
            "OID" => Some(FieldType::ObjectId),
            "SmallInteger" | "Integer" | "BigInteger" => Some(FieldType::Integer),
            "Single" | "Double" | "Date" => Some(FieldType::Double),
            "String" | "GUID" | "GlobalID" | "XML" => Some(FieldType::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::ObjectId => "object-id",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub alias: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            field_type,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    observed: usize,
    non_numeric: usize,
    fractional: usize,
}

impl TypeCandidate {
    fn observe(&mut self, value: &AttributeValue) {
        match value {
            AttributeValue::Null => {}
            AttributeValue::Number(n) => {
                self.observed += 1;
                if n.fract() != 0.0 {
                    self.fractional += 1;
                }
            }
            _ => {
                self.observed += 1;
                self.non_numeric += 1;
            }
        }
    }

    fn decide(&self) -> FieldType {
        if self.observed == 0 || self.non_numeric > 0 {
            FieldType::String
        } else if self.fractional > 0 {
            FieldType::Double
        } else {
            FieldType::Integer
        }
    }
}

/// Infers the type of `field_name` across `features`.
///
/// Missing keys and nulls do not count as observations. A field with no
/// observations is a string field.
pub fn infer_type<'a>(
    field_name: &str,
    features: impl IntoIterator<Item = &'a Attributes>,
) -> FieldType {
    let mut candidate = TypeCandidate::default();
    for attributes in features {
        if let Some(value) = attributes.get(field_name) {
            candidate.observe(value);
        }
    }
    candidate.decide()
}

/// Builds the field set of an uploaded layer: `OBJECTID`, `FID`, then one
/// inferred field per property key in key order.
pub fn infer_fields(features: &[Attributes]) -> Vec<Field> {
    let mut fields = vec![
        Field::new(OBJECT_ID_FIELD, FieldType::ObjectId),
        Field::new(FID_FIELD, FieldType::Integer),
    ];
    let keys = features
        .iter()
        .flat_map(|attributes| attributes.keys())
        .filter(|key| !is_generated_field(key))
        .unique()
        .sorted()
        .cloned()
        .collect::<Vec<_>>();
    for key in keys {
        let field_type = infer_type(&key, features);
        fields.push(Field::new(key, field_type));
    }
    fields
}

pub fn is_generated_field(name: &str) -> bool {
    name == OBJECT_ID_FIELD || name == FID_FIELD
}
