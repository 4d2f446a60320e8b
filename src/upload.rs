//! Upload validation and conversion of uploaded files into layer drafts.
//!
//! Validation runs in a fixed order: extension, then size, then parsing.
//! GeoJSON is parsed locally. Zipped shapefiles are handed to a
//! [`FeatureService`], whose `featureCollection` response is decoded here.
//! A failed upload produces no drafts at all.

use std::path::Path;

use encoding_rs::UTF_8;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    config::ViewerConfig,
    error::{ViewerError, ViewerResult},
    fields::{Attributes, FID_FIELD, Field, FieldType, OBJECT_ID_FIELD, infer_fields},
    geojson::{FeatureCollection, Position},
    geometry::{self, ConvertedGeometry, Shape, SpatialReference},
    layer::{Graphic, LayerDraft},
    value::AttributeValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Shapefile,
    GeoJson,
}

impl UploadKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(UploadKind::Shapefile),
            "json" | "geojson" => Some(UploadKind::GeoJson),
            _ => None,
        }
    }
}

/// A file handed to the viewer by the user.
#[derive(Debug, Clone)]
pub struct UploadSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Layer title derived from the file name, without extension.
    pub fn title(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.name)
            .to_string()
    }
}

/// Parameters sent along with a shapefile conversion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest<'a> {
    pub file_name: &'a str,
    pub file_type: &'static str,
    pub target_wkid: u32,
    pub enforce_input_file_size_limit: bool,
    pub enforce_output_json_size_limit: bool,
}

/// Hosted service that turns a zipped shapefile into a feature collection.
pub trait FeatureService {
    fn generate_features(&self, request: &GenerateRequest<'_>, bytes: &[u8])
    -> ViewerResult<Value>;
}

pub struct UploadPipeline<'a> {
    config: &'a ViewerConfig,
    service: Option<&'a dyn FeatureService>,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(config: &'a ViewerConfig) -> Self {
        Self {
            config,
            service: None,
        }
    }

    pub fn with_service(mut self, service: &'a dyn FeatureService) -> Self {
        self.service = Some(service);
        self
    }

    /// Checks the name and size of a file before any of it is read.
    pub fn validate(&self, name: &str, size: u64) -> ViewerResult<UploadKind> {
        let kind = UploadKind::from_name(name).ok_or_else(|| ViewerError::InvalidFileType {
            name: name.to_string(),
        })?;
        if size > self.config.max_upload_bytes {
            return Err(ViewerError::FileTooLarge {
                name: name.to_string(),
                size,
                limit: self.config.max_upload_bytes,
            });
        }
        Ok(kind)
    }

    pub fn process(&self, source: &UploadSource) -> ViewerResult<Vec<LayerDraft>> {
        let kind = self.validate(&source.name, source.bytes.len() as u64)?;
        debug!("Processing upload '{}' as {kind:?}", source.name);
        let drafts = match kind {
            UploadKind::GeoJson => {
                let text = decode_text(&source.bytes)?;
                let collection = FeatureCollection::parse(&text)?;
                vec![geojson_draft(
                    source.title(),
                    &collection,
                    self.config.spatial_reference(),
                )?]
            }
            UploadKind::Shapefile => {
                let service = self.service.ok_or_else(|| {
                    ViewerError::ServiceFailure(
                        "no feature service is configured for shapefile uploads".to_string(),
                    )
                })?;
                let request = GenerateRequest {
                    file_name: &source.name,
                    file_type: "shapefile",
                    target_wkid: self.config.spatial_reference,
                    enforce_input_file_size_limit: true,
                    enforce_output_json_size_limit: true,
                };
                let response = service.generate_features(&request, &source.bytes)?;
                feature_service_drafts(
                    &source.title(),
                    response,
                    self.config.spatial_reference(),
                )?
            }
        };
        info!(
            "Upload '{}' produced {} layer(s) with {} feature(s)",
            source.name,
            drafts.len(),
            drafts.iter().map(|d| d.graphics.len()).sum::<usize>()
        );
        Ok(drafts)
    }
}

/// Decodes uploaded bytes as text, honoring a UTF-8 or UTF-16 byte order mark.
pub fn decode_text(bytes: &[u8]) -> ViewerResult<String> {
    let (text, encoding, had_errors) = UTF_8.decode(bytes);
    if had_errors {
        return Err(ViewerError::malformed(format!(
            "file is not valid {} text",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Builds a layer draft from a normalized GeoJSON collection.
///
/// Features whose geometry cannot be converted are dropped. `OBJECTID` and
/// `FID` are assigned over the kept features, overwriting same-named
/// properties.
pub fn geojson_draft(
    title: String,
    collection: &FeatureCollection,
    spatial_reference: SpatialReference,
) -> ViewerResult<LayerDraft> {
    let mut graphics = Vec::with_capacity(collection.len());
    for (idx, feature) in collection.features.iter().enumerate() {
        let Some(raw) = &feature.geometry else {
            warn!("Dropping feature {idx}: geometry is missing");
            continue;
        };
        let Some(geometry) = geometry::convert(raw, spatial_reference) else {
            continue;
        };
        let mut attributes = feature
            .properties
            .as_ref()
            .map(json_attributes)
            .unwrap_or_default();
        let kept = graphics.len();
        attributes.insert(
            OBJECT_ID_FIELD.to_string(),
            AttributeValue::from(kept as i64 + 1),
        );
        attributes.insert(FID_FIELD.to_string(), AttributeValue::from(kept as i64));
        graphics.push(Graphic {
            geometry,
            attributes,
        });
    }

    let geometry_type = graphics
        .first()
        .map(|g| g.geometry.geometry_type())
        .ok_or_else(|| ViewerError::malformed("no feature has a supported geometry"))?;
    let dropped = collection.len() - graphics.len();
    if dropped > 0 {
        warn!("Dropped {dropped} feature(s) with unsupported geometry from '{title}'");
    }

    let attributes = graphics
        .iter()
        .map(|g| g.attributes.clone())
        .collect::<Vec<_>>();
    Ok(LayerDraft {
        title,
        geometry_type,
        spatial_reference,
        fields: infer_fields(&attributes),
        graphics,
    })
}

fn json_attributes(properties: &Map<String, Value>) -> Attributes {
    properties
        .iter()
        .map(|(key, value)| (key.clone(), AttributeValue::from_json(value)))
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    feature_collection: ServiceCollection,
}

#[derive(Debug, Deserialize)]
struct ServiceCollection {
    #[serde(default)]
    layers: Vec<ServiceLayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceLayer {
    #[serde(default)]
    layer_definition: LayerDefinition,
    #[serde(default)]
    feature_set: FeatureSet,
}

#[derive(Debug, Default, Deserialize)]
struct LayerDefinition {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    fields: Vec<ServiceField>,
}

#[derive(Debug, Deserialize)]
struct ServiceField {
    name: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureSet {
    #[serde(default)]
    spatial_reference: Option<SpatialReference>,
    #[serde(default)]
    features: Vec<ServiceFeature>,
}

#[derive(Debug, Deserialize)]
struct ServiceFeature {
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServiceGeometry {
    Polygon { rings: Vec<Vec<Position>> },
    Polyline { paths: Vec<Vec<Position>> },
    Multipoint { points: Vec<Position> },
    Point { x: f64, y: f64, z: Option<f64> },
}

impl From<ServiceGeometry> for Shape {
    fn from(geometry: ServiceGeometry) -> Self {
        match geometry {
            ServiceGeometry::Polygon { rings } => Shape::Polygon { rings },
            ServiceGeometry::Polyline { paths } => Shape::Polyline { paths },
            ServiceGeometry::Multipoint { points } => Shape::Multipoint { points },
            ServiceGeometry::Point { x, y, z } => Shape::Point {
                coordinates: std::iter::once(x).chain(Some(y)).chain(z).collect(),
            },
        }
    }
}

/// Decodes a feature-service `featureCollection` response into one draft per
/// service layer. Layers without usable features are skipped.
pub fn feature_service_drafts(
    title: &str,
    response: Value,
    fallback_reference: SpatialReference,
) -> ViewerResult<Vec<LayerDraft>> {
    let response: GenerateResponse = serde_json::from_value(response)
        .map_err(|err| ViewerError::ServiceFailure(format!("unexpected response: {err}")))?;
    let layer_count = response.feature_collection.layers.len();
    let mut drafts = Vec::with_capacity(layer_count);
    for (idx, layer) in response.feature_collection.layers.into_iter().enumerate() {
        let spatial_reference = layer
            .feature_set
            .spatial_reference
            .unwrap_or(fallback_reference);
        let graphics = layer
            .feature_set
            .features
            .into_iter()
            .enumerate()
            .filter_map(|(feature_idx, feature)| {
                service_graphic(feature, spatial_reference)
                    .inspect_err(|err| {
                        warn!("Dropping service feature {feature_idx} of layer {idx}: {err}")
                    })
                    .ok()
            })
            .collect::<Vec<_>>();
        let Some(geometry_type) = graphics.first().map(|g| g.geometry.geometry_type()) else {
            warn!("Skipping service layer {idx}: no usable features");
            continue;
        };
        let fields = layer
            .layer_definition
            .fields
            .iter()
            .filter_map(service_field)
            .collect::<Vec<_>>();
        let layer_title = match (&layer.layer_definition.name, layer_count) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, 1) => title.to_string(),
            _ => format!("{title} ({})", idx + 1),
        };
        drafts.push(LayerDraft {
            title: layer_title,
            geometry_type,
            spatial_reference,
            fields,
            graphics,
        });
    }
    if drafts.is_empty() {
        return Err(ViewerError::malformed(
            "shapefile conversion returned no features",
        ));
    }
    Ok(drafts)
}

fn service_field(field: &ServiceField) -> Option<Field> {
    let field_type = FieldType::from_esri(&field.field_type)?;
    let alias = field.alias.clone().unwrap_or_else(|| field.name.clone());
    Some(Field::new(field.name.clone(), field_type).with_alias(alias))
}

fn service_graphic(
    feature: ServiceFeature,
    spatial_reference: SpatialReference,
) -> ViewerResult<Graphic> {
    let raw = feature
        .geometry
        .ok_or_else(|| ViewerError::UnsupportedGeometry("<missing>".to_string()))?;
    let decoded: ServiceGeometry = serde_json::from_value(raw)
        .map_err(|err| ViewerError::UnsupportedGeometry(err.to_string()))?;
    Ok(Graphic {
        geometry: ConvertedGeometry {
            shape: decoded.into(),
            spatial_reference,
        },
        attributes: json_attributes(&feature.attributes),
    })
}
