use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    fields::{Attributes, Field},
    geometry::{ConvertedGeometry, Extent, GeometryType, SpatialReference},
    renderer::{Legend, Renderer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// One feature as held by a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graphic {
    pub geometry: ConvertedGeometry,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Classification {
    Unclassified,
    Classified { field: String },
}

/// A typed feature collection with exactly one active renderer.
#[derive(Debug, Clone)]
pub struct FeatureLayer {
    id: LayerId,
    title: String,
    geometry_type: GeometryType,
    spatial_reference: SpatialReference,
    fields: Vec<Field>,
    graphics: Vec<Graphic>,
    base_renderer: Renderer,
    renderer: Renderer,
    legend: Option<Legend>,
    classification: Classification,
    full_extent: Option<Extent>,
}

/// Everything needed to build a layer except its identity and base renderer.
#[derive(Debug, Clone)]
pub struct LayerDraft {
    pub title: String,
    pub geometry_type: GeometryType,
    pub spatial_reference: SpatialReference,
    pub fields: Vec<Field>,
    pub graphics: Vec<Graphic>,
}

impl LayerDraft {
    pub fn full_extent(&self) -> Option<Extent> {
        let extents = self
            .graphics
            .iter()
            .filter_map(|g| g.geometry.extent())
            .collect::<Vec<_>>();
        Extent::combine(&extents)
    }
}

impl FeatureLayer {
    pub fn new(id: LayerId, draft: LayerDraft, base_renderer: Renderer) -> Self {
        let full_extent = draft.full_extent();
        Self {
            id,
            title: draft.title,
            geometry_type: draft.geometry_type,
            spatial_reference: draft.spatial_reference,
            fields: draft.fields,
            graphics: draft.graphics,
            renderer: base_renderer.clone(),
            base_renderer,
            legend: None,
            classification: Classification::Unclassified,
            full_extent,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn spatial_reference(&self) -> SpatialReference {
        self.spatial_reference
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn graphics(&self) -> &[Graphic] {
        &self.graphics
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attributes> {
        self.graphics.iter().map(|g| &g.attributes)
    }

    pub fn feature_count(&self) -> usize {
        self.graphics.len()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.legend.as_ref()
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn full_extent(&self) -> Option<Extent> {
        self.full_extent
    }

    /// Field names offered for classification, in layer order.
    pub fn classifiable_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.field_type.is_classifiable())
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Replaces the active renderer and legend together. Any previous rule
    /// list is discarded, not merged.
    pub fn apply_classification(&mut self, renderer: Renderer, legend: Legend) {
        let field = legend.field.clone();
        self.renderer = renderer;
        self.legend = Some(legend);
        self.classification = Classification::Classified { field };
    }

    /// Restores the single-symbol renderer assigned at creation and clears the
    /// legend.
    pub fn reset_classification(&mut self) {
        self.renderer = self.base_renderer.clone();
        self.legend = None;
        self.classification = Classification::Unclassified;
    }

    pub fn summary(&self) -> LayerSummary {
        LayerSummary {
            id: self.id,
            title: self.title.clone(),
            geometry_type: self.geometry_type,
            feature_count: self.graphics.len(),
            fields: self.fields.clone(),
            full_extent: self.full_extent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub id: LayerId,
    pub title: String,
    pub geometry_type: GeometryType,
    pub feature_count: usize,
    pub fields: Vec<Field>,
    pub full_extent: Option<Extent>,
}

impl LayerSummary {
    pub fn render_rows(&self) -> Vec<Vec<String>> {
        let extent = self
            .full_extent
            .map(|e| format!("{}, {}, {}, {}", e.xmin, e.ymin, e.xmax, e.ymax))
            .unwrap_or_else(|| "-".to_string());
        vec![
            vec!["id".to_string(), self.id.to_string()],
            vec!["title".to_string(), self.title.clone()],
            vec!["geometry".to_string(), self.geometry_type.to_string()],
            vec!["features".to_string(), self.feature_count.to_string()],
            vec!["fields".to_string(), self.fields.len().to_string()],
            vec!["extent".to_string(), extent],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SymbolDefaults,
        fields::{FieldType, infer_fields},
        frequency::compute_stats,
        geojson::RawGeometry,
        geometry::convert,
        palette::Palette,
        renderer::{build_renderer, simple_renderer},
        value::AttributeValue,
    };
    use serde_json::json;

    fn sample_layer() -> FeatureLayer {
        let graphics = [("A", [0.0, 0.0]), ("B", [4.0, 2.0]), ("A", [-1.0, 3.0])]
            .into_iter()
            .map(|(kind, [x, y])| Graphic {
                geometry: convert(
                    &RawGeometry::new("Point", json!([x, y])),
                    SpatialReference::default(),
                )
                .unwrap(),
                attributes: Attributes::from([("kind".to_string(), AttributeValue::from(kind))]),
            })
            .collect::<Vec<_>>();
        let attributes = graphics.iter().map(|g| g.attributes.clone()).collect::<Vec<_>>();
        let draft = LayerDraft {
            title: "sample".to_string(),
            geometry_type: GeometryType::Point,
            spatial_reference: SpatialReference::default(),
            fields: infer_fields(&attributes),
            graphics,
        };
        let base = simple_renderer(
            GeometryType::Point,
            0,
            &Palette::default(),
            &SymbolDefaults::default(),
        )
        .unwrap();
        FeatureLayer::new(LayerId(1), draft, base)
    }

    #[test]
    fn computes_full_extent() {
        let layer = sample_layer();
        assert_eq!(
            layer.full_extent(),
            Some(Extent {
                xmin: -1.0,
                ymin: 0.0,
                xmax: 4.0,
                ymax: 3.0
            })
        );
    }

    #[test]
    fn classify_then_reset_restores_simple_renderer() {
        let mut layer = sample_layer();
        let original = layer.renderer().clone();
        let stats = compute_stats(layer.attributes(), "kind").unwrap();
        let (renderer, legend) = build_renderer(
            &stats,
            layer.geometry_type(),
            &Palette::default(),
            &SymbolDefaults::default(),
        )
        .unwrap();
        layer.apply_classification(renderer, legend);
        assert_eq!(
            layer.classification(),
            &Classification::Classified {
                field: "kind".to_string()
            }
        );
        assert!(layer.renderer().is_classified());

        layer.reset_classification();
        assert_eq!(layer.renderer(), &original);
        assert!(layer.legend().is_none());
        assert_eq!(layer.classification(), &Classification::Unclassified);
    }

    #[test]
    fn classifiable_fields_skip_object_ids() {
        let layer = sample_layer();
        assert_eq!(layer.classifiable_fields(), vec!["FID", "kind"]);
        assert_eq!(layer.field("OBJECTID").unwrap().field_type, FieldType::ObjectId);
    }
}
