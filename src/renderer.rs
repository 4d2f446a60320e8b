//! Unique-value classification: symbols, renderers, and legends.
//!
//! A [`Renderer`] is either a single symbol for every feature or a
//! unique-value rule list keyed on one field. [`build_renderer`] turns a
//! [`FieldStats`] distribution into such a rule list plus a [`Legend`] that
//! mirrors its order and colors. Values outside the ranked buckets share the
//! default symbol and have no legend entry.

use serde::{Deserialize, Serialize};

use crate::{
    config::SymbolDefaults,
    error::{ViewerError, ViewerResult},
    fields::Attributes,
    frequency::FieldStats,
    geometry::GeometryType,
    palette::{Color, Palette},
};

pub const OTHER_LABEL: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub color: Color,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Symbol {
    Marker {
        color: Color,
        size: f64,
        outline: Outline,
    },
    Line {
        color: Color,
        width: f64,
    },
    Fill {
        color: Color,
        outline: Outline,
    },
}

impl Symbol {
    /// Symbol for a classified bucket drawn in `color`.
    pub fn for_geometry(
        geometry_type: GeometryType,
        color: Color,
        defaults: &SymbolDefaults,
    ) -> ViewerResult<Self> {
        let outline_color = defaults.outline()?;
        Ok(match geometry_type {
            GeometryType::Point | GeometryType::Multipoint => Symbol::Marker {
                color,
                size: defaults.point_size,
                outline: Outline {
                    color: outline_color,
                    width: 1.0,
                },
            },
            GeometryType::Polyline => Symbol::Line {
                color,
                width: defaults.line_width,
            },
            GeometryType::Polygon => Symbol::Fill {
                color: color.with_alpha(defaults.fill_opacity),
                outline: Outline {
                    color,
                    width: defaults.outline_width,
                },
            },
        })
    }

    /// Neutral symbol for values that fall outside the ranked buckets.
    pub fn other(geometry_type: GeometryType, defaults: &SymbolDefaults) -> ViewerResult<Self> {
        let gray = defaults.other()?;
        Ok(match geometry_type {
            GeometryType::Point | GeometryType::Multipoint => Symbol::Marker {
                color: gray,
                size: (defaults.point_size * 0.75).round(),
                outline: Outline {
                    color: gray,
                    width: 0.5,
                },
            },
            GeometryType::Polyline => Symbol::Line {
                color: gray,
                width: (defaults.line_width - 1.0).max(1.0),
            },
            GeometryType::Polygon => Symbol::Fill {
                color: gray,
                outline: Outline {
                    color: gray,
                    width: 1.0,
                },
            },
        })
    }

    pub fn color(&self) -> Color {
        match self {
            Symbol::Marker { color, .. } | Symbol::Line { color, .. } => *color,
            Symbol::Fill { outline, .. } => outline.color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueValueInfo {
    pub value: String,
    pub label: String,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Renderer {
    Simple {
        symbol: Symbol,
    },
    UniqueValue {
        field: String,
        #[serde(rename = "uniqueValueInfos")]
        infos: Vec<UniqueValueInfo>,
        #[serde(rename = "defaultSymbol")]
        default_symbol: Symbol,
        #[serde(rename = "defaultLabel")]
        default_label: String,
    },
}

impl Renderer {
    pub fn is_classified(&self) -> bool {
        matches!(self, Renderer::UniqueValue { .. })
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Renderer::Simple { .. } => None,
            Renderer::UniqueValue { field, .. } => Some(field),
        }
    }

    /// Resolves the symbol a feature with `attributes` is drawn with.
    pub fn symbol_for(&self, attributes: &Attributes) -> &Symbol {
        match self {
            Renderer::Simple { symbol } => symbol,
            Renderer::UniqueValue {
                field,
                infos,
                default_symbol,
                ..
            } => attributes
                .get(field)
                .and_then(|value| value.tally_key())
                .and_then(|key| infos.iter().find(|info| info.value == key))
                .map(|info| &info.symbol)
                .unwrap_or(default_symbol),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub value: String,
    pub count: usize,
    pub label: String,
    pub color: Color,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legend {
    pub field: String,
    pub entries: Vec<LegendEntry>,
    pub total_features: usize,
    pub valid_count: usize,
    pub unique_count: usize,
}

impl Legend {
    pub fn render_rows(&self) -> Vec<Vec<String>> {
        self.entries
            .iter()
            .map(|entry| {
                vec![
                    entry.label.clone(),
                    entry.count.to_string(),
                    format!("{:.1}%", entry.percentage),
                    entry.color.to_hex(),
                ]
            })
            .collect()
    }

    /// Number of valid values drawn with the default symbol.
    pub fn hidden_count(&self) -> usize {
        let shown: usize = self.entries.iter().map(|e| e.count).sum();
        self.valid_count.saturating_sub(shown)
    }
}

pub fn legend_label(value: &str, count: usize) -> String {
    format!("{value} ({count})")
}

/// Builds a unique-value renderer and its legend from `stats`.
///
/// Bucket `i` gets `palette[i % palette.len()]`. Fails when the field has no
/// valid values.
pub fn build_renderer(
    stats: &FieldStats,
    geometry_type: GeometryType,
    palette: &Palette,
    defaults: &SymbolDefaults,
) -> ViewerResult<(Renderer, Legend)> {
    if stats.valid_count == 0 || stats.sorted_values.is_empty() {
        return Err(ViewerError::precondition(format!(
            "field '{}' has no non-empty values",
            stats.field
        )));
    }

    let mut infos = Vec::with_capacity(stats.sorted_values.len());
    let mut entries = Vec::with_capacity(stats.sorted_values.len());
    for (idx, bucket) in stats.sorted_values.iter().enumerate() {
        let color = palette.color_at(idx);
        let label = legend_label(&bucket.value, bucket.count);
        infos.push(UniqueValueInfo {
            value: bucket.value.clone(),
            label: label.clone(),
            symbol: Symbol::for_geometry(geometry_type, color, defaults)?,
        });
        entries.push(LegendEntry {
            value: bucket.value.clone(),
            count: bucket.count,
            label,
            color,
            percentage: stats.percentage(bucket.count).unwrap_or_default(),
        });
    }

    let renderer = Renderer::UniqueValue {
        field: stats.field.clone(),
        infos,
        default_symbol: Symbol::other(geometry_type, defaults)?,
        default_label: OTHER_LABEL.to_string(),
    };
    let legend = Legend {
        field: stats.field.clone(),
        entries,
        total_features: stats.total_features,
        valid_count: stats.valid_count,
        unique_count: stats.unique_count,
    };
    Ok((renderer, legend))
}

/// Single-symbol renderer drawn in the palette color picked by `layer_index`.
pub fn simple_renderer(
    geometry_type: GeometryType,
    layer_index: usize,
    palette: &Palette,
    defaults: &SymbolDefaults,
) -> ViewerResult<Renderer> {
    let symbol = Symbol::for_geometry(geometry_type, palette.color_at(layer_index), defaults)?;
    Ok(Renderer::Simple { symbol })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::{ValueCount, compute_stats};
    use crate::value::AttributeValue;

    fn stats(values: &[(&str, usize)], valid: usize, unique: usize) -> FieldStats {
        FieldStats {
            field: "kind".to_string(),
            total_features: valid + 1,
            valid_count: valid,
            unique_count: unique,
            sorted_values: values
                .iter()
                .map(|(value, count)| ValueCount {
                    value: value.to_string(),
                    count: *count,
                })
                .collect(),
        }
    }

    #[test]
    fn assigns_palette_colors_in_rank_order() {
        let palette = Palette::from_css(&["#ff0000", "#00ff00"]).unwrap();
        let stats = stats(&[("A", 3), ("B", 2), ("C", 1)], 6, 3);
        let (renderer, legend) =
            build_renderer(&stats, GeometryType::Point, &palette, &SymbolDefaults::default())
                .unwrap();
        let Renderer::UniqueValue { infos, field, .. } = &renderer else {
            panic!("expected unique-value renderer");
        };
        assert_eq!(field, "kind");
        let colors = infos.iter().map(|i| i.symbol.color().to_hex()).collect::<Vec<_>>();
        assert_eq!(colors, vec!["#ff0000", "#00ff00", "#ff0000"]);
        let labels = legend.entries.iter().map(|e| e.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["A (3)", "B (2)", "C (1)"]);
        assert_eq!(legend.entries[0].percentage, 50.0);
        assert_eq!(legend.entries[2].color, palette.color_at(0));
    }

    #[test]
    fn symbols_follow_geometry_type() {
        let defaults = SymbolDefaults::default();
        let red = Color::rgb(255, 0, 0);
        match Symbol::for_geometry(GeometryType::Point, red, &defaults).unwrap() {
            Symbol::Marker { size, .. } => assert_eq!(size, 8.0),
            other => panic!("unexpected {other:?}"),
        }
        match Symbol::for_geometry(GeometryType::Polyline, red, &defaults).unwrap() {
            Symbol::Line { width, .. } => assert_eq!(width, 3.0),
            other => panic!("unexpected {other:?}"),
        }
        match Symbol::for_geometry(GeometryType::Polygon, red, &defaults).unwrap() {
            Symbol::Fill { color, outline } => {
                assert!((color.a - 0.7).abs() < f32::EPSILON);
                assert_eq!(outline.width, 2.0);
                assert_eq!(outline.color, red);
            }
            other => panic!("unexpected {other:?}"),
        }
        match Symbol::other(GeometryType::Polygon, &defaults).unwrap() {
            Symbol::Fill { color, .. } => {
                assert_eq!(color.to_hex(), "#999999");
                assert!(color.a < 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn identical_inputs_produce_identical_rules() {
        let palette = Palette::default();
        let defaults = SymbolDefaults::default();
        let stats = stats(&[("x", 4), ("y", 4), ("z", 1)], 9, 3);
        let first = build_renderer(&stats, GeometryType::Polygon, &palette, &defaults).unwrap();
        let second = build_renderer(&stats, GeometryType::Polygon, &palette, &defaults).unwrap();
        assert_eq!(
            serde_json::to_vec(&first.0).unwrap(),
            serde_json::to_vec(&second.0).unwrap()
        );
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn zero_valid_values_is_a_precondition_failure() {
        let err = build_renderer(
            &stats(&[], 0, 0),
            GeometryType::Point,
            &Palette::default(),
            &SymbolDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ViewerError::ClassificationPrecondition(_)));
    }

    #[test]
    fn unmatched_values_use_default_symbol() {
        let features = vec![
            Attributes::from([("kind".to_string(), AttributeValue::from("A"))]),
            Attributes::from([("kind".to_string(), AttributeValue::from("A"))]),
            Attributes::from([("kind".to_string(), AttributeValue::from("B"))]),
        ];
        let stats = crate::frequency::compute_stats_with_limit(&features, "kind", 1).unwrap();
        let defaults = SymbolDefaults::default();
        let (renderer, legend) =
            build_renderer(&stats, GeometryType::Polyline, &Palette::default(), &defaults)
                .unwrap();
        let Renderer::UniqueValue { default_symbol, .. } = &renderer else {
            panic!("expected unique-value renderer");
        };
        assert_eq!(renderer.symbol_for(&features[2]), default_symbol);
        assert_ne!(renderer.symbol_for(&features[0]), default_symbol);
        assert_eq!(renderer.symbol_for(&Attributes::new()), default_symbol);
        assert_eq!(legend.entries.len(), 1);
        assert_eq!(legend.hidden_count(), 1);
    }

    #[test]
    fn numeric_features_match_text_rules() {
        let features = vec![Attributes::from([(
            "kind".to_string(),
            AttributeValue::from(7i64),
        )])];
        let stats = compute_stats(&features, "kind").unwrap();
        let (renderer, _) = build_renderer(
            &stats,
            GeometryType::Point,
            &Palette::default(),
            &SymbolDefaults::default(),
        )
        .unwrap();
        let text = Attributes::from([("kind".to_string(), AttributeValue::from("7"))]);
        assert_eq!(renderer.symbol_for(&text), renderer.symbol_for(&features[0]));
        assert_eq!(renderer.field(), Some("kind"));
    }

    #[test]
    fn simple_renderer_color_is_stable_per_layer_index() {
        let palette = Palette::default();
        let defaults = SymbolDefaults::default();
        let a = simple_renderer(GeometryType::Point, 3, &palette, &defaults).unwrap();
        let b = simple_renderer(GeometryType::Point, 3, &palette, &defaults).unwrap();
        assert_eq!(a, b);
        let Renderer::Simple { symbol } = a else {
            panic!("expected simple renderer");
        };
        assert_eq!(symbol.color(), palette.color_at(3));
        assert!(!b.is_classified());
    }
}
