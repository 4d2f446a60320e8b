//! Categorical color palettes and CSS color parsing.
//!
//! Palettes are ordered and cyclic: index `i` maps to `colors[i % len]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ViewerError, ViewerResult};

/// Tableau 10, the default categorical palette.
pub const TABLEAU10: &[&str] = &[
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f",
    "#edc948", "#b07aa1", "#ff9da7", "#9c755f", "#bab0ac",
];

pub const CATEGORY10: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

pub const SET1: &[&str] = &[
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00",
    "#ffff33", "#a65628", "#f781bf", "#999999",
];

pub const SET2: &[&str] = &[
    "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854",
    "#ffd92f", "#e5c494", "#b3b3b3",
];

pub const DARK2: &[&str] = &[
    "#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e",
    "#e6ab02", "#a6761d", "#666666",
];

pub const PAIRED: &[&str] = &[
    "#a6cee3", "#1f78b4", "#b2df8a", "#33a02c", "#fb9a99",
    "#e31a1c", "#fdbf6f", "#ff7f00", "#cab2d6", "#6a3d9a",
    "#ffff99", "#b15928",
];

pub const DEFAULT_PALETTE: &str = "tableau10";

/// Looks up a palette by name, case-insensitively.
pub fn get_color_palette(name: &str) -> Option<&'static [&'static str]> {
    match name.to_lowercase().as_str() {
        "tableau10" | "tableau" => Some(TABLEAU10),
        "category10" => Some(CATEGORY10),
        "set1" => Some(SET1),
        "set2" => Some(SET2),
        "dark2" => Some(DARK2),
        "paired" => Some(PAIRED),
        _ => None,
    }
}

pub fn palette_names() -> &'static [&'static str] {
    &["tableau10", "category10", "set1", "set2", "dark2", "paired"]
}

/// RGBA color with 8-bit channels and a fractional alpha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn parse(value: &str) -> ViewerResult<Self> {
        let parsed = csscolorparser::parse(value).map_err(|e| ViewerError::InvalidColor {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        let [r, g, b, _] = parsed.to_rgba8();
        Ok(Self {
            r,
            g,
            b,
            a: parsed.a as f32,
        })
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "{}", self.to_hex())
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

/// Ordered, cyclic sequence of colors.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    pub fn named(name: &str) -> ViewerResult<Self> {
        let colors = get_color_palette(name)
            .ok_or_else(|| ViewerError::UnknownPalette(name.to_string()))?;
        Self::from_css(colors)
    }

    pub fn from_css<S: AsRef<str>>(colors: &[S]) -> ViewerResult<Self> {
        let colors = colors
            .iter()
            .map(|c| Color::parse(c.as_ref()))
            .collect::<ViewerResult<Vec<_>>>()?;
        Self::new(colors)
    }

    pub fn new(colors: Vec<Color>) -> ViewerResult<Self> {
        if colors.is_empty() {
            return Err(ViewerError::UnknownPalette(
                "palette must contain at least one color".to_string(),
            ));
        }
        Ok(Self { colors })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color for position `index`, wrapping around the palette length.
    pub fn color_at(&self, index: usize) -> Color {
        self.colors[index % self.colors.len()]
    }
}

impl Default for Palette {
    fn default() -> Self {
        let colors = TABLEAU10
            .iter()
            .filter_map(|hex| Color::parse(hex).ok())
            .collect();
        Self { colors }
    }
}
