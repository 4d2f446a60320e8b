//! Viewer configuration.
//!
//! Loaded from YAML (or JSON, chosen by extension). Every key is optional and
//! falls back to the built-in defaults below.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    error::ViewerResult,
    frequency::DEFAULT_TOP_VALUES,
    geometry::{SpatialReference, WGS84_WKID},
    palette::{Color, DEFAULT_PALETTE, Palette},
};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaletteSpec {
    Named(String),
    Colors(Vec<String>),
}

impl PaletteSpec {
    pub fn resolve(&self) -> ViewerResult<Palette> {
        match self {
            PaletteSpec::Named(name) => Palette::named(name),
            PaletteSpec::Colors(colors) => Palette::from_css(colors),
        }
    }
}

impl Default for PaletteSpec {
    fn default() -> Self {
        PaletteSpec::Named(DEFAULT_PALETTE.to_string())
    }
}

/// Sizes and opacities applied to generated symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolDefaults {
    pub point_size: f64,
    pub line_width: f64,
    pub fill_opacity: f32,
    pub outline_width: f64,
    pub outline_color: String,
    pub other_color: String,
    pub other_opacity: f32,
}

impl Default for SymbolDefaults {
    fn default() -> Self {
        Self {
            point_size: 8.0,
            line_width: 3.0,
            fill_opacity: 0.7,
            outline_width: 2.0,
            outline_color: "#ffffff".to_string(),
            other_color: "#999999".to_string(),
            other_opacity: 0.4,
        }
    }
}

impl SymbolDefaults {
    pub fn outline(&self) -> ViewerResult<Color> {
        Color::parse(&self.outline_color)
    }

    pub fn other(&self) -> ViewerResult<Color> {
        Ok(Color::parse(&self.other_color)?.with_alpha(self.other_opacity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub max_upload_bytes: u64,
    pub top_values: usize,
    pub palette: PaletteSpec,
    pub spatial_reference: u32,
    pub symbols: SymbolDefaults,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            top_values: DEFAULT_TOP_VALUES,
            palette: PaletteSpec::default(),
            spatial_reference: WGS84_WKID,
            symbols: SymbolDefaults::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let mut raw = String::new();
        BufReader::new(file)
            .read_to_string(&mut raw)
            .with_context(|| format!("Reading config file {path:?}"))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str(&raw).context("Parsing config JSON")?
        } else {
            serde_yaml::from_str(&raw).context("Parsing config YAML")?
        };
        Ok(config)
    }

    pub fn spatial_reference(&self) -> SpatialReference {
        SpatialReference::new(self.spatial_reference)
    }

    pub fn resolve_palette(&self) -> ViewerResult<Palette> {
        self.palette.resolve()
    }

    /// Checks that every color the configuration names can be parsed.
    pub fn validate(&self) -> ViewerResult<()> {
        self.resolve_palette()?;
        self.symbols.outline()?;
        self.symbols.other()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_upload_and_symbol_limits() {
        let config = ViewerConfig::default();
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.top_values, 20);
        assert_eq!(config.spatial_reference().wkid, 4326);
        assert_eq!(config.symbols.point_size, 8.0);
        assert_eq!(config.symbols.line_width, 3.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_partial_yaml() {
        let mut file = NamedTempFile::with_suffix(".yml").expect("temp file");
        writeln!(file, "top_values: 5").unwrap();
        writeln!(file, "palette: [\"red\", \"#00ff00\"]").unwrap();
        writeln!(file, "symbols:\n  point_size: 12").unwrap();
        let config = ViewerConfig::load(file.path()).expect("load config");
        assert_eq!(config.top_values, 5);
        assert_eq!(config.symbols.point_size, 12.0);
        assert_eq!(config.symbols.line_width, 3.0);
        let palette = config.resolve_palette().unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.color_at(0), Color::rgb(255, 0, 0));
    }

    #[test]
    fn loads_json_by_extension() {
        let mut file = NamedTempFile::with_suffix(".json").expect("temp file");
        write!(file, r#"{{"palette": "set1", "max_upload_bytes": 1024}}"#).unwrap();
        let config = ViewerConfig::load(file.path()).expect("load config");
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.palette, PaletteSpec::Named("set1".into()));
    }

    #[test]
    fn validate_reports_bad_colors() {
        let config = ViewerConfig {
            palette: PaletteSpec::Colors(vec!["bogus".into()]),
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
