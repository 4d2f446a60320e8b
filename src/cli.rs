use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Load feature layers and classify them by attribute", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Summarize the layers produced by an upload
    Inspect(InputArgs),
    /// List the fields of each uploaded layer with their inferred types
    Fields(InputArgs),
    /// Show the value distribution of one field
    Stats(ClassifyArgs),
    /// Build a unique-value renderer and legend for one field
    Classify(ClassifyArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// GeoJSON (.json, .geojson) file to load
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Viewer configuration file (.yml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Field to classify on
    #[arg(short = 'f', long = "field")]
    pub field: String,
    /// Maximum number of values to break out (0 = all)
    #[arg(long)]
    pub top: Option<usize>,
    /// Named palette (tableau10, category10, set1, set2, dark2, paired)
    #[arg(long)]
    pub palette: Option<String>,
    /// 1-based layer number when the upload produced several layers
    #[arg(long, default_value_t = 1)]
    pub layer: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}
