pub mod cli;
pub mod config;
pub mod error;
pub mod fields;
pub mod frequency;
pub mod geojson;
pub mod geometry;
pub mod layer;
pub mod palette;
pub mod renderer;
pub mod session;
pub mod table;
pub mod upload;
pub mod value;

use std::{env, fs, io, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    cli::{ClassifyArgs, Cli, Commands, InputArgs, OutputFormat},
    config::{PaletteSpec, ViewerConfig},
    layer::LayerId,
    session::{MapSession, NullHost},
    upload::UploadSource,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("layer_classify", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect(args) => handle_inspect(&args),
        Commands::Fields(args) => handle_fields(&args),
        Commands::Stats(args) => handle_stats(&args),
        Commands::Classify(args) => handle_classify(&args),
    }
}

fn load_config(args: &InputArgs) -> Result<ViewerConfig> {
    match &args.config {
        Some(path) => {
            ViewerConfig::load(path).with_context(|| format!("Loading config from {path:?}"))
        }
        None => Ok(ViewerConfig::default()),
    }
}

fn open_session(
    args: &InputArgs,
    config: ViewerConfig,
) -> Result<(MapSession<NullHost>, Vec<LayerId>)> {
    let name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Input path {:?} has no file name", args.input))?
        .to_string();
    let mut session = MapSession::new(NullHost, config).context("Preparing map session")?;

    let size = fs::metadata(&args.input)
        .with_context(|| format!("Reading metadata for {:?}", args.input))?
        .len();
    upload::UploadPipeline::new(session.config()).validate(&name, size)?;

    let bytes =
        fs::read(&args.input).with_context(|| format!("Reading input file {:?}", args.input))?;
    let ids = session
        .upload(&UploadSource::new(name, bytes))
        .with_context(|| format!("Loading {:?}", args.input))?;
    debug!("Upload produced layer ids {ids:?}");
    Ok((session, ids))
}

fn handle_inspect(args: &InputArgs) -> Result<()> {
    let config = load_config(args)?;
    let (session, _) = open_session(args, config)?;
    let summaries = session
        .layers()
        .iter()
        .map(|layer| layer.summary())
        .collect::<Vec<_>>();
    match args.format {
        OutputFormat::Json => print_json(&summaries),
        OutputFormat::Table | OutputFormat::Csv => {
            for summary in &summaries {
                emit_rows(args.format, &["property", "value"], &summary.render_rows())?;
            }
            Ok(())
        }
    }
}

fn handle_fields(args: &InputArgs) -> Result<()> {
    let config = load_config(args)?;
    let (session, _) = open_session(args, config)?;
    let mut rows = Vec::new();
    for layer in session.layers() {
        for field in layer.fields() {
            rows.push(vec![
                layer.title().to_string(),
                field.name.clone(),
                field.alias.clone(),
                field.field_type.to_string(),
            ]);
        }
    }
    if args.format == OutputFormat::Json {
        let fields = session
            .layers()
            .iter()
            .map(|layer| (layer.title(), layer.fields()))
            .collect::<Vec<_>>();
        return print_json(&fields);
    }
    emit_rows(args.format, &["layer", "name", "alias", "type"], &rows)
}

fn classify_config(args: &ClassifyArgs) -> Result<ViewerConfig> {
    let mut config = load_config(&args.input)?;
    if let Some(top) = args.top {
        config.top_values = top;
    }
    if let Some(palette) = &args.palette {
        config.palette = PaletteSpec::Named(palette.clone());
    }
    Ok(config)
}

fn select_layer(ids: &[LayerId], position: usize) -> Result<LayerId> {
    if position == 0 {
        bail!("Layer numbers start at 1");
    }
    ids.get(position - 1)
        .copied()
        .ok_or_else(|| anyhow!("Upload produced {} layer(s); no layer {position}", ids.len()))
}

fn handle_stats(args: &ClassifyArgs) -> Result<()> {
    let config = classify_config(args)?;
    let top = config.top_values;
    let (session, ids) = open_session(&args.input, config)?;
    let id = select_layer(&ids, args.layer)?;
    let layer = session.layer(id)?;
    if layer.field(&args.field).is_none() {
        bail!("Field '{}' does not exist on '{}'", args.field, layer.title());
    }
    let stats = frequency::compute_stats_with_limit(layer.attributes(), &args.field, top)
        .ok_or_else(|| anyhow!("Layer '{}' has no features", layer.title()))?;
    if args.input.format == OutputFormat::Json {
        return print_json(&stats);
    }
    emit_rows(
        args.input.format,
        &["field", "value", "count", "percent"],
        &stats.render_rows(),
    )?;
    info!(
        "{} feature(s), {} valid, {} unique value(s)",
        stats.total_features, stats.valid_count, stats.unique_count
    );
    Ok(())
}

fn handle_classify(args: &ClassifyArgs) -> Result<()> {
    let config = classify_config(args)?;
    let (mut session, ids) = open_session(&args.input, config)?;
    let id = select_layer(&ids, args.layer)?;
    let summary = session
        .classify(id, &args.field)
        .with_context(|| format!("Classifying on '{}'", args.field))?;
    if args.input.format == OutputFormat::Json {
        return print_json(&summary);
    }
    emit_rows(
        args.input.format,
        &["label", "count", "percent", "color"],
        &summary.legend.render_rows(),
    )?;
    let hidden = summary.legend.hidden_count();
    if hidden > 0 {
        info!(
            "{hidden} feature(s) outside the top {} value(s) are drawn as '{}'",
            summary.legend.entries.len(),
            renderer::OTHER_LABEL
        );
    }
    Ok(())
}

fn emit_rows(format: OutputFormat, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            writer.write_record(headers)?;
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush().context("Flushing CSV output")?;
        }
        _ => table::print_table(headers, rows),
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing JSON output")?;
    println!("{rendered}");
    Ok(())
}
