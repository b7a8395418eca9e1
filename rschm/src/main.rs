use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use serde::Serialize;
use serde_json::{Map, Value};

use rschm::commons::basic_functions::default_workers;
use rschm::collect::global_variables::GROUND_CLASSIFICATION;
use rschm::{Pipeline, PipelineConfig};

/// Preprocess LAS/LAZ tiles into compact CHM/DTM grids.
#[derive(Parser, Debug, Clone)]
#[command(name = "rschm", version)]
struct Args {
    /// JSON file with any of the settings below; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with .las/.laz files [default: uploaded_lidar_data]
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output directory [default: web/data]
    #[arg(long)]
    output: Option<PathBuf>,

    /// Grid resolution (NxN) [default: 1024]
    #[arg(long)]
    resolution: Option<usize>,

    /// Points per chunk [default: 5000000]
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Source CRS of the tiles [default: EPSG:3067]
    #[arg(long)]
    source_crs: Option<String>,

    /// Parallel workers [default: available cores - 1]
    #[arg(long)]
    workers: Option<usize>,

    /// Classification code of ground returns [default: 2]
    #[arg(long)]
    ground_class: Option<u8>,
}

type Settings = Map<String, Value>;

/// Settings file: a JSON object with any subset of the `PipelineConfig` keys
fn load_config_file(path: &Path) -> Result<Settings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn set<T: Serialize>(settings: &mut Settings, key: &str, value: Option<T>) -> Result<()> {
    if let Some(value) = value {
        settings.insert(key.to_string(), serde_json::to_value(value)?);
    }
    Ok(())
}

/// Flags win over the config file, which wins over the defaults
fn resolve_config(args: Args) -> Result<PipelineConfig> {
    let mut settings = Settings::new();
    set(&mut settings, "input_dir", Some("uploaded_lidar_data"))?;
    set(&mut settings, "output_dir", Some("web/data"))?;
    set(&mut settings, "resolution", Some(1024))?;
    set(&mut settings, "chunk_size", Some(5_000_000))?;
    set(&mut settings, "source_crs", Some("EPSG:3067"))?;
    set(&mut settings, "workers", Some(default_workers()))?;
    set(&mut settings, "ground_class", Some(GROUND_CLASSIFICATION))?;

    if let Some(path) = &args.config {
        settings.extend(load_config_file(path)?);
    }

    set(&mut settings, "input_dir", args.input)?;
    set(&mut settings, "output_dir", args.output)?;
    set(&mut settings, "resolution", args.resolution)?;
    set(&mut settings, "chunk_size", args.chunk_size)?;
    set(&mut settings, "source_crs", args.source_crs)?;
    set(&mut settings, "workers", args.workers)?;
    set(&mut settings, "ground_class", args.ground_class)?;

    serde_json::from_value(Value::Object(settings)).context("Invalid configuration")
}

#[cfg(feature = "proj")]
fn run(config: PipelineConfig) -> Result<()> {
    let pipeline = Pipeline::new(config, rschm::ProjProvider)?;
    let summary = pipeline.run()?;
    let metadata = &summary.output.artifacts.metadata;
    info!(
        "Processed {} file(s) into a {}x{} grid (CHM max {:.2} m)",
        summary.output.files.len(),
        metadata.width,
        metadata.height,
        metadata.chm_max_height
    );
    Ok(())
}

#[cfg(not(feature = "proj"))]
fn run(config: PipelineConfig) -> Result<()> {
    if config.source_crs != rschm::geo_core::PROCESSING_CRS {
        anyhow::bail!(
            "built without the `proj` feature: tiles must already be in {}",
            rschm::geo_core::PROCESSING_CRS
        );
    }
    let pipeline = Pipeline::new(config, rschm::IdentityProvider)?;
    let summary = pipeline.run()?;
    info!("Processed {} file(s)", summary.output.files.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = resolve_config(Args::parse()).and_then(run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
