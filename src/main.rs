extern crate log;
pub mod analysis;
pub mod config;
pub mod crs;
pub mod error;
pub mod geocode;
pub mod geofile;
pub mod pipeline;
pub mod sample_data;
pub mod store;
use crate::config::Config;
use crate::pipeline::{Module, ModuleOutput, Pipeline, PipelineOutput};
use clap::Parser;
use std::path::PathBuf;

/// Spatial analysis of Indonesian provincial boundaries and land use.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config_filepath: Option<PathBuf>,

    /// Run a single module instead of the whole pipeline.
    #[arg(short, long, value_enum)]
    module: Option<Module>,

    /// Target province code, e.g. JK or JI.
    #[arg(short, long)]
    province: Option<String>,

    /// Use generated sample data instead of the configured files.
    #[arg(long)]
    sample_data: bool,
}

fn log_pipeline_output(output: &PipelineOutput) {
    log::info!("Provinces: {}", output.provinces.len());
    log::info!("Land use features: {}", output.land_use.len());
    log::info!(
        "Overlap summary: {} rows, {:.2} ha",
        output.overlap_summary.rows.len(),
        output.overlap_summary.total_area_ha()
    );
    log::info!(
        "Land use {} {}: {}",
        output.config.analysis.operation,
        output.config.analysis.target_province,
        output.query_result.len()
    );
    if let Some(comparison) = &output.comparison {
        log::info!(
            "IoU with {} for '{}': {:.4}",
            comparison.service,
            comparison.place_name,
            comparison.iou
        );
    }
}

fn log_module_output(output: &ModuleOutput) {
    match output {
        ModuleOutput::DataIngestion {
            provinces,
            land_use,
        } => log::info!(
            "Ingested {} provinces and {} land use features",
            provinces.len(),
            land_use.len()
        ),
        ModuleOutput::SpatialAnalysis(analysis) => log::info!(
            "{} summary rows, {} query results, {} matches",
            analysis.overlap_summary.rows.len(),
            analysis.query_result.len(),
            analysis.match_count
        ),
        ModuleOutput::MapComparison(comparison) => log::info!(
            "IoU with {} for '{}': {:.4}",
            comparison.service,
            comparison.place_name,
            comparison.iou
        ),
        ModuleOutput::Database { tables } => log::info!("Wrote tables {:?}", tables),
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let mut config = match &args.config_filepath {
        Some(config_filepath) => Config::from_yaml_file(config_filepath)?,
        None => Config::default(),
    };
    config.apply_overrides(args.province.as_deref(), args.sample_data);

    let mut pipeline = Pipeline::from_config(config)?;
    match args.module {
        Some(module) => log_module_output(&pipeline.run_module(module)?),
        None => log_pipeline_output(&pipeline.run()?),
    }
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
