//! Entry point for the climdiag application.
//! Handles CLI parsing, logging and thread-pool setup, and dispatches the diagnostics.

use anyhow::{bail, Context};
use clap::Parser;
use climdiag::{
    cli::{Args, Command},
    config::DiagnosticSettings,
    diagnostics::{
        calculate_lifetime, multi_model_timeseries, process_timeseries, run_boxplot,
        write_timeseries_csv, MovingWindow, PlotType,
    },
    metadata::DatasetMetadata,
    netcdf_io::{load_field, load_timeseries, load_tropopause, NetCDFScalarLoader, NetCDFWriter},
    parallel::ParallelConfig,
    region::{extract_region, Region, TropopauseFields},
    tags::replace_tags,
};
use netcdf::open;
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    ParallelConfig::new(args.threads).setup_global_pool()?.log_info();

    match args.command {
        Command::Resolve {
            templates,
            metadata,
        } => resolve(&templates, &metadata),
        Command::ExtractRegion {
            file,
            var,
            region,
            tropopause_file,
            output,
        } => extract(&file, &var, region, tropopause_file.as_deref(), &output),
        Command::Lifetime {
            file,
            reaction,
            weight,
            region,
            plot_type,
            tropopause_file,
            output,
        } => lifetime(
            &file,
            [reaction.as_str(), weight.as_str()],
            region,
            plot_type,
            tropopause_file.as_deref(),
            &output,
        ),
        Command::Timeseries {
            file,
            var,
            moving_average,
            anomaly,
            output,
        } => timeseries(&file, &var, moving_average, anomaly, &output),
        Command::Boxplot { settings } => boxplot(&settings),
    }
}

fn resolve(templates: &[String], metadata: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(metadata)
        .with_context(|| format!("reading metadata {}", metadata.display()))?;
    let metadata: DatasetMetadata = serde_json::from_str(&text)?;
    for path in replace_tags(templates, &metadata)? {
        println!("{path}");
    }
    Ok(())
}

fn tropopause_inputs(file: &Path, tropopause_file: Option<&Path>) -> anyhow::Result<TropopauseFields> {
    let path = tropopause_file.unwrap_or(file);
    let tp_file = open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(load_tropopause(&tp_file)?)
}

fn extract(
    file: &Path,
    var: &str,
    region: Region,
    tropopause_file: Option<&Path>,
    output: &Path,
) -> anyhow::Result<()> {
    let input = open(file).with_context(|| format!("opening {}", file.display()))?;
    let field = load_field(&input, var)?;
    let tropopause = tropopause_inputs(file, tropopause_file)?;

    let extracted = extract_region(&field, region, &tropopause)
        .with_context(|| format!("extracting {region} from '{var}'"))?;
    NetCDFWriter::new(&input, output).write_field(&extracted)?;
    log::info!("Saved result to {}", output.display());
    Ok(())
}

fn lifetime(
    file: &Path,
    [reaction, weight]: [&str; 2],
    region: Region,
    plot_type: PlotType,
    tropopause_file: Option<&Path>,
    output: &Path,
) -> anyhow::Result<()> {
    let input = open(file).with_context(|| format!("opening {}", file.display()))?;
    let reaction_field = load_field(&input, reaction)?;
    let weight_field = load_field(&input, weight)?;
    let tropopause = tropopause_inputs(file, tropopause_file)?;

    let reduced = calculate_lifetime(&reaction_field, &weight_field, plot_type, region, &tropopause)?;
    let var_name = format!("lifetime_{reaction}_{region}");
    NetCDFWriter::new(&input, output).write_reduced(&reduced.data, &reduced.dimensions, &var_name, reaction)?;
    log::info!("Saved result to {}", output.display());
    Ok(())
}

fn timeseries(
    files: &[PathBuf],
    var: &str,
    window: Option<MovingWindow>,
    anomaly: Option<Vec<i32>>,
    output: &Path,
) -> anyhow::Result<()> {
    let mut members = Vec::with_capacity(files.len());
    for file in files {
        let input = open(file).with_context(|| format!("opening {}", file.display()))?;
        let series = load_timeseries(&input, var)?;
        let Some(processed) = process_timeseries(&series, window.as_ref(), anomaly.as_deref())? else {
            bail!(
                "no data of '{var}' in {} within anomaly period {:?}",
                file.display(),
                anomaly.as_deref().unwrap_or_default()
            );
        };
        let name = file
            .file_stem()
            .map_or_else(|| file.display().to_string(), |s| s.to_string_lossy().into_owned());
        members.push((name, processed));
    }

    let series = match members.as_slice() {
        [(_, single)] => single.clone(),
        _ => multi_model_timeseries(&members)?,
    };
    write_timeseries_csv(&series, output)?;
    Ok(())
}

fn boxplot(settings: &Path) -> anyhow::Result<()> {
    let settings = DiagnosticSettings::from_file(settings)
        .with_context(|| format!("loading settings {}", settings.display()))?;
    let outputs = run_boxplot(&settings, &NetCDFScalarLoader)?;
    log::info!(
        "{} records in {} boxes",
        outputs.records.len(),
        outputs.stats.len()
    );
    Ok(())
}
