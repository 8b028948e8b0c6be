//! Unit tests for climdiag modules
//!
//! These tests cover templating, metadata handling, settings, time decoding,
//! region masking and the masked reductions without touching NetCDF files.

use clap::Parser;
use climdiag::{
    cli::{Args, Command},
    config::DiagnosticSettings,
    errors::{DiagError, Result},
    field::{Field, HybridPressure, VerticalAxis},
    metadata::{group_metadata, select_metadata, sorted_metadata, DatasetMetadata},
    parallel::{ParallelConfig, ParallelInfo},
    paths::{diagnostic_filename, expand_user, expand_vars, plot_filename, real_name, PlotPaths},
    region::{
        climatological_tropopause_pressure, extract_region, region_mask, select_tropopause, Region,
        TropopauseFields, TropopauseSource,
    },
    statistics::{masked_mean, MaskedReduction, StatOperation},
    tags::{find_tags, replace_tags, CaseModifier},
    time::{Calendar, CalendarDate, TimeAxis, TimeUnits},
};
use ndarray::{array, Array1, Array3, Array4, ArrayD, IxDyn};
use serde_json::json;
use tempfile::tempdir;

fn meta(value: serde_json::Value) -> DatasetMetadata {
    DatasetMetadata::from_json(value).expect("metadata must be a JSON object")
}

fn single_time() -> TimeAxis {
    TimeAxis::new(array![0.0], "days since 2000-01-01", "standard")
}

/// One time step, one longitude, constant data
fn pressure_field(levels: Array1<f64>, latitude: Array1<f64>) -> Result<Field> {
    let shape = (1, levels.len(), latitude.len(), 1);
    Field::new(
        "o3",
        "mol mol-1",
        Array4::from_elem(shape, 1.0_f32),
        single_time(),
        VerticalAxis::AirPressure(levels),
        latitude,
        array![0.0],
    )
}

fn hybrid_field() -> Result<Field> {
    let hybrid = HybridPressure {
        ap: array![0.0, 0.0, 0.0],
        b: array![1.0, 0.5, 0.1],
        surface_pressure: Array3::from_elem((1, 1, 1), 100_000.0),
        model_level_number: array![1.0, 2.0, 3.0],
    };
    Field::new(
        "o3",
        "mol mol-1",
        Array4::from_elem((1, 3, 1, 1), 1.0_f32),
        single_time(),
        VerticalAxis::HybridSigmaPressure(hybrid),
        array![0.0],
        array![0.0],
    )
}

fn column(mask: &Array4<bool>) -> Vec<bool> {
    mask.iter().copied().collect()
}

#[test]
fn test_error_messages() {
    let err = DiagError::MissingTag {
        tag: "mip".to_string(),
        context: "{'dataset': \"X\"}".to_string(),
    };
    assert!(err.to_string().contains("Dataset key 'mip' must be specified"));

    let err = DiagError::DataNotAvailable {
        short_name: "clt".to_string(),
        dataset: "CanESM5".to_string(),
        group: "ECS_high_scen".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "No 'clt' data for 'CanESM5' in 'ECS_high_scen' available"
    );

    let err = DiagError::VariableNotFound {
        var: "o3".to_string(),
    };
    assert!(err.to_string().contains("Variable 'o3' not found"));
}

#[test]
fn test_parallel_config() {
    assert!(ParallelConfig::default().num_threads.is_none());
    assert_eq!(ParallelConfig::new(None), ParallelConfig::default());
    assert_eq!(ParallelConfig::new(Some(4)).num_threads, Some(4));
    assert_eq!(ParallelConfig::new(Some(0)).num_threads, Some(num_cpus::get()));

    let info = ParallelConfig::new(None).setup_global_pool().expect("default pool needs no setup");
    assert!(info.current_threads > 0);
    assert_eq!(info, ParallelInfo::current());
    info.log_info();
}

#[test]
fn test_template_without_tags_is_unchanged() -> Result<()> {
    let paths = replace_tags(&["/plots/static/name/"], &DatasetMetadata::new())?;
    assert_eq!(paths.len(), 1);
    assert!(paths.contains("plots/static/name"));
    Ok(())
}

#[test]
fn test_find_tags() {
    let tags = find_tags("a{dataset}b{exp.upper}{unclosed");
    let raw: Vec<&str> = tags.iter().map(|t| t.raw()).collect();
    assert_eq!(raw, ["dataset", "exp.upper"]);
    assert_eq!(tags[1].key(), "exp");
    assert_eq!(tags[1].modifier(), CaseModifier::Upper);
    assert_eq!(tags[0].modifier(), CaseModifier::None);
}

#[test]
fn test_case_modifiers() -> Result<()> {
    let info = meta(json!({"dataset": "CanESM5"}));
    let paths = replace_tags(&["{dataset.lower}_{dataset.upper}_{dataset}"], &info)?;
    assert!(paths.contains("canesm5_CANESM5_CanESM5"));
    Ok(())
}

#[test]
fn test_list_values_fan_out() -> Result<()> {
    let info = meta(json!({
        "exp": ["historical", "ssp585"],
        "ensemble": ["r1i1p1f1", "r2i1p1f1"],
        "dataset": "MPI-ESM1-2-LR",
    }));
    let paths = replace_tags(&["{dataset}/{exp}/{ensemble}"], &info)?;
    assert_eq!(paths.len(), 4);
    assert!(paths.contains("MPI-ESM1-2-LR/ssp585/r2i1p1f1"));

    let nested = meta(json!({"exp": [["a", "b"], "c"]}));
    assert_eq!(replace_tags(&["{exp}"], &nested)?.len(), 3);
    Ok(())
}

#[test]
fn test_duplicate_templates_collapse() -> Result<()> {
    let info = meta(json!({"dataset": "X"}));
    let paths = replace_tags(&["/{dataset}/", "{dataset}"], &info)?;
    assert_eq!(paths.len(), 1);
    Ok(())
}

#[test]
fn test_scalar_rendering() -> Result<()> {
    let info = meta(json!({"start_year": 1850, "flag": true, "cmor": false, "parent": null}));
    let paths = replace_tags(&["{start_year}_{flag}_{cmor}_{parent}"], &info)?;
    assert!(paths.contains("1850_True_False_None"));
    Ok(())
}

#[test]
fn test_missing_tag_is_an_error() {
    let info = meta(json!({"dataset": "X"}));
    match replace_tags(&["{dataset}/{mip}"], &info) {
        Err(DiagError::MissingTag { tag, context }) => {
            assert_eq!(tag, "mip");
            assert!(context.contains("dataset"));
        }
        other => panic!("expected MissingTag, got {other:?}"),
    }
}

#[test]
fn test_latestversion_left_verbatim() -> Result<()> {
    let info = meta(json!({"dataset": "X"}));
    let paths = replace_tags(&["{dataset}/{latestversion}"], &info)?;
    assert!(paths.contains("X/{latestversion}"));
    Ok(())
}

#[test]
fn test_sub_experiment_prefixes_ensemble() -> Result<()> {
    let info = meta(json!({
        "dataset": "X",
        "ensemble": "r1i1p1f1",
        "sub_experiment": "s1960",
    }));

    // bounded by word characters: both variants get the prefix
    let bounded = replace_tags(&["{dataset}_{ensemble}_gn"], &info)?;
    assert_eq!(bounded.len(), 1);
    assert!(bounded.contains("X_s1960-r1i1p1f1_gn"));

    let separated = replace_tags(&["{dataset}/{ensemble}"], &info)?;
    assert_eq!(separated.len(), 2);
    assert!(separated.contains("X/r1i1p1f1"));
    assert!(separated.contains("X/s1960-r1i1p1f1"));
    Ok(())
}

#[test]
fn test_real_name() {
    assert_eq!(real_name("tasYmean"), "tas");
    assert_eq!(real_name("prYsum"), "pr");
    assert_eq!(real_name("clt"), "clt");
    assert_eq!(real_name("lwpsum"), "lwp");
}

#[test]
fn test_output_filenames() {
    let settings = DiagnosticSettings::new("/out/plots", "/out/work");
    assert_eq!(
        diagnostic_filename("lifetime", &settings, "nc"),
        std::path::PathBuf::from("/out/work/lifetime.nc")
    );
    assert_eq!(
        plot_filename("boxplot", &settings),
        std::path::PathBuf::from("/out/plots/boxplot.png")
    );
}

#[test]
fn test_plot_paths() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let plot_dir = temp_dir.path().join("plots").join("recipe").join("diag");
    let settings = DiagnosticSettings::new(&plot_dir, temp_dir.path().join("work"));
    let paths = PlotPaths::from_settings(&settings)?;

    let info = meta(json!({
        "dataset": "CanESM5",
        "exp": "historical",
        "modeling_realm": "atmos",
        "variable_group": "tasYmean",
        "mip": "Amon",
        "ensemble": "r1i1p1f1",
    }));

    let folder = paths.plot_folder(&info)?;
    assert_eq!(
        folder,
        temp_dir.path().join("plots").join("CanESM5").join("historical").join("atmos").join("tas")
    );
    assert!(folder.is_dir());

    let name = paths.plot_name("timeseries", &info, true)?;
    assert_eq!(name, "timeseries_tas_CanESM5_Amon_historical_r1i1p1f1.png");
    assert_eq!(paths.plot_path("timeseries", &info, false)?, folder.join(name.trim_end_matches(".png")));

    let no_group = meta(json!({"dataset": "CanESM5"}));
    assert!(matches!(
        paths.plot_folder(&no_group),
        Err(DiagError::MissingMetadataKey { .. })
    ));
    Ok(())
}

#[test]
fn test_plot_folder_expands_environment() -> Result<()> {
    std::env::set_var("CLIMDIAG_TEST_SUBDIR", "expanded");
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let mut settings = DiagnosticSettings::new(temp_dir.path().join("plots"), temp_dir.path().join("work"));
    settings.plot_folder = Some("{plot_dir}/$CLIMDIAG_TEST_SUBDIR/{dataset}".to_string());
    let paths = PlotPaths::from_settings(&settings)?;

    let info = meta(json!({"dataset": "CanESM5", "variable_group": "tas"}));
    let folder = paths.plot_folder(&info)?;
    assert_eq!(folder, temp_dir.path().join("plots").join("expanded").join("CanESM5"));
    assert!(folder.is_dir());
    Ok(())
}

#[test]
fn test_path_expansion() {
    std::env::set_var("CLIMDIAG_TEST_ROOT", "/data");
    assert_eq!(expand_vars("$CLIMDIAG_TEST_ROOT/plots"), "/data/plots");
    assert_eq!(expand_vars("${CLIMDIAG_TEST_ROOT}_old/x"), "/data_old/x");
    assert_eq!(expand_vars("a/$CLIMDIAG_TEST_UNSET/b"), "a/$CLIMDIAG_TEST_UNSET/b");
    assert_eq!(expand_vars("cost$"), "cost$");
    assert_eq!(expand_vars("${CLIMDIAG_TEST_ROOT"), "${CLIMDIAG_TEST_ROOT");

    if let Ok(home) = std::env::var("HOME") {
        assert_eq!(expand_user("~/plots"), format!("{}/plots", home.trim_end_matches('/')));
    }
    assert_eq!(expand_user("~other/plots"), "~other/plots");
    assert_eq!(expand_user("plots/~"), "plots/~");
}

#[test]
fn test_metadata_grouping() {
    let entries = vec![
        meta(json!({"dataset": "B", "variable_group": "clt_hist"})),
        meta(json!({"dataset": "A", "variable_group": "clt_hist"})),
        meta(json!({"dataset": "C", "variable_group": "clt_scen"})),
        meta(json!({"dataset": "D"})),
    ];

    let groups = group_metadata(&entries, "variable_group", Some("dataset"));
    assert_eq!(groups.len(), 3);
    let hist = &groups[&Some("clt_hist".to_string())];
    let names: Vec<String> = hist.iter().filter_map(|m| m.get_str("dataset")).collect();
    assert_eq!(names, ["A", "B"]);
    assert_eq!(groups[&None].len(), 1);

    let selected = select_metadata(&entries, &[("variable_group", "clt_hist"), ("dataset", "B")]);
    assert_eq!(selected.len(), 1);

    let sorted = sorted_metadata(&entries, "dataset");
    assert_eq!(sorted[0].get_str("dataset").as_deref(), Some("A"));
}

#[test]
fn test_settings_from_file() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("settings.json");
    let document = json!({
        "plot_dir": "/out/plots",
        "work_dir": "/out/work",
        "input_data": {
            "/data/clt_CanESM5.nc": {"dataset": "CanESM5", "short_name": "clt"}
        },
        "group_by": [["ECS_high_hist", "ECS_high_scen"]],
        "recipe_specific": 5
    });
    std::fs::write(&path, serde_json::to_string(&document)?)?;

    let settings = DiagnosticSettings::from_file(&path)?;
    assert_eq!(settings.output_file_type, "png");
    assert_eq!(settings.title, "Test");
    assert_eq!(settings.exclude_datasets.len(), 3);
    assert_eq!(settings.group_by.len(), 1);
    assert_eq!(settings.extra.get("recipe_specific"), Some(&json!(5)));

    let inputs = settings.input_metadata();
    assert_eq!(inputs[0].get_str("filename").as_deref(), Some("/data/clt_CanESM5.nc"));
    Ok(())
}

#[test]
fn test_time_decoding() -> Result<()> {
    let standard = TimeUnits::parse("days since 1850-01-01", "standard")?;
    assert_eq!(standard.to_date(31.0)?, CalendarDate::new(1850, 2, 1));
    assert_eq!(standard.to_value(&CalendarDate::new(1850, 3, 1))?, 59.0);

    let noleap = TimeUnits::parse("days since 2000-01-01", "noleap")?;
    assert_eq!(noleap.to_date(365.0)?, CalendarDate::new(2001, 1, 1));

    let day360 = TimeUnits::parse("days since 2000-01-01", "360_day")?;
    assert_eq!(day360.to_date(30.0)?, CalendarDate::new(2000, 2, 1));
    assert_eq!(day360.to_date(360.0)?, CalendarDate::new(2001, 1, 1));

    let hourly = TimeUnits::parse("hours since 2000-01-01 00:00:00", "gregorian")?;
    let date = hourly.to_date(36.0)?;
    assert_eq!((date.day, date.hour), (2, 12));

    assert!(TimeUnits::parse("fortnights since 2000-01-01", "standard").is_err());
    assert!("julian".parse::<Calendar>().is_err());
    assert_eq!(Calendar::Standard.days_in_month(2000, 2), 29);
    assert_eq!(Calendar::Standard.days_in_month(1900, 2), 28);
    assert_eq!(Calendar::AllLeap.days_in_year(2001), 366);
    Ok(())
}

#[test]
fn test_region_parsing() {
    assert_eq!("TROP".parse::<Region>().ok(), Some(Region::Troposphere));
    assert_eq!("stratosphere".parse::<Region>().ok(), Some(Region::Stratosphere));
    assert!(matches!(
        "MESOSPHERE".parse::<Region>(),
        Err(DiagError::NotImplemented(_))
    ));
    assert_eq!(Region::Stratosphere.to_string(), "STRA");
}

#[test]
fn test_climatological_tropopause() {
    assert!((climatological_tropopause_pressure(0.0) - 8500.0).abs() < 1e-9);
    assert!((climatological_tropopause_pressure(90.0) - 30000.0).abs() < 1e-6);
    assert!((climatological_tropopause_pressure(-90.0) - 30000.0).abs() < 1e-6);
}

#[test]
fn test_troposphere_and_stratosphere_are_complementary() -> Result<()> {
    let field = pressure_field(array![100_000.0, 8500.0, 5000.0], array![0.0])?;
    let none = TropopauseFields::default();

    let trop = region_mask(&field, Region::Troposphere, &none)?;
    let stra = region_mask(&field, Region::Stratosphere, &none)?;

    // the tropopause level itself belongs to the stratosphere only
    assert_eq!(column(&trop), [false, true, true]);
    assert_eq!(column(&stra), [true, false, false]);
    assert!(trop.iter().zip(stra.iter()).all(|(&a, &b)| a != b));
    Ok(())
}

#[test]
fn test_pressure_tropopause_preferred() -> Result<()> {
    let field = pressure_field(array![100_000.0, 50_000.0, 10_000.0], array![0.0])?;
    let tropopause = TropopauseFields {
        instantaneous: None,
        pressure: Some(Array3::from_elem((1, 1, 1), 60_000.0)),
    };
    let comparison = select_tropopause(&field, &tropopause)?;
    assert_eq!(comparison.source, TropopauseSource::Pressure);

    let mask = region_mask(&field, Region::Troposphere, &tropopause)?;
    assert_eq!(column(&mask), [false, true, true]);
    Ok(())
}

#[test]
fn test_hybrid_tropopause_sources() -> Result<()> {
    let field = hybrid_field()?;

    let climatology = select_tropopause(&field, &TropopauseFields::default())?;
    assert_eq!(climatology.source, TropopauseSource::Climatological);

    let by_pressure = TropopauseFields {
        instantaneous: None,
        pressure: Some(Array3::from_elem((1, 1, 1), 20_000.0)),
    };
    // derived pressure is 100000, 50000 and 10000 Pa
    assert_eq!(
        column(&region_mask(&field, Region::Troposphere, &by_pressure)?),
        [false, false, true]
    );

    let by_level = TropopauseFields {
        instantaneous: Some(Array3::from_elem((1, 1, 1), 2.0)),
        pressure: Some(Array3::from_elem((1, 1, 1), 20_000.0)),
    };
    let comparison = select_tropopause(&field, &by_level)?;
    assert_eq!(comparison.source, TropopauseSource::InstantaneousLevel);
    assert_eq!(
        column(&region_mask(&field, Region::Stratosphere, &by_level)?),
        [false, false, true]
    );
    Ok(())
}

#[test]
fn test_unsupported_vertical_coordinate() -> Result<()> {
    let field = Field::new(
        "o3",
        "mol mol-1",
        Array4::from_elem((1, 2, 1, 1), 1.0_f32),
        single_time(),
        VerticalAxis::from_points("altitude", array![1000.0, 20_000.0]),
        array![0.0],
        array![0.0],
    )?;
    assert!(matches!(
        extract_region(&field, Region::Troposphere, &TropopauseFields::default()),
        Err(DiagError::UnsupportedCoordinate(name)) if name == "altitude"
    ));
    Ok(())
}

#[test]
fn test_tropopause_shape_is_checked() -> Result<()> {
    let field = pressure_field(array![100_000.0, 5000.0], array![0.0, 45.0])?;
    let tropopause = TropopauseFields {
        instantaneous: None,
        pressure: Some(Array3::from_elem((1, 3, 1), 20_000.0)),
    };
    assert!(matches!(
        region_mask(&field, Region::Troposphere, &tropopause),
        Err(DiagError::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_extraction_keeps_existing_mask() -> Result<()> {
    let mut field = pressure_field(array![100_000.0, 50_000.0, 5000.0], array![0.0])?;
    field.data[[0, 0, 0, 0]] = f32::NAN;
    field.mask[[0, 0, 0, 0]] = true;

    let extracted = extract_region(&field, Region::Troposphere, &TropopauseFields::default())?;
    assert_eq!(column(&extracted.mask), [true, false, true]);
    assert_eq!(extracted.valid_count(), 1);
    assert!(extracted.masked_values()[[0, 2, 0, 0]].is_nan());
    Ok(())
}

#[test]
fn test_field_shape_validation() {
    let result = Field::new(
        "o3",
        "1",
        Array4::from_elem((1, 2, 1, 1), 1.0_f32),
        single_time(),
        VerticalAxis::AirPressure(array![100_000.0]),
        array![0.0],
        array![0.0],
    );
    assert!(matches!(result, Err(DiagError::ShapeMismatch { .. })));
}

#[test]
fn test_stat_operation() -> Result<()> {
    assert_eq!("max".parse::<StatOperation>()?, StatOperation::Max);
    assert_eq!(StatOperation::Min.as_str(), "minimum");
    assert!("median".parse::<StatOperation>().is_err());
    assert_eq!(StatOperation::Sum.reduce([1.0, f64::NAN, 2.0]), 3.0);
    assert!(StatOperation::Mean.reduce([f64::NAN]).is_nan());
    assert_eq!(masked_mean(&[1.0, 3.0, f64::INFINITY]), Some(2.0));
    assert_eq!(masked_mean(&[]), None);
    Ok(())
}

#[test]
fn test_masked_reductions() -> Result<()> {
    let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, f64::NAN]].into_dyn();

    let mean = data.reduce_along_axis(None, 0, StatOperation::Mean)?;
    assert_eq!(mean, array![2.5, 3.5, 3.0].into_dyn());

    let sum = data.reduce_along_axis(None, 1, StatOperation::Sum)?;
    assert_eq!(sum, array![6.0, 9.0].into_dyn());

    let mask = array![[true, false, false], [false, false, false]].into_dyn();
    let masked_min = data.reduce_along_axis(Some(&mask), 0, StatOperation::Min)?;
    assert_eq!(masked_min, array![4.0, 2.0, 3.0].into_dyn());

    let total = data.reduce_along_axes(None, &[0, 1], StatOperation::Sum)?;
    assert_eq!(total.shape(), &[] as &[usize]);
    assert_eq!(total[IxDyn(&[])], 15.0);

    let all_masked = ArrayD::from_elem(IxDyn(&[2, 2]), true);
    let empty = ArrayD::from_elem(IxDyn(&[2, 2]), 1.0_f64).reduce_along_axis(
        Some(&all_masked),
        1,
        StatOperation::Max,
    )?;
    assert!(empty.iter().all(|v| v.is_nan()));

    assert!(data.reduce_along_axis(None, 2, StatOperation::Mean).is_err());
    assert!(data.reduce_along_axes(None, &[1, 1], StatOperation::Mean).is_err());
    Ok(())
}

#[test]
fn test_cli_parsing() {
    let args = Args::try_parse_from([
        "climdiag", "extract-region", "--file", "in.nc", "--var", "o3", "--region", "trop",
        "--output", "out.nc", "--threads", "2",
    ])
    .expect("valid arguments");
    assert_eq!(args.threads, Some(2));
    assert!(matches!(
        args.command,
        Command::ExtractRegion { region: Region::Troposphere, .. }
    ));

    let args = Args::try_parse_from([
        "climdiag", "timeseries", "--file", "a.nc", "b.nc", "--var", "tas", "--moving-average", "10 years",
        "--anomaly", "1850", "1900", "--output", "out.csv",
    ])
    .expect("valid arguments");
    match args.command {
        Command::Timeseries {
            file,
            moving_average,
            anomaly,
            ..
        } => {
            assert_eq!(file.len(), 2);
            assert_eq!(moving_average.map(|w| w.width), Some(10));
            assert_eq!(anomaly, Some(vec![1850, 1900]));
        }
        other => panic!("unexpected command {other:?}"),
    }

    assert!(Args::try_parse_from([
        "climdiag", "extract-region", "--file", "in.nc", "--var", "o3", "--region", "meso",
        "--output", "out.nc",
    ])
    .is_err());
}
