//! NetCDF round trips through the loaders, the region extractor and the writer

use climdiag::{
    diagnostics::{calculate_lifetime, write_timeseries_csv, PlotType, ScalarLoader},
    errors::{DiagError, Result},
    field::VerticalAxis,
    metadata::DatasetMetadata,
    netcdf_io::{load_field, load_timeseries, load_tropopause, NetCDFScalarLoader, NetCDFWriter, FILL_VALUE},
    region::{extract_region, Region},
};
use ndarray::{Array1, Array3, Array4, IxDyn};
use netcdf::{create, open, AttributeValue};
use serde_json::json;
use std::path::Path;
use tempfile::tempdir;

/// o3 on (time=1, plev=3, lat=2, lon=2) with one fill value, plus ptp when asked
fn write_pressure_file(path: &Path, with_ptp: bool) -> Result<()> {
    let mut file = create(path)?;
    file.add_dimension("time", 1)?;
    file.add_dimension("plev", 3)?;
    file.add_dimension("lat", 2)?;
    file.add_dimension("lon", 2)?;

    let mut time = file.add_variable::<f64>("time", &["time"])?;
    time.put_attribute("units", "days since 2000-01-01")?;
    time.put_attribute("calendar", "standard")?;
    time.put(Array1::from(vec![15.0]).view(), ..)?;

    let mut plev = file.add_variable::<f64>("plev", &["plev"])?;
    plev.put_attribute("standard_name", "air_pressure")?;
    plev.put_attribute("units", "hPa")?;
    plev.put(Array1::from(vec![1000.0, 500.0, 50.0]).view(), ..)?;

    let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
    lat.put(Array1::from(vec![0.0, 60.0]).view(), ..)?;
    let mut lon = file.add_variable::<f64>("lon", &["lon"])?;
    lon.put(Array1::from(vec![0.0, 90.0]).view(), ..)?;

    let mut values: Vec<f32> = (0..12).map(|i| i as f32 + 1.0).collect();
    values[0] = -999.0;
    let mut o3 = file.add_variable::<f32>("o3", &["time", "plev", "lat", "lon"])?;
    o3.put_attribute("_FillValue", -999.0f32)?;
    o3.put_attribute("units", "mol mol-1")?;
    o3.put_attribute("long_name", "Ozone")?;
    o3.put(Array4::from_shape_vec((1, 3, 2, 2), values)?.view(), ..)?;

    let mut loss = file.add_variable::<f32>("loss", &["time", "plev", "lat", "lon"])?;
    loss.put_attribute("units", "s-1")?;
    loss.put(Array4::from_elem((1, 3, 2, 2), 0.25_f32).view(), ..)?;

    if with_ptp {
        let mut ptp = file.add_variable::<f64>("ptp", &["time", "lat", "lon"])?;
        ptp.put_attribute("units", "hPa")?;
        ptp.put(Array3::from_elem((1, 2, 2), 600.0).view(), ..)?;
    }
    Ok(())
}

#[test]
fn test_load_field() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("o3.nc");
    write_pressure_file(&file_path, false)?;

    let file = open(&file_path)?;
    let field = load_field(&file, "o3")?;

    assert_eq!(field.dim(), (1, 3, 2, 2));
    assert_eq!(field.units, "mol mol-1");
    assert_eq!(field.dimension_names[1], "plev");
    assert_eq!(
        field.vertical,
        VerticalAxis::AirPressure(Array1::from(vec![100_000.0, 50_000.0, 5000.0]))
    );
    assert_eq!(field.time.units, "days since 2000-01-01");
    assert!(field.mask[[0, 0, 0, 0]]);
    assert_eq!(field.valid_count(), 11);

    assert!(matches!(
        load_field(&file, "missing"),
        Err(DiagError::VariableNotFound { .. })
    ));
    assert!(matches!(load_field(&file, "lat"), Err(DiagError::InvalidField(_))));
    Ok(())
}

#[test]
fn test_extract_region_round_trip() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let input_path = temp_dir.path().join("o3.nc");
    let output_path = temp_dir.path().join("o3_trop.nc");
    write_pressure_file(&input_path, false)?;

    let input = open(&input_path)?;
    let field = load_field(&input, "o3")?;
    let tropopause = load_tropopause(&input)?;
    assert!(tropopause.pressure.is_none() && tropopause.instantaneous.is_none());

    // climatological tropopause: 8500 Pa at the equator, 24625 Pa at 60N
    let extracted = extract_region(&field, Region::Troposphere, &tropopause)?;
    assert_eq!(extracted.valid_count(), 7);
    NetCDFWriter::new(&input, &output_path).write_field(&extracted)?;

    let output = open(&output_path)?;
    let var = output.variable("o3").expect("o3 written");
    let values: Vec<f32> = var.get_values::<f32, _>(..)?;
    assert_eq!(values[0], FILL_VALUE);
    assert_eq!(values[1], 2.0);
    assert!(values[8..].iter().all(|&v| v == FILL_VALUE));

    match var.attribute("units").expect("units copied").value()? {
        AttributeValue::Str(units) => assert_eq!(units, "mol mol-1"),
        other => panic!("unexpected units attribute {other:?}"),
    }
    assert!(output.attribute("history").is_some());
    assert!(output.variable("plev").is_some());

    // reloading sees the same mask through _FillValue
    let reloaded = load_field(&output, "o3")?;
    assert_eq!(reloaded.valid_count(), 7);
    Ok(())
}

#[test]
fn test_pressure_tropopause_from_file() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("o3_ptp.nc");
    write_pressure_file(&file_path, true)?;

    let file = open(&file_path)?;
    let tropopause = load_tropopause(&file)?;
    let ptp = tropopause.pressure.as_ref().expect("ptp loaded");
    assert!(ptp.iter().all(|&p| p == 60_000.0));

    let field = load_field(&file, "o3")?;
    let stratosphere = extract_region(&field, Region::Stratosphere, &tropopause)?;
    // only the 1000 hPa level lies below 600 hPa
    assert_eq!(stratosphere.valid_count(), 8);
    Ok(())
}

#[test]
fn test_lifetime_written_as_reduction() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let input_path = temp_dir.path().join("chem.nc");
    let output_path = temp_dir.path().join("lifetime.nc");
    write_pressure_file(&input_path, false)?;

    let input = open(&input_path)?;
    let reaction = load_field(&input, "loss")?;
    let weight = load_field(&input, "o3")?;
    let tropopause = load_tropopause(&input)?;

    let reduced = calculate_lifetime(
        &reaction,
        &weight,
        PlotType::OneDProfile,
        Region::Troposphere,
        &tropopause,
    )?;
    assert_eq!(reduced.dimensions, ["time", "plev"]);
    // lifetime is 1 / reaction wherever the sums are defined
    assert!((reduced.data[IxDyn(&[0, 1])] - 4.0).abs() < 1e-9);

    NetCDFWriter::new(&input, &output_path).write_reduced(
        &reduced.data,
        &reduced.dimensions,
        "lifetime_loss",
        "loss",
    )?;

    let output = open(&output_path)?;
    let var = output.variable("lifetime_loss").expect("lifetime written");
    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
    assert_eq!(dims, ["time", "plev"]);
    let values: Vec<f32> = var.get_values::<f32, _>(..)?;
    assert_eq!(values.len(), 3);
    assert_eq!(values[2], FILL_VALUE);

    assert!(NetCDFWriter::new(&input, &output_path)
        .write_reduced(&reduced.data, &["time".to_string()], "bad", "loss")
        .is_err());
    Ok(())
}

#[test]
fn test_timeseries_to_csv() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("tas.nc");
    let csv_path = temp_dir.path().join("tas.csv");
    {
        let mut file = create(&file_path)?;
        file.add_dimension("time", 3)?;
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "days since 2000-01-01")?;
        time.put_attribute("calendar", "noleap")?;
        time.put(Array1::from(vec![0.0, 365.0, 730.0]).view(), ..)?;
        let mut tas = file.add_variable::<f64>("tas", &["time"])?;
        tas.put_attribute("units", "K")?;
        tas.put(Array1::from(vec![287.0, 287.5, 288.0]).view(), ..)?;
    }

    let file = open(&file_path)?;
    let series = load_timeseries(&file, "tas")?;
    assert_eq!(series.len(), 3);
    assert_eq!(series.units, "K");
    assert_eq!(series.time.calendar, "noleap");

    write_timeseries_csv(&series, &csv_path)?;
    let text = std::fs::read_to_string(&csv_path)?;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("time,date,value,units"));
    assert_eq!(lines.next(), Some("0.0,2000-01-01 00:00:00,287.0,K"));
    assert_eq!(lines.nth(1), Some("730.0,2002-01-01 00:00:00,288.0,K"));
    Ok(())
}

#[test]
fn test_scalar_loader() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("clt_M1.nc");
    {
        let mut file = create(&file_path)?;
        file.add_dimension("x", 1)?;
        let mut clt = file.add_variable::<f64>("clt", &["x"])?;
        clt.put(Array1::from(vec![55.0]).view(), ..)?;
    }

    let metadata = DatasetMetadata::from_json(json!({
        "short_name": "clt",
        "dataset": "M1",
        "filename": file_path.to_string_lossy(),
    }))?;
    assert_eq!(NetCDFScalarLoader.load_scalar(&metadata)?, 55.0);

    let no_file = DatasetMetadata::from_json(json!({"short_name": "clt"}))?;
    assert!(matches!(
        NetCDFScalarLoader.load_scalar(&no_file),
        Err(DiagError::MissingMetadataKey { .. })
    ));
    Ok(())
}
