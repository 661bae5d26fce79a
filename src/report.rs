//! CSV reports — the contract the simulation core honors toward its
//! environment. One row per (parameter point, repetition) run summary,
//! a failures report for missing samples, and an optional long-format
//! time-series report. Downstream aggregation and plotting are external
//! collaborators that consume these files.

use csv::Writer;
use serde::Serialize;
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::path::Path;

use crate::error::EpinetError;
use crate::experiment::ResultSet;
use crate::log::info;

#[derive(Serialize)]
struct SummaryRow {
    point_index: usize,
    repetition: usize,
    population: usize,
    edge_probability: f64,
    beta: f64,
    alpha: f64,
    initial_infected_fraction: f64,
    susceptible: usize,
    infected: usize,
    removed: usize,
    elapsed_time: f64,
}

#[derive(Serialize)]
struct FailureRow<'a> {
    point_index: usize,
    repetition: usize,
    message: &'a str,
}

#[derive(Serialize)]
struct TimeSeriesRow {
    point_index: usize,
    repetition: usize,
    time: f64,
    susceptible: usize,
    infected: usize,
    removed: usize,
}

// Checks that the path is valid. Creates the file and all parent
// directories if they do not exist.
fn create_report_file(path_name: &str) -> Result<File, EpinetError> {
    let path = Path::new(path_name);
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    create_dir_all(parent)?;
                }
            }
            let file = File::create(path)?;
            Ok(file)
        }
        _ => Err(EpinetError::ReportError(
            "report output files must be CSVs".to_string(),
        )),
    }
}

/// Write one row per completed run.
///
/// # Errors
///
/// Returns `ReportError` for a non-CSV path and propagates IO and CSV
/// errors.
pub fn write_summary_report(path: &str, results: &ResultSet) -> Result<(), EpinetError> {
    let file = create_report_file(path)?;
    let mut writer = Writer::from_writer(file);
    for record in &results.records {
        writer.serialize(SummaryRow {
            point_index: record.point_index,
            repetition: record.repetition,
            population: record.point.population,
            edge_probability: record.point.edge_probability,
            beta: record.point.beta,
            alpha: record.point.alpha,
            initial_infected_fraction: record.point.initial_infected_fraction,
            susceptible: record.summary.susceptible,
            infected: record.summary.infected,
            removed: record.summary.removed,
            elapsed_time: record.summary.elapsed_time,
        })?;
    }
    writer.flush()?;
    info!("wrote {} summary rows to {path}", results.records.len());
    Ok(())
}

/// Write one row per failed (point, repetition) pair.
///
/// # Errors
///
/// Returns `ReportError` for a non-CSV path and propagates IO and CSV
/// errors.
pub fn write_failure_report(path: &str, results: &ResultSet) -> Result<(), EpinetError> {
    let file = create_report_file(path)?;
    let mut writer = Writer::from_writer(file);
    for failure in &results.failures {
        writer.serialize(FailureRow {
            point_index: failure.point_index,
            repetition: failure.repetition,
            message: &failure.message,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the compartment time series of every run that recorded one, in
/// long format keyed by (point, repetition, time).
///
/// # Errors
///
/// Returns `ReportError` for a non-CSV path and propagates IO and CSV
/// errors.
pub fn write_time_series_report(path: &str, results: &ResultSet) -> Result<(), EpinetError> {
    let file = create_report_file(path)?;
    let mut writer = Writer::from_writer(file);
    for record in &results.records {
        let Some(series) = &record.summary.time_series else {
            continue;
        };
        for sample in series {
            writer.serialize(TimeSeriesRow {
                point_index: record.point_index,
                repetition: record.repetition,
                time: sample.time,
                susceptible: sample.susceptible,
                infected: sample.infected,
                removed: sample.removed,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}
