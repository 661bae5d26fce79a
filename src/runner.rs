//! A command-line entry point for sweep experiments: parse arguments,
//! load a sweep specification from JSON, run it, and write the CSV
//! reports. Downstream binaries call `run_with_args` from their `main`.

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::{Args, Command, FromArgMatches as _};

use crate::error::EpinetError;
use crate::experiment::{run_sweep, ResultSet, SweepSpec};
use crate::log::{info, set_log_level, LevelFilter};
use crate::report::{write_failure_report, write_summary_report, write_time_series_report};

/// Default cli arguments for the epinet runner.
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Path to a JSON sweep specification
    #[arg(short, long)]
    pub config: String,

    /// Base random seed, overriding the specification
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Worker pool size, overriding the specification
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Directory for report output
    #[arg(short, long, default_value = "")]
    pub output_dir: String,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short, long)]
    pub log_level: Option<LevelFilter>,
}

/// Load a sweep specification from a JSON file.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read or a JSON error if it
/// does not describe a `SweepSpec`.
pub fn load_sweep_spec(path: &Path) -> Result<SweepSpec, EpinetError> {
    let file = File::open(path)?;
    let spec: SweepSpec = serde_json::from_reader(file)?;
    Ok(spec)
}

/// Run a sweep from parsed arguments and write its reports.
///
/// # Errors
///
/// Propagates specification loading, sweep setup, and report-writing
/// errors. Per-run failures do not error here; they land in the
/// failures report.
pub fn run_from_args(args: &BaseArgs) -> Result<ResultSet, EpinetError> {
    if let Some(level) = args.log_level {
        set_log_level(level);
    }

    let mut spec = load_sweep_spec(Path::new(&args.config))?;
    if let Some(seed) = args.random_seed {
        spec.base_seed = seed;
    }
    if let Some(workers) = args.workers {
        spec.workers = workers;
    }

    let results = run_sweep(&spec)?;

    let output_dir = if args.output_dir.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(&args.output_dir)
    };
    let summary_path = output_dir.join("summary.csv");
    write_summary_report(&summary_path.to_string_lossy(), &results)?;
    if !results.failures.is_empty() {
        let failures_path = output_dir.join("failures.csv");
        write_failure_report(&failures_path.to_string_lossy(), &results)?;
    }
    if spec.record_time_series {
        let series_path = output_dir.join("time_series.csv");
        write_time_series_report(&series_path.to_string_lossy(), &results)?;
    }
    info!(
        "sweep finished: {} completed runs, {} failures",
        results.records.len(),
        results.failures.len()
    );
    Ok(results)
}

/// Parse command-line arguments and run the sweep they describe.
///
/// # Errors
///
/// Returns an error if argument parsing or the sweep setup fails.
pub fn run_with_args() -> Result<ResultSet, Box<dyn std::error::Error>> {
    let cli = Command::new("epinet");
    let cli = BaseArgs::augment_args(cli);
    let matches = cli.get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    Ok(run_from_args(&args)?)
}

#[cfg(test)]
mod tests {
    use super::{load_sweep_spec, run_from_args, BaseArgs};
    use crate::error::EpinetError;
    use std::io::Write;
    use tempfile::tempdir;

    const SPEC_JSON: &str = r#"{
        "points": [{
            "population": 50,
            "edge_probability": 0.1,
            "beta": 0.3,
            "alpha": 1.0,
            "initial_infected_fraction": 0.05
        }],
        "replications": 2,
        "record_time_series": true
    }"#;

    #[test]
    fn run_from_config_writes_reports() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("sweep.json");
        let mut config = std::fs::File::create(&config_path).unwrap();
        config.write_all(SPEC_JSON.as_bytes()).unwrap();

        let output_dir = dir.path().join("output");
        let args = BaseArgs {
            config: config_path.to_string_lossy().into_owned(),
            random_seed: Some(99),
            workers: Some(2),
            output_dir: output_dir.to_string_lossy().into_owned(),
            log_level: None,
        };
        let results = run_from_args(&args).unwrap();

        assert_eq!(results.records.len(), 2);
        assert!(results.is_complete());
        assert!(output_dir.join("summary.csv").exists());
        assert!(output_dir.join("time_series.csv").exists());
        assert!(!output_dir.join("failures.csv").exists());
    }

    #[test]
    fn missing_config_is_an_io_error() {
        let result = load_sweep_spec(std::path::Path::new("/no/such/sweep.json"));
        assert!(matches!(result, Err(EpinetError::IoError(_))));
    }

    #[test]
    fn malformed_config_is_a_json_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("sweep.json");
        std::fs::write(&config_path, "{ not json").unwrap();
        let result = load_sweep_spec(&config_path);
        assert!(matches!(result, Err(EpinetError::JsonError(_))));
    }
}
