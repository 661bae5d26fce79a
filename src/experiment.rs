//! Parameter sweeps over independent simulation runs.
//!
//! A sweep evaluates each `ParameterPoint` with `replications`
//! independent runs. Runs share no mutable state, so they are dispatched
//! across a bounded pool of worker threads; each run draws from its own
//! rng stream, seeded from the sweep's base seed plus a stable hash of a
//! run label so that streams never correlate across runs. A failed run
//! (an error or a panic inside a worker) is recorded as a missing sample
//! for that one (point, repetition) pair and the rest of the sweep
//! continues.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::EpinetError;
use crate::log::{debug, info, warn};
use crate::network::Network;
use crate::process::SirProcess;
use crate::scheduler::{RunSummary, Simulation};

/// An immutable description of one cell of a parameter grid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint {
    pub population: usize,
    pub edge_probability: f64,
    pub beta: f64,
    pub alpha: f64,
    pub initial_infected_fraction: f64,
}

impl ParameterPoint {
    /// Build a point from a target mean degree ⟨k⟩, using the edge
    /// probability ⟨k⟩ / n.
    #[must_use]
    pub fn from_mean_degree(
        population: usize,
        mean_degree: f64,
        beta: f64,
        alpha: f64,
        initial_infected_fraction: f64,
    ) -> ParameterPoint {
        #[allow(clippy::cast_precision_loss)]
        let edge_probability = mean_degree / population as f64;
        ParameterPoint {
            population,
            edge_probability,
            beta,
            alpha,
            initial_infected_fraction,
        }
    }

    /// The same point repeated for each β in `betas` — the usual
    /// epidemic-threshold sweep.
    #[must_use]
    pub fn beta_sweep(
        population: usize,
        mean_degree: f64,
        alpha: f64,
        initial_infected_fraction: f64,
        betas: &[f64],
    ) -> Vec<ParameterPoint> {
        betas
            .iter()
            .map(|&beta| {
                ParameterPoint::from_mean_degree(
                    population,
                    mean_degree,
                    beta,
                    alpha,
                    initial_infected_fraction,
                )
            })
            .collect()
    }

    #[must_use]
    pub fn mean_degree(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let degree = (self.population.saturating_sub(1)) as f64 * self.edge_probability;
        degree
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive.
#[must_use]
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![start];
    }
    #[allow(clippy::cast_precision_loss)]
    let step = (stop - start) / (count - 1) as f64;
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let value = start + step * i as f64;
            value
        })
        .collect()
}

/// Whether network topology is resampled for every repetition or held
/// fixed per point while only the stochastic process is re-rolled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkPolicy {
    #[default]
    ResamplePerRun,
    FixedPerPoint,
}

fn default_replications() -> usize {
    1
}

fn default_workers() -> usize {
    1
}

/// A full sweep specification: the grid, the repetition count, and the
/// execution settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub points: Vec<ParameterPoint>,
    #[serde(default = "default_replications")]
    pub replications: usize,
    #[serde(default)]
    pub base_seed: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub network_policy: NetworkPolicy,
    #[serde(default)]
    pub record_time_series: bool,
}

impl SweepSpec {
    #[must_use]
    pub fn new(points: Vec<ParameterPoint>, replications: usize) -> SweepSpec {
        SweepSpec {
            points,
            replications,
            base_seed: 0,
            workers: 1,
            network_policy: NetworkPolicy::default(),
            record_time_series: false,
        }
    }

    #[must_use]
    pub fn with_base_seed(mut self, base_seed: u64) -> SweepSpec {
        self.base_seed = base_seed;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> SweepSpec {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_network_policy(mut self, policy: NetworkPolicy) -> SweepSpec {
        self.network_policy = policy;
        self
    }
}

/// One completed run, keyed by its grid cell and repetition index.
#[derive(Clone, Debug, PartialEq)]
pub struct RunRecord {
    pub point_index: usize,
    pub repetition: usize,
    pub point: ParameterPoint,
    pub summary: RunSummary,
}

/// One failed run, recorded as a missing sample.
#[derive(Clone, Debug, PartialEq)]
pub struct RunFailure {
    pub point_index: usize,
    pub repetition: usize,
    pub message: String,
}

impl RunFailure {
    #[must_use]
    pub fn to_error(&self) -> EpinetError {
        EpinetError::WorkerFailure {
            point_index: self.point_index,
            repetition: self.repetition,
            message: self.message.clone(),
        }
    }
}

/// Per-point aggregate over the completed repetitions.
#[derive(Clone, Debug, PartialEq)]
pub struct PointSummary {
    pub point_index: usize,
    pub point: ParameterPoint,
    pub completed: usize,
    pub failed: usize,
    pub mean_final_removed: f64,
    pub mean_elapsed_time: f64,
}

/// The ordered collection of (point, repetition) outcomes for a sweep.
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    pub records: Vec<RunRecord>,
    pub failures: Vec<RunFailure>,
}

impl ResultSet {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Group records by parameter point and average the summary fields.
    /// Points with no completed runs still appear, with NaN means.
    #[must_use]
    pub fn aggregate(&self, points: &[ParameterPoint]) -> Vec<PointSummary> {
        points
            .iter()
            .enumerate()
            .map(|(point_index, &point)| {
                let mut completed = 0;
                let mut removed_total = 0.0;
                let mut elapsed_total = 0.0;
                for record in self.records.iter().filter(|r| r.point_index == point_index) {
                    completed += 1;
                    #[allow(clippy::cast_precision_loss)]
                    {
                        removed_total += record.summary.removed as f64;
                    }
                    elapsed_total += record.summary.elapsed_time;
                }
                let failed = self
                    .failures
                    .iter()
                    .filter(|f| f.point_index == point_index)
                    .count();
                #[allow(clippy::cast_precision_loss)]
                let divisor = completed as f64;
                PointSummary {
                    point_index,
                    point,
                    completed,
                    failed,
                    mean_final_removed: removed_total / divisor,
                    mean_elapsed_time: elapsed_total / divisor,
                }
            })
            .collect()
    }
}

/// A shared flag for cancelling the not-yet-started runs of a sweep.
/// Runs already in flight complete normally; their summaries are kept.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Derive an independent stream seed from the sweep's base seed and a
/// run label, in the base-seed-plus-name-hash fashion.
fn stream_seed(base_seed: u64, label: &str) -> u64 {
    base_seed.wrapping_add(xxh3_64(label.as_bytes()))
}

fn execute_run(
    point: &ParameterPoint,
    shared_network: Option<&Network>,
    spec: &SweepSpec,
    point_index: usize,
    repetition: usize,
) -> Result<RunSummary, EpinetError> {
    let process = SirProcess::new(point.beta, point.alpha, point.initial_infected_fraction)?;
    let network = match shared_network {
        Some(network) => network.clone(),
        None => {
            let seed = stream_seed(spec.base_seed, &format!("net-{point_index}-{repetition}"));
            let mut rng = StdRng::seed_from_u64(seed);
            Network::generate(point.population, point.edge_probability, &mut rng)?
        }
    };
    let sim_seed = stream_seed(spec.base_seed, &format!("sir-{point_index}-{repetition}"));
    let mut simulation = Simulation::new(network, process, sim_seed);
    if spec.record_time_series {
        simulation = simulation.record_time_series();
    }
    simulation.run()
}

/// Run a sweep to completion on the configured worker pool.
///
/// # Errors
///
/// Returns `InvalidParameter` if the pool size is zero, or
/// `InvalidParameter` from network generation when topology is shared
/// per point (those networks are built up front). Per-run errors do not
/// abort the sweep; they are recorded in the result set's failures.
pub fn run_sweep(spec: &SweepSpec) -> Result<ResultSet, EpinetError> {
    run_sweep_cancellable(spec, &CancelToken::new())
}

/// `run_sweep` with an externally owned cancellation token.
///
/// # Errors
///
/// See `run_sweep`.
pub fn run_sweep_cancellable(
    spec: &SweepSpec,
    token: &CancelToken,
) -> Result<ResultSet, EpinetError> {
    let shared_networks = match spec.network_policy {
        NetworkPolicy::ResamplePerRun => None,
        NetworkPolicy::FixedPerPoint => {
            let networks = spec
                .points
                .iter()
                .enumerate()
                .map(|(point_index, point)| {
                    let seed = stream_seed(spec.base_seed, &format!("net-{point_index}"));
                    let mut rng = StdRng::seed_from_u64(seed);
                    Network::generate(point.population, point.edge_probability, &mut rng)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Some(networks)
        }
    };

    run_sweep_with(spec, token, |point, point_index, repetition| {
        let shared = shared_networks
            .as_ref()
            .map(|networks| &networks[point_index]);
        execute_run(point, shared, spec, point_index, repetition)
    })
}

/// The worker-pool core, generic over the per-run function so that
/// callers (and tests) can substitute how a single (point, repetition)
/// is evaluated. Panics inside `run_fn` are isolated to their run and
/// recorded as failures.
///
/// # Errors
///
/// Returns `InvalidParameter` if `spec.workers` is zero.
pub fn run_sweep_with<F>(
    spec: &SweepSpec,
    token: &CancelToken,
    run_fn: F,
) -> Result<ResultSet, EpinetError>
where
    F: Fn(&ParameterPoint, usize, usize) -> Result<RunSummary, EpinetError> + Sync,
{
    if spec.workers == 0 {
        return Err(EpinetError::InvalidParameter(
            "worker pool size must be at least 1".to_string(),
        ));
    }

    let jobs: Vec<(usize, usize)> = (0..spec.points.len())
        .flat_map(|point_index| (0..spec.replications).map(move |rep| (point_index, rep)))
        .collect();
    info!(
        "dispatching {} runs ({} points x {} repetitions) on {} workers",
        jobs.len(),
        spec.points.len(),
        spec.replications,
        spec.workers
    );

    let next_job = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel::<Result<RunRecord, RunFailure>>();
    let run_fn = &run_fn;
    let next_job = &next_job;
    let jobs = &jobs;

    let mut results = thread::scope(|scope| {
        for _ in 0..spec.workers.min(jobs.len().max(1)) {
            let sender = sender.clone();
            scope.spawn(move || loop {
                let job = next_job.fetch_add(1, Ordering::SeqCst);
                if job >= jobs.len() || token.is_cancelled() {
                    break;
                }
                let (point_index, repetition) = jobs[job];
                let point = &spec.points[point_index];
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| run_fn(point, point_index, repetition)));
                let message = match outcome {
                    Ok(Ok(summary)) => {
                        debug!("run ({point_index}, {repetition}) completed");
                        // A receiver drop just means the collector is gone.
                        let _ = sender.send(Ok(RunRecord {
                            point_index,
                            repetition,
                            point: *point,
                            summary,
                        }));
                        continue;
                    }
                    Ok(Err(error)) => error.to_string(),
                    Err(payload) => panic_message(&*payload),
                };
                warn!("run ({point_index}, {repetition}) failed: {message}");
                let _ = sender.send(Err(RunFailure {
                    point_index,
                    repetition,
                    message,
                }));
            });
        }
        drop(sender);

        let mut results = ResultSet::default();
        for item in receiver {
            match item {
                Ok(record) => results.records.push(record),
                Err(failure) => results.failures.push(failure),
            }
        }
        results
    });

    // Insertion order across workers is nondeterministic; the grouping
    // key is (point, repetition), so normalize to it.
    results
        .records
        .sort_by_key(|r| (r.point_index, r.repetition));
    results
        .failures
        .sort_by_key(|f| (f.point_index, f.repetition));
    Ok(results)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        linspace, run_sweep, run_sweep_with, CancelToken, NetworkPolicy, ParameterPoint, SweepSpec,
    };
    use crate::error::EpinetError;
    use assert_approx_eq::assert_approx_eq;

    fn small_spec() -> SweepSpec {
        let points = ParameterPoint::beta_sweep(100, 6.0, 1.0, 0.05, &[0.05, 0.5]);
        SweepSpec::new(points, 3).with_base_seed(42)
    }

    #[test]
    fn linspace_endpoints() {
        let values = linspace(0.0, 1.0, 5);
        assert_eq!(values.len(), 5);
        assert_approx_eq!(values[0], 0.0);
        assert_approx_eq!(values[2], 0.5);
        assert_approx_eq!(values[4], 1.0);
        assert_eq!(linspace(0.3, 0.9, 1), vec![0.3]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn mean_degree_round_trip() {
        let point = ParameterPoint::from_mean_degree(1000, 8.0, 0.1, 1.0, 0.01);
        assert_approx_eq!(point.edge_probability, 0.008);
        assert_approx_eq!(point.mean_degree(), 7.992);
    }

    #[test]
    fn sweep_produces_one_record_per_pair() {
        let spec = small_spec();
        let results = run_sweep(&spec).unwrap();
        assert!(results.is_complete());
        assert_eq!(results.records.len(), 6);
        for (i, record) in results.records.iter().enumerate() {
            assert_eq!(record.point_index, i / 3);
            assert_eq!(record.repetition, i % 3);
            assert_eq!(record.summary.infected, 0);
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let sequential = run_sweep(&small_spec()).unwrap();
        let parallel = run_sweep(&small_spec().with_workers(4)).unwrap();
        assert_eq!(sequential.records, parallel.records);
    }

    #[test]
    fn fixed_per_point_topology_is_deterministic() {
        let spec = small_spec().with_network_policy(NetworkPolicy::FixedPerPoint);
        let first = run_sweep(&spec).unwrap();
        let second = run_sweep(&spec).unwrap();
        assert_eq!(first.records, second.records);
        assert_eq!(first.records.len(), 6);
    }

    #[test]
    fn zero_workers_rejected() {
        let spec = small_spec().with_workers(0);
        assert!(matches!(
            run_sweep(&spec),
            Err(EpinetError::InvalidParameter(_))
        ));
    }

    #[test]
    fn invalid_point_is_isolated_to_its_runs() {
        let mut spec = small_spec();
        spec.points[0].edge_probability = 2.0;
        let results = run_sweep(&spec).unwrap();

        assert_eq!(results.failures.len(), 3);
        assert!(results.failures.iter().all(|f| f.point_index == 0));
        assert_eq!(results.records.len(), 3);
        assert!(results.records.iter().all(|r| r.point_index == 1));

        // The surviving point's summaries are exactly what a clean sweep
        // produces for it.
        let clean = run_sweep(&small_spec()).unwrap();
        for (record, clean_record) in results
            .records
            .iter()
            .zip(clean.records.iter().filter(|r| r.point_index == 1))
        {
            assert_eq!(record.summary, clean_record.summary);
        }
    }

    #[test]
    fn panicking_run_is_isolated() {
        let spec = small_spec().with_workers(2);
        let token = CancelToken::new();
        let results = run_sweep_with(&spec, &token, |point, point_index, repetition| {
            assert!(point.population > 0);
            if point_index == 1 && repetition == 1 {
                panic!("injected worker failure");
            }
            super::execute_run(point, None, &spec, point_index, repetition)
        })
        .unwrap();

        assert_eq!(results.failures.len(), 1);
        assert_eq!(results.failures[0].point_index, 1);
        assert_eq!(results.failures[0].repetition, 1);
        assert!(results.failures[0].message.contains("injected"));
        assert_eq!(results.records.len(), 5);

        let error = results.failures[0].to_error();
        assert!(matches!(error, EpinetError::WorkerFailure { .. }));
    }

    #[test]
    fn cancelled_sweep_starts_no_runs() {
        let token = CancelToken::new();
        token.cancel();
        let results = run_sweep_with(&small_spec(), &token, |_, _, _| {
            panic!("no run should start after cancellation")
        })
        .unwrap();
        assert!(results.records.is_empty());
        assert!(results.failures.is_empty());
    }

    #[test]
    fn aggregate_groups_by_point() {
        let spec = small_spec();
        let results = run_sweep(&spec).unwrap();
        let summaries = results.aggregate(&spec.points);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].completed, 3);
        assert_eq!(summaries[0].failed, 0);
        // The supercritical point infects more than the subcritical one.
        assert!(summaries[1].mean_final_removed > summaries[0].mean_final_removed);
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: SweepSpec = serde_json::from_str(
            r#"{
                "points": [{
                    "population": 50,
                    "edge_probability": 0.1,
                    "beta": 0.2,
                    "alpha": 1.0,
                    "initial_infected_fraction": 0.05
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(spec.replications, 1);
        assert_eq!(spec.workers, 1);
        assert_eq!(spec.base_seed, 0);
        assert_eq!(spec.network_policy, NetworkPolicy::ResamplePerRun);
        assert!(!spec.record_time_series);
    }
}
