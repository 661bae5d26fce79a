//! A discrete-event stochastic simulator for compartmental epidemic
//! processes on contact networks.
//!
//! The central object is the [`scheduler::Simulation`]: it composes one
//! contact [`network::Network`] with an SIR [`process::SirProcess`] and
//! drives the resulting continuous-time Markov process to completion
//! with the Gillespie direct method, where infections and removals are
//! competing exponential clocks. A completed run yields a
//! [`scheduler::RunSummary`] with the terminal compartment counts and,
//! optionally, the full compartment time series.
//!
//! Above the single run, the [`experiment`] module evaluates parameter
//! grids: each [`experiment::ParameterPoint`] is run for a number of
//! independent repetitions on a bounded worker pool, with a private rng
//! stream per run so that repetitions never correlate. Failed runs are
//! isolated to their (point, repetition) pair. Result sets cross the
//! boundary to external analysis through the CSV writers in [`report`].
//!
//! The [`percolation`] module carries the companion Newman–Ziff bond
//! percolation experiment for studying connectivity thresholds on the
//! same networks, including re-percolation of residual networks to a
//! configurable depth.

pub mod error;
pub mod experiment;
pub mod log;
pub mod network;
pub mod percolation;
pub mod process;
pub mod report;
pub mod runner;
pub mod scheduler;

pub mod prelude {
    pub use crate::error::EpinetError;
    pub use crate::experiment::{
        linspace, run_sweep, run_sweep_cancellable, run_sweep_with, CancelToken, NetworkPolicy,
        ParameterPoint, ResultSet, RunFailure, RunRecord, SweepSpec,
    };
    pub use crate::network::{Network, NodeId};
    pub use crate::percolation::{
        BondPercolation, GccSample, ResidualBondPercolation, ResidualGccSample,
    };
    pub use crate::process::{Compartment, CompartmentCounts, SirProcess};
    pub use crate::report::{
        write_failure_report, write_summary_report, write_time_series_report,
    };
    pub use crate::scheduler::{Event, EventKind, RunSummary, Simulation, TimeSample};
}

pub use error::EpinetError;
