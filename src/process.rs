//! The SIR compartmental process model.
//!
//! Both transition processes are memoryless: infection crosses each
//! (Infected, Susceptible) edge at rate β and each Infected node is
//! removed at rate α, so the scheduler samples waiting times from
//! exponential distributions. Parameters are validated once, at
//! construction; nothing here can fail mid-run.

use serde::{Deserialize, Serialize};

use crate::error::EpinetError;

/// A node's epidemiological state. Transitions are monotone along
/// Susceptible → Infected → Removed; a node never returns to a prior
/// compartment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compartment {
    Susceptible,
    Infected,
    Removed,
}

/// Compartment occupancy counts for a population.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompartmentCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub removed: usize,
}

impl CompartmentCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.removed
    }
}

/// The SIR process parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SirProcess {
    beta: f64,
    alpha: f64,
    initial_infected_fraction: f64,
}

impl SirProcess {
    /// Create an SIR process with infection rate `beta` per
    /// Infected–Susceptible edge, removal rate `alpha` per Infected node,
    /// and initial-infected fraction `initial_infected_fraction`.
    ///
    /// A zero `alpha` is accepted: no removal clocks ever fire, so a
    /// simulation stops once no Infected–Susceptible edges remain and
    /// its final state may still hold Infected nodes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if either rate is negative or
    /// non-finite, or if the initial fraction is outside [0, 1].
    pub fn new(
        beta: f64,
        alpha: f64,
        initial_infected_fraction: f64,
    ) -> Result<SirProcess, EpinetError> {
        if !beta.is_finite() || beta < 0.0 {
            return Err(EpinetError::InvalidParameter(format!(
                "infection rate must be finite and non-negative, got {beta}"
            )));
        }
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(EpinetError::InvalidParameter(format!(
                "removal rate must be finite and non-negative, got {alpha}"
            )));
        }
        if !(0.0..=1.0).contains(&initial_infected_fraction) {
            return Err(EpinetError::InvalidParameter(format!(
                "initial infected fraction must be in [0, 1], got {initial_infected_fraction}"
            )));
        }
        Ok(SirProcess {
            beta,
            alpha,
            initial_infected_fraction,
        })
    }

    /// Rate of infection across a single Infected→Susceptible edge.
    #[must_use]
    pub fn infection_rate(&self) -> f64 {
        self.beta
    }

    /// Rate of removal for a single Infected node.
    #[must_use]
    pub fn removal_rate(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub fn initial_infected_fraction(&self) -> f64 {
        self.initial_infected_fraction
    }
}
