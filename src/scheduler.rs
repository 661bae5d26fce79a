//! The discrete-event simulation core.
//!
//! A `Simulation` composes one `Network` with one `SirProcess` and drives
//! the continuous-time Markov process to completion with the Gillespie
//! direct method: at each step the total event rate
//! R = |Infected| · α + |Infected–Susceptible edges| · β is computed, a
//! waiting time is drawn from Exp(R), and the firing event is selected
//! with probability proportional to its individual rate. The run ends
//! when R = 0, which always happens because the eligible-event set is
//! finite and shrinks toward the terminal state.
//!
//! Eligibility bookkeeping is incremental: the simulation keeps the set
//! of Infected nodes plus, for each of them, the count of Susceptible
//! neighbors. The sum of those counts is the number of eligible
//! infection edges, so a step costs O(|Infected| + degree) rather than a
//! rescan of the whole network.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use serde::Serialize;

use crate::error::EpinetError;
use crate::log::trace;
use crate::network::{Network, NodeId};
use crate::process::{Compartment, CompartmentCounts, SirProcess};

/// The two kinds of state change an SIR process can produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Infection,
    Removal,
}

/// A committed state change: `node` entered a new compartment at `time`.
/// For infections, `source` is the Infected endpoint of the edge that
/// transmitted.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
    pub node: NodeId,
    pub source: Option<NodeId>,
}

/// One sample of the compartment counts at a point in simulated time.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct TimeSample {
    pub time: f64,
    pub susceptible: usize,
    pub infected: usize,
    pub removed: usize,
}

/// Terminal-state statistics for one completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub susceptible: usize,
    pub infected: usize,
    pub removed: usize,
    pub elapsed_time: f64,
    pub time_series: Option<Vec<TimeSample>>,
}

/// Sentinel for "node is not in the infected list".
const NO_SLOT: usize = usize::MAX;

/// A single simulation run: one network, one mutable node-state mapping,
/// one private rng stream. Created with `new`, driven with `step` or
/// `run`, and discarded after the summary is extracted.
pub struct Simulation {
    network: Network,
    process: SirProcess,
    compartments: Vec<Compartment>,
    counts: CompartmentCounts,
    time: f64,
    rng: StdRng,
    // Dense list of Infected nodes for uniform selection, with a
    // node -> list-slot map for O(1) removal.
    infected: Vec<NodeId>,
    infected_slot: Vec<usize>,
    // Per-node count of Susceptible neighbors, maintained for Infected
    // nodes only; the sum over the infected list is `si_edge_count`.
    susceptible_contacts: Vec<usize>,
    si_edge_count: usize,
    time_series: Option<Vec<TimeSample>>,
}

impl Simulation {
    /// Create a run over `network` with its own rng stream seeded from
    /// `seed`. The initial Infected set is `round(p0 · n)` nodes drawn
    /// uniformly without replacement, so a fraction too small to round
    /// to one node (including p0 = 0) yields an immediately-terminal
    /// run.
    pub fn new(network: Network, process: SirProcess, seed: u64) -> Simulation {
        let n = network.node_count();
        let mut simulation = Simulation {
            network,
            process,
            compartments: vec![Compartment::Susceptible; n],
            counts: CompartmentCounts {
                susceptible: n,
                infected: 0,
                removed: 0,
            },
            time: 0.0,
            rng: StdRng::seed_from_u64(seed),
            infected: Vec::new(),
            infected_slot: vec![NO_SLOT; n],
            susceptible_contacts: vec![0; n],
            si_edge_count: 0,
            time_series: None,
        };

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let seeds = (process.initial_infected_fraction() * n as f64).round() as usize;
        if seeds > 0 {
            let chosen = rand::seq::index::sample(&mut simulation.rng, n, seeds);
            for index in chosen {
                simulation.infect(NodeId(index));
            }
        }
        trace!("seeded {} initial infections in {} nodes", seeds, n);
        simulation
    }

    /// Enable recording of the full compartment time series, starting
    /// with a sample of the current (post-seeding) state.
    #[must_use]
    pub fn record_time_series(mut self) -> Simulation {
        self.time_series = Some(vec![self.sample()]);
        self
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.time
    }

    #[must_use]
    pub fn counts(&self) -> CompartmentCounts {
        self.counts
    }

    #[must_use]
    pub fn compartment(&self, node: NodeId) -> Compartment {
        self.compartments[node.0]
    }

    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// The total event rate R; the run is terminal when this is zero.
    #[must_use]
    pub fn total_rate(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let rate = self.infected.len() as f64 * self.process.removal_rate()
            + self.si_edge_count as f64 * self.process.infection_rate();
        rate
    }

    /// Advance the simulation by one event. Returns `Ok(None)` when the
    /// process has reached its terminal state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the eligibility bookkeeping disagrees
    /// with the compartments. This is a defensive check only; it is
    /// unreachable through the public API.
    pub fn step(&mut self) -> Result<Option<Event>, EpinetError> {
        #[allow(clippy::cast_precision_loss)]
        let removal_total = self.infected.len() as f64 * self.process.removal_rate();
        #[allow(clippy::cast_precision_loss)]
        let infection_total = self.si_edge_count as f64 * self.process.infection_rate();
        let total = removal_total + infection_total;
        if total <= 0.0 {
            return Ok(None);
        }

        let waiting = Exp::new(total)
            .map_err(|e| EpinetError::InvalidState(format!("bad total rate {total}: {e}")))?;
        // Redraw zero-length waits so simulated time is strictly
        // increasing even from a low-entropy source.
        let mut delta = waiting.sample(&mut self.rng);
        while delta <= 0.0 {
            delta = waiting.sample(&mut self.rng);
        }
        self.time += delta;

        let pick: f64 = self.rng.random_range(0.0..total);
        let event = if pick < removal_total {
            self.fire_removal()?
        } else {
            self.fire_infection()?
        };

        if let Some(series) = &mut self.time_series {
            let sample = TimeSample {
                time: self.time,
                susceptible: self.counts.susceptible,
                infected: self.counts.infected,
                removed: self.counts.removed,
            };
            series.push(sample);
        }
        Ok(Some(event))
    }

    /// Drive the run to its terminal state and produce the summary.
    ///
    /// # Errors
    ///
    /// Propagates `InvalidState` from `step`; there is no other failure
    /// path.
    pub fn run(&mut self) -> Result<RunSummary, EpinetError> {
        while self.step()?.is_some() {}
        trace!(
            "run terminal at t={}: {} susceptible, {} removed",
            self.time,
            self.counts.susceptible,
            self.counts.removed
        );
        Ok(RunSummary {
            susceptible: self.counts.susceptible,
            infected: self.counts.infected,
            removed: self.counts.removed,
            elapsed_time: self.time,
            time_series: self.time_series.clone(),
        })
    }

    fn sample(&self) -> TimeSample {
        TimeSample {
            time: self.time,
            susceptible: self.counts.susceptible,
            infected: self.counts.infected,
            removed: self.counts.removed,
        }
    }

    fn fire_removal(&mut self) -> Result<Event, EpinetError> {
        if self.infected.is_empty() {
            return Err(EpinetError::InvalidState(
                "removal fired with no removal-eligible nodes".to_string(),
            ));
        }
        let slot = self.rng.random_range(0..self.infected.len());
        let node = self.infected[slot];
        self.remove(node);
        Ok(Event {
            time: self.time,
            kind: EventKind::Removal,
            node,
            source: None,
        })
    }

    fn fire_infection(&mut self) -> Result<Event, EpinetError> {
        if self.si_edge_count == 0 {
            return Err(EpinetError::InvalidState(
                "infection fired with no eligible edges".to_string(),
            ));
        }
        // Uniform choice among SI edges: weight each Infected node by its
        // Susceptible-contact count, then take the k-th Susceptible
        // neighbor of the selected node.
        let target_edge = self.rng.random_range(0..self.si_edge_count);
        let mut accumulated = 0;
        let mut source = None;
        let mut offset = 0;
        for &candidate in &self.infected {
            let contacts = self.susceptible_contacts[candidate.0];
            if target_edge < accumulated + contacts {
                source = Some(candidate);
                offset = target_edge - accumulated;
                break;
            }
            accumulated += contacts;
        }
        let source = source.ok_or_else(|| {
            EpinetError::InvalidState("eligible edge count exceeds live edges".to_string())
        })?;

        let mut node = None;
        let mut seen = 0;
        for &neighbor in self.network.neighbors(source) {
            if self.compartments[neighbor.0] == Compartment::Susceptible {
                if seen == offset {
                    node = Some(neighbor);
                    break;
                }
                seen += 1;
            }
        }
        let node = node.ok_or_else(|| {
            EpinetError::InvalidState(format!(
                "stale susceptible-contact count for node {source}"
            ))
        })?;

        self.infect(node);
        Ok(Event {
            time: self.time,
            kind: EventKind::Infection,
            node,
            source: Some(source),
        })
    }

    /// Transition `node` Susceptible → Infected and update eligibility:
    /// edges from Infected neighbors to `node` stop being SI edges, and
    /// every Susceptible neighbor of `node` starts contributing one.
    fn infect(&mut self, node: NodeId) {
        debug_assert_eq!(self.compartments[node.0], Compartment::Susceptible);
        let mut contacts = 0;
        for &neighbor in self.network.neighbors(node) {
            match self.compartments[neighbor.0] {
                Compartment::Susceptible => contacts += 1,
                Compartment::Infected => {
                    self.susceptible_contacts[neighbor.0] -= 1;
                    self.si_edge_count -= 1;
                }
                Compartment::Removed => {}
            }
        }
        self.compartments[node.0] = Compartment::Infected;
        self.susceptible_contacts[node.0] = contacts;
        self.si_edge_count += contacts;
        self.infected_slot[node.0] = self.infected.len();
        self.infected.push(node);
        self.counts.susceptible -= 1;
        self.counts.infected += 1;
    }

    /// Transition `node` Infected → Removed and drop its eligibility:
    /// its removal clock stops and its incident SI edges disappear.
    fn remove(&mut self, node: NodeId) {
        debug_assert_eq!(self.compartments[node.0], Compartment::Infected);
        self.compartments[node.0] = Compartment::Removed;
        self.si_edge_count -= self.susceptible_contacts[node.0];
        self.susceptible_contacts[node.0] = 0;

        let slot = self.infected_slot[node.0];
        self.infected.swap_remove(slot);
        if let Some(&moved) = self.infected.get(slot) {
            self.infected_slot[moved.0] = slot;
        }
        self.infected_slot[node.0] = NO_SLOT;
        self.counts.infected -= 1;
        self.counts.removed += 1;
    }
}
