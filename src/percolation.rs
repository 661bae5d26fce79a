//! Newman–Ziff bond percolation.
//!
//! Edges of a network are shuffled and "occupied" one at a time while a
//! union-find components structure tracks the size of the giant
//! connected component (GCC). The GCC size is sampled at a sorted
//! schedule of occupation probabilities in [0, 1], yielding the growth
//! curve of the GCC in a single pass over the edges.
//!
//! The components array follows the classic encoding: a negative entry
//! at a root holds minus the component size, a non-negative entry is
//! the index of the node's parent. Lookups compress paths to the root.
//!
//! [`ResidualBondPercolation`] extends the experiment to residual
//! networks: at every sample point of a percolation, the still
//! unoccupied edge suffix forms the residual network, which is itself
//! percolated over the nodes the parent structure has not claimed, down
//! to a configurable depth. Each observation is tagged with the chain
//! of occupation probabilities that led to it.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::EpinetError;
use crate::experiment::linspace;
use crate::log::trace;
use crate::network::{Network, NodeId};

/// The GCC size observed at one occupation probability.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GccSample {
    pub occupation_probability: f64,
    pub gcc_size: usize,
}

/// A bond percolation experiment over a fixed network.
pub struct BondPercolation<'a> {
    network: &'a Network,
    samples: Vec<f64>,
}

impl<'a> BondPercolation<'a> {
    /// Create an experiment sampling at the given occupation
    /// probabilities. The schedule is sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if any sample point is outside [0, 1].
    pub fn new(
        network: &'a Network,
        samples: impl IntoIterator<Item = f64>,
    ) -> Result<BondPercolation<'a>, EpinetError> {
        let samples = sorted_schedule(samples)?;
        Ok(BondPercolation { network, samples })
    }

    /// Create an experiment with `count` evenly spaced sample points
    /// over [0, 1].
    ///
    /// # Errors
    ///
    /// See `new`.
    pub fn with_sample_count(
        network: &'a Network,
        count: usize,
    ) -> Result<BondPercolation<'a>, EpinetError> {
        BondPercolation::new(network, linspace(0.0, 1.0, count))
    }

    /// Occupy the edges in a random order and sample the GCC size at
    /// each scheduled occupation probability.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<GccSample> {
        let n = self.network.node_count();
        // All nodes start as singleton components.
        let mut components: Vec<i64> = vec![-1; n];
        let mut gcc: usize = 1;

        let mut edges = self.network.edges().to_vec();
        edges.shuffle(rng);
        let edge_count = edges.len();

        let mut observations = Vec::with_capacity(self.samples.len());
        let mut next_sample = 0;
        while next_sample < self.samples.len() && self.samples[next_sample] <= 0.0 {
            observations.push(GccSample {
                occupation_probability: self.samples[next_sample],
                gcc_size: gcc,
            });
            next_sample += 1;
        }

        for (occupied, &(a, b)) in edges.iter().enumerate() {
            occupy(&mut components, &mut gcc, a.0, b.0);
            #[allow(clippy::cast_precision_loss)]
            let fraction = (occupied + 1) as f64 / edge_count as f64;
            while next_sample < self.samples.len() && self.samples[next_sample] <= fraction {
                observations.push(GccSample {
                    occupation_probability: self.samples[next_sample],
                    gcc_size: gcc,
                });
                next_sample += 1;
            }
        }

        // Sample points past the last occupied fraction only remain when
        // the network has no edges at all.
        while next_sample < self.samples.len() {
            observations.push(GccSample {
                occupation_probability: self.samples[next_sample],
                gcc_size: gcc,
            });
            next_sample += 1;
        }

        trace!(
            "bond percolation over {edge_count} edges produced {} samples",
            observations.len()
        );
        observations
    }
}

/// Validate a sample schedule and normalize it to sorted, deduplicated
/// form.
fn sorted_schedule(samples: impl IntoIterator<Item = f64>) -> Result<Vec<f64>, EpinetError> {
    let mut samples: Vec<f64> = samples.into_iter().collect();
    for &point in &samples {
        if !(0.0..=1.0).contains(&point) {
            return Err(EpinetError::InvalidParameter(format!(
                "sample point must be in [0, 1], got {point}"
            )));
        }
    }
    samples.sort_by(f64::total_cmp);
    samples.dedup();
    Ok(samples)
}

/// Find the root of `node`, compressing the path behind it.
fn root_of(components: &mut [i64], node: usize) -> usize {
    let mut root = node;
    while components[root] >= 0 {
        #[allow(clippy::cast_sign_loss)]
        {
            root = components[root] as usize;
        }
    }
    let mut current = node;
    while components[current] >= 0 {
        #[allow(clippy::cast_sign_loss)]
        let parent = components[current] as usize;
        #[allow(clippy::cast_possible_wrap)]
        {
            components[current] = root as i64;
        }
        current = parent;
    }
    root
}

/// Occupy the edge (a, b): if its endpoints lie in different components,
/// join them and keep the running GCC size current.
fn occupy(components: &mut [i64], gcc: &mut usize, a: usize, b: usize) {
    let root_a = root_of(components, a);
    let root_b = root_of(components, b);
    if root_a == root_b {
        return;
    }
    let size_b = -components[root_b];
    #[allow(clippy::cast_possible_wrap)]
    {
        components[root_b] = root_a as i64;
    }
    components[root_a] -= size_b;
    #[allow(clippy::cast_sign_loss)]
    let joined = (-components[root_a]) as usize;
    *gcc = (*gcc).max(joined);
}

/// The GCC size observed at one sample point of a (residual) network
/// percolation.
#[derive(Clone, Debug, PartialEq)]
pub struct ResidualGccSample {
    /// Residual depth: 0 for the primary network, 1 for its residual,
    /// and so on.
    pub depth: usize,
    /// Occupation probabilities along the chain that produced this
    /// observation, one per depth 0..=`depth`; the last entry is this
    /// percolation's own sample point.
    pub occupation_probabilities: Vec<f64>,
    /// Nodes not claimed by the parent network when this percolation
    /// started.
    pub nodes: usize,
    /// Edges available to this percolation.
    pub edges: usize,
    pub gcc_size: usize,
}

/// A bond percolation experiment that re-percolates residual networks.
///
/// At every sample point of a percolation at depth d < `residual_depth`,
/// the unoccupied edge suffix is percolated again as the residual
/// network. Nodes already joined into the parent's occupied structure
/// are unavailable to the residual; unclaimed singletons and nodes left
/// behind by earlier residuals are claimed lazily as it runs.
pub struct ResidualBondPercolation<'a> {
    network: &'a Network,
    samples: Vec<f64>,
    residual_depth: usize,
}

/// The union-find state shared by a percolation and its residuals. Each
/// percolation wave gets its own network index; node availability is
/// decided against the wave's parent index, as a node is reachable when
/// it is an unoccupied singleton, already in the running wave, or left
/// behind by a wave later than the parent.
struct ResidualState {
    components: Vec<i64>,
    networks: Vec<usize>,
    network_index: usize,
    parent: usize,
    gcc: usize,
    phis: Vec<f64>,
}

impl<'a> ResidualBondPercolation<'a> {
    /// Create an experiment sampling at the given occupation
    /// probabilities, re-percolating residual networks down to
    /// `residual_depth` levels below the primary. A depth of 0 reduces
    /// to plain bond percolation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if any sample point is outside [0, 1].
    pub fn new(
        network: &'a Network,
        samples: impl IntoIterator<Item = f64>,
        residual_depth: usize,
    ) -> Result<ResidualBondPercolation<'a>, EpinetError> {
        let samples = sorted_schedule(samples)?;
        Ok(ResidualBondPercolation {
            network,
            samples,
            residual_depth,
        })
    }

    /// Occupy the shuffled edges one at a time and sample the GCC size
    /// of every network in the residual chain at each scheduled
    /// occupation probability. Observations appear in visit order: each
    /// depth-d sample is followed by the full sample set of the residual
    /// it spawned.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<ResidualGccSample> {
        let n = self.network.node_count();
        let mut edges = self.network.edges().to_vec();
        edges.shuffle(rng);

        let mut state = ResidualState {
            components: vec![-1; n],
            // The primary percolation runs as network 1.
            networks: vec![1; n],
            network_index: 0,
            parent: 0,
            gcc: 1,
            phis: Vec::new(),
        };
        let mut observations = Vec::new();
        state.percolate(&edges, 0, &self.samples, self.residual_depth, &mut observations);
        trace!(
            "residual percolation to depth {} produced {} samples",
            self.residual_depth,
            observations.len()
        );
        observations
    }
}

impl ResidualState {
    /// Find the root of `node` in the wave `network`, claiming reachable
    /// nodes into the wave and compressing paths behind it. Returns
    /// `None` for nodes locked into an ancestor's occupied structure.
    fn root_of(&mut self, node: usize, network: usize) -> Option<usize> {
        let pointer = self.components[node];
        let tag = self.networks[node];
        if pointer == -1 {
            // Unoccupied singleton: claim it.
            self.networks[node] = network;
            Some(node)
        } else if tag == network {
            if pointer < 0 {
                Some(node)
            } else {
                #[allow(clippy::cast_sign_loss)]
                let root = self.root_of(pointer as usize, network)?;
                #[allow(clippy::cast_possible_wrap)]
                {
                    self.components[node] = root as i64;
                }
                Some(root)
            }
        } else if tag > self.parent {
            // Left behind by a wave later than our parent: reset it to a
            // singleton in our wave.
            self.components[node] = -1;
            self.networks[node] = network;
            Some(node)
        } else {
            None
        }
    }

    fn occupy(&mut self, a: usize, b: usize, network: usize) {
        let Some(root_a) = self.root_of(a, network) else {
            return;
        };
        let Some(root_b) = self.root_of(b, network) else {
            return;
        };
        if root_a == root_b {
            return;
        }
        let size_b = -self.components[root_b];
        #[allow(clippy::cast_possible_wrap)]
        {
            self.components[root_b] = root_a as i64;
        }
        self.components[root_a] -= size_b;
        #[allow(clippy::cast_sign_loss)]
        let joined = (-self.components[root_a]) as usize;
        self.gcc = self.gcc.max(joined);
    }

    /// Nodes currently claimed by the given wave; the parent index 0
    /// means "no parent" and claims nothing.
    fn order_of_network(&self, network: usize) -> usize {
        if network < 1 {
            return 0;
        }
        self.networks.iter().filter(|&&tag| tag == network).count()
    }

    fn percolate(
        &mut self,
        edges: &[(NodeId, NodeId)],
        depth: usize,
        schedule: &[f64],
        max_depth: usize,
        observations: &mut Vec<ResidualGccSample>,
    ) {
        let nodes_available = self.networks.len() - self.order_of_network(self.parent);
        let edge_count = edges.len();
        self.network_index += 1;
        let network = self.network_index;

        let mut next_sample = 0;
        while next_sample < schedule.len() && schedule[next_sample] <= 0.0 {
            self.take_sample(
                schedule[next_sample],
                edges,
                0,
                nodes_available,
                depth,
                network,
                schedule,
                max_depth,
                observations,
            );
            next_sample += 1;
        }

        for (occupied, &(a, b)) in edges.iter().enumerate() {
            if next_sample >= schedule.len() {
                break;
            }
            self.occupy(a.0, b.0, network);
            #[allow(clippy::cast_precision_loss)]
            let fraction = (occupied + 1) as f64 / edge_count as f64;
            while next_sample < schedule.len() && schedule[next_sample] <= fraction {
                self.take_sample(
                    schedule[next_sample],
                    edges,
                    occupied + 1,
                    nodes_available,
                    depth,
                    network,
                    schedule,
                    max_depth,
                    observations,
                );
                next_sample += 1;
            }
        }

        // Only an edgeless residual leaves schedule points unvisited.
        while next_sample < schedule.len() {
            self.take_sample(
                schedule[next_sample],
                edges,
                edge_count,
                nodes_available,
                depth,
                network,
                schedule,
                max_depth,
                observations,
            );
            next_sample += 1;
        }
    }

    /// Record one observation and, above the maximum depth, re-percolate
    /// the unoccupied edge suffix as the residual network.
    #[allow(clippy::too_many_arguments)]
    fn take_sample(
        &mut self,
        probability: f64,
        edges: &[(NodeId, NodeId)],
        occupied: usize,
        nodes_available: usize,
        depth: usize,
        network: usize,
        schedule: &[f64],
        max_depth: usize,
        observations: &mut Vec<ResidualGccSample>,
    ) {
        let mut occupation_probabilities = self.phis.clone();
        occupation_probabilities.push(probability);
        observations.push(ResidualGccSample {
            depth,
            occupation_probabilities,
            nodes: nodes_available,
            edges: edges.len(),
            gcc_size: self.gcc,
        });

        if depth < max_depth {
            let residual = &edges[occupied..];
            self.phis.push(probability);
            let old_parent = self.parent;
            let old_gcc = self.gcc;
            self.parent = network;
            self.gcc = 1;
            self.percolate(residual, depth + 1, schedule, max_depth, observations);
            self.phis.pop();
            self.gcc = old_gcc;
            self.parent = old_parent;
        }
    }
}
