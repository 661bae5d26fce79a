//! The contact network over which an epidemic process runs.
//!
//! A `Network` is an undirected graph over nodes `0..n`. Neighbor
//! enumeration is O(degree) via per-node adjacency lists, since neighbor
//! scans dominate the per-event cost of the scheduler. Self-loops are
//! rejected and duplicate edges are refused so that a node's degree is
//! never double-counted.

use rand::Rng;
use rustc_hash::FxHashSet;
use std::fmt;

use crate::error::EpinetError;
use crate::log::trace;

/// A unique identifier for a node in a `Network`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An undirected contact graph with a fixed node set.
#[derive(Clone, Debug)]
pub struct Network {
    neighbors: Vec<Vec<NodeId>>,
    edges: Vec<(NodeId, NodeId)>,
    edge_set: FxHashSet<(usize, usize)>,
}

impl Network {
    /// Create a network with `n` nodes and no edges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `n < 1`.
    pub fn new(n: usize) -> Result<Network, EpinetError> {
        if n < 1 {
            return Err(EpinetError::InvalidParameter(
                "network must have at least one node".to_string(),
            ));
        }
        Ok(Network {
            neighbors: vec![Vec::new(); n],
            edges: Vec::new(),
            edge_set: FxHashSet::default(),
        })
    }

    /// Generate an Erdős–Rényi G(n, p) network: each of the C(n, 2)
    /// candidate edges is included independently with probability
    /// `edge_probability`. Expected mean degree is (n − 1) · p.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `n < 1` or the probability is
    /// outside [0, 1].
    pub fn generate<R: Rng + ?Sized>(
        n: usize,
        edge_probability: f64,
        rng: &mut R,
    ) -> Result<Network, EpinetError> {
        if !(0.0..=1.0).contains(&edge_probability) {
            return Err(EpinetError::InvalidParameter(format!(
                "edge probability must be in [0, 1], got {edge_probability}"
            )));
        }
        let mut network = Network::new(n)?;
        for i in 0..n {
            for j in (i + 1)..n {
                if rng.random_bool(edge_probability) {
                    network.add_edge(NodeId(i), NodeId(j))?;
                }
            }
        }
        trace!(
            "generated G({n}, {edge_probability}) with {} edges",
            network.edge_count()
        );
        Ok(network)
    }

    /// Add the undirected edge (a, b).
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a self-loop, an out-of-range
    /// endpoint, or an edge that already exists.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<(), EpinetError> {
        if a == b {
            return Err(EpinetError::InvalidParameter(
                "cannot make edge to self".to_string(),
            ));
        }
        let n = self.node_count();
        if a.0 >= n || b.0 >= n {
            return Err(EpinetError::InvalidParameter(format!(
                "edge ({a}, {b}) references a node outside 0..{n}"
            )));
        }
        let key = if a.0 < b.0 { (a.0, b.0) } else { (b.0, a.0) };
        if !self.edge_set.insert(key) {
            return Err(EpinetError::InvalidParameter(format!(
                "edge ({a}, {b}) already exists"
            )));
        }
        self.neighbors[a.0].push(b);
        self.neighbors[b.0].push(a);
        self.edges.push((NodeId(key.0), NodeId(key.1)));
        Ok(())
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Neighbors of `node`, in insertion order.
    #[must_use]
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.neighbors[node.0]
    }

    #[must_use]
    pub fn degree(&self, node: NodeId) -> usize {
        self.neighbors[node.0].len()
    }

    /// Each undirected edge exactly once, with the smaller endpoint first.
    #[must_use]
    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    #[must_use]
    pub fn mean_degree(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let (n, m) = (self.node_count() as f64, self.edge_count() as f64);
        2.0 * m / n
    }

    /// Iterate over all node ids.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_count()).map(NodeId)
    }
}

#[cfg(test)]
mod tests {
    use super::{Network, NodeId};
    use crate::error::EpinetError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_network_rejected() {
        assert!(matches!(
            Network::new(0),
            Err(EpinetError::InvalidParameter(_))
        ));
    }

    #[test]
    fn add_and_enumerate_edges() {
        let mut network = Network::new(3).unwrap();
        network.add_edge(NodeId(0), NodeId(1)).unwrap();
        network.add_edge(NodeId(2), NodeId(1)).unwrap();

        assert_eq!(network.edge_count(), 2);
        assert_eq!(network.degree(NodeId(1)), 2);
        assert_eq!(network.neighbors(NodeId(0)), &[NodeId(1)]);
        assert_eq!(network.neighbors(NodeId(1)), &[NodeId(0), NodeId(2)]);
        assert_eq!(network.edges(), &[(NodeId(0), NodeId(1)), (NodeId(1), NodeId(2))]);
    }

    #[test]
    fn self_loop_rejected() {
        let mut network = Network::new(2).unwrap();
        assert!(matches!(
            network.add_edge(NodeId(1), NodeId(1)),
            Err(EpinetError::InvalidParameter(_))
        ));
    }

    #[test]
    fn duplicate_edge_rejected_in_either_direction() {
        let mut network = Network::new(2).unwrap();
        network.add_edge(NodeId(0), NodeId(1)).unwrap();
        assert!(network.add_edge(NodeId(0), NodeId(1)).is_err());
        assert!(network.add_edge(NodeId(1), NodeId(0)).is_err());
        assert_eq!(network.degree(NodeId(0)), 1);
    }

    #[test]
    fn out_of_range_endpoint_rejected() {
        let mut network = Network::new(2).unwrap();
        assert!(network.add_edge(NodeId(0), NodeId(2)).is_err());
    }

    #[test]
    fn generate_probability_out_of_range() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Network::generate(10, 1.5, &mut rng).is_err());
        assert!(Network::generate(10, -0.1, &mut rng).is_err());
    }

    #[test]
    fn generate_extreme_probabilities() {
        let mut rng = StdRng::seed_from_u64(0);
        let empty = Network::generate(10, 0.0, &mut rng).unwrap();
        assert_eq!(empty.edge_count(), 0);

        let complete = Network::generate(10, 1.0, &mut rng).unwrap();
        assert_eq!(complete.edge_count(), 45);
        assert_eq!(complete.degree(NodeId(3)), 9);
        assert!((complete.mean_degree() - 9.0).abs() < f64::EPSILON);
        assert_eq!(complete.nodes().count(), 10);
    }

    #[test]
    fn generate_expected_edge_count() {
        // E[m] = p * n(n-1)/2 = 0.1 * 4950 = 495 per generation; the mean
        // over 50 generations should land well within 10% of that.
        let mut rng = StdRng::seed_from_u64(42);
        let mut total = 0;
        let generations = 50;
        for _ in 0..generations {
            total += Network::generate(100, 0.1, &mut rng).unwrap().edge_count();
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = total as f64 / f64::from(generations);
        assert!((mean - 495.0).abs() < 49.5, "mean edge count {mean}");
    }

    #[test]
    fn generate_is_deterministic_for_a_seed() {
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        let a = Network::generate(50, 0.2, &mut rng_a).unwrap();
        let b = Network::generate(50, 0.2, &mut rng_b).unwrap();
        assert_eq!(a.edges(), b.edges());
    }
}
