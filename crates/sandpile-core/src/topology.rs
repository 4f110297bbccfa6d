//! Topology abstraction and small fixture graphs
//!
//! The engines only need three queries from a graph: how many nodes it has,
//! the degree of a node, and its neighbors. [`Topology`] captures that seam so
//! an externally generated graph can be plugged in without converting it.
//!
//! [`GraphBuilder`] provides the simple deterministic shapes used by tests and
//! the CLI:
//! - Ring: each node connected to its two neighbors
//! - Line: a ring without the closing edge
//! - Star: node 0 in the center
//! - Complete: every node connected to every other
//! - Erdős–Rényi: each pair connected independently with probability p
//! - Random regular: every node has the same degree, edges drawn at random

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::GraphError;
use crate::graph::{Graph, NodeId};

/// Read-only view of a network used by the avalanche engines
pub trait Topology: Send + Sync {
    /// Number of nodes; ids are `0..node_count()`
    fn node_count(&self) -> usize;

    /// Neighbors of a node
    fn neighbors(&self, node: NodeId) -> &[NodeId];

    /// Degree of a node
    fn degree(&self, node: NodeId) -> usize {
        self.neighbors(node).len()
    }
}

impl Topology for Graph {
    fn node_count(&self) -> usize {
        Graph::node_count(self)
    }

    fn neighbors(&self, node: NodeId) -> &[NodeId] {
        Graph::neighbors(self, node)
    }

    fn degree(&self, node: NodeId) -> usize {
        Graph::degree(self, node)
    }
}

/// Check that a topology is usable by an engine
///
/// Every neighbor must be a registered node and adjacency must be symmetric.
/// Runs in O(E * max_degree), once before a run starts.
pub fn validate_topology<T: Topology + ?Sized>(topology: &T) -> Result<(), GraphError> {
    let node_count = topology.node_count();
    if node_count == 0 {
        return Err(GraphError::Empty);
    }

    for node in 0..node_count {
        for &neighbor in topology.neighbors(node) {
            if neighbor >= node_count {
                return Err(GraphError::UnknownNode {
                    node: neighbor,
                    node_count,
                });
            }
            if !topology.neighbors(neighbor).contains(&node) {
                return Err(GraphError::AsymmetricEdge {
                    from: node,
                    to: neighbor,
                });
            }
        }
    }
    Ok(())
}

/// Builder for fixture topologies
pub struct GraphBuilder {
    node_count: usize,
}

impl GraphBuilder {
    /// Create a builder for a graph with `node_count` nodes
    pub fn new(node_count: usize) -> Self {
        Self { node_count }
    }

    /// Ring: 0 - 1 - 2 - ... - (n-1) - 0
    pub fn ring(self) -> Graph {
        let mut graph = Graph::with_nodes(self.node_count);
        let n = self.node_count;
        if n < 2 {
            return graph;
        }
        for i in 0..n {
            // In range by construction
            let _ = graph.add_edge(i, (i + 1) % n);
        }
        graph
    }

    /// Line: 0 - 1 - 2 - ... - (n-1)
    pub fn line(self) -> Graph {
        let mut graph = Graph::with_nodes(self.node_count);
        for i in 1..self.node_count {
            let _ = graph.add_edge(i - 1, i);
        }
        graph
    }

    /// Star: node 0 connected to all others
    pub fn star(self) -> Graph {
        let mut graph = Graph::with_nodes(self.node_count);
        for i in 1..self.node_count {
            let _ = graph.add_edge(0, i);
        }
        graph
    }

    /// Complete graph
    pub fn complete(self) -> Graph {
        let mut graph = Graph::with_nodes(self.node_count);
        for i in 0..self.node_count {
            for j in (i + 1)..self.node_count {
                let _ = graph.add_edge(i, j);
            }
        }
        graph
    }

    /// Erdős–Rényi G(n, p)
    pub fn erdos_renyi<R: Rng + ?Sized>(self, connection_probability: f64, rng: &mut R) -> Graph {
        let mut graph = Graph::with_nodes(self.node_count);
        for i in 0..self.node_count {
            for j in (i + 1)..self.node_count {
                if rng.random::<f64>() < connection_probability {
                    let _ = graph.add_edge(i, j);
                }
            }
        }
        graph
    }

    /// Uniformly shuffled simple `degree`-regular graph
    ///
    /// Requires `degree < n` and an even `n * degree`. Stubs are paired at
    /// random; pairs that would form a self loop or a repeated edge are
    /// reshuffled among themselves, and the whole pairing restarts when the
    /// leftovers cannot be completed.
    pub fn random_regular<R: Rng + ?Sized>(
        self,
        degree: usize,
        rng: &mut R,
    ) -> Result<Graph, GraphError> {
        const MAX_ATTEMPTS: usize = 1000;

        let n = self.node_count;
        if degree == 0 {
            return Ok(Graph::with_nodes(n));
        }
        if degree >= n || (n * degree) % 2 != 0 {
            return Err(GraphError::InvalidRegularDegree {
                degree,
                node_count: n,
            });
        }

        for _ in 0..MAX_ATTEMPTS {
            if let Some(edges) = try_regular_pairing(n, degree, rng) {
                let mut graph = Graph::with_nodes(n);
                for (a, b) in edges {
                    graph.add_edge(a, b)?;
                }
                return Ok(graph);
            }
        }
        Err(GraphError::GenerationFailed {
            attempts: MAX_ATTEMPTS,
        })
    }
}

/// One pairing attempt; `None` when the leftover stubs are stuck
fn try_regular_pairing<R: Rng + ?Sized>(
    n: usize,
    degree: usize,
    rng: &mut R,
) -> Option<Vec<(NodeId, NodeId)>> {
    let mut edges = Vec::with_capacity(n * degree / 2);
    let mut seen = HashSet::with_capacity(n * degree / 2);
    let mut stubs: Vec<NodeId> = (0..n)
        .flat_map(|node| std::iter::repeat_n(node, degree))
        .collect();

    while !stubs.is_empty() {
        let mut leftover: BTreeMap<NodeId, usize> = BTreeMap::new();
        stubs.shuffle(rng);

        for pair in stubs.chunks_exact(2) {
            let (a, b) = (pair[0].min(pair[1]), pair[0].max(pair[1]));
            if a != b && seen.insert((a, b)) {
                edges.push((a, b));
            } else {
                *leftover.entry(a).or_default() += 1;
                *leftover.entry(b).or_default() += 1;
            }
        }

        if !can_complete(&seen, &leftover) {
            return None;
        }
        stubs = leftover
            .into_iter()
            .flat_map(|(node, count)| std::iter::repeat_n(node, count))
            .collect();
    }
    Some(edges)
}

/// Whether some leftover pair can still become a new edge
fn can_complete(seen: &HashSet<(NodeId, NodeId)>, leftover: &BTreeMap<NodeId, usize>) -> bool {
    if leftover.is_empty() {
        return true;
    }
    let nodes: Vec<NodeId> = leftover.keys().copied().collect();
    nodes.iter().enumerate().any(|(i, &a)| {
        nodes[i + 1..]
            .iter()
            .any(|&b| !seen.contains(&(a, b)))
    })
}
