//! Per-node load and critical thresholds
//!
//! Load persists across avalanches for the whole run (the pile accumulates);
//! thresholds are fixed to each node's degree when the state is built.

use sandpile_core::{NodeId, Topology};

/// Mutable load of every node, owned by one engine
#[derive(Debug, Clone)]
pub struct LoadState {
    load: Vec<u32>,
    critical: Vec<u32>,
}

impl LoadState {
    /// Zero load everywhere, thresholds taken from node degrees
    pub fn new<T: Topology + ?Sized>(topology: &T) -> Self {
        let node_count = topology.node_count();
        Self {
            load: vec![0; node_count],
            critical: (0..node_count)
                .map(|n| topology.degree(n) as u32)
                .collect(),
        }
    }

    /// Add one grain to a node
    #[inline]
    pub fn add_grain(&mut self, node: NodeId) {
        self.load[node] += 1;
    }

    /// Whether the node's load exceeds its threshold
    #[inline]
    pub fn is_unstable(&self, node: NodeId) -> bool {
        self.load[node] > self.critical[node]
    }

    /// Reset a toppling node's load to zero
    #[inline]
    pub fn discharge(&mut self, node: NodeId) {
        self.load[node] = 0;
    }

    /// Current load of a node
    pub fn load(&self, node: NodeId) -> u32 {
        self.load[node]
    }

    /// Threshold of a node
    pub fn critical_load(&self, node: NodeId) -> u32 {
        self.critical[node]
    }

    /// All loads, indexed by node
    pub fn loads(&self) -> &[u32] {
        &self.load
    }

    /// Sum of all loads
    pub fn total_load(&self) -> u64 {
        self.load.iter().map(|&l| u64::from(l)).sum()
    }

    /// Number of nodes tracked
    pub fn node_count(&self) -> usize {
        self.load.len()
    }

    /// Nodes currently above threshold
    ///
    /// Between avalanches this is always empty.
    pub fn unstable_nodes(&self) -> Vec<NodeId> {
        (0..self.load.len())
            .filter(|&n| self.is_unstable(n))
            .collect()
    }
}
