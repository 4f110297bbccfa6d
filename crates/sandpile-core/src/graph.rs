//! Dense undirected graph used by the avalanche engines
//!
//! Nodes are the integers `0..node_count`, so per-node state can live in plain
//! vectors indexed by [`NodeId`]. The graph has simple-graph semantics: self
//! loops are ignored and a repeated edge is stored once, which keeps
//! `degree(n) == neighbors(n).len()` true by construction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Dense node index
pub type NodeId = usize;

/// Whether an edge joins two nodes of the same layer or crosses layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EdgeKind {
    #[default]
    IntraLayer,
    InterLayer,
}

/// An undirected edge, stored with `a < b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
    pub kind: EdgeKind,
}

/// Undirected graph over a dense node range
#[derive(Debug, Clone, Default)]
pub struct Graph {
    adjacency: Vec<Vec<NodeId>>,
    edges: Vec<Edge>,
    edge_set: HashSet<(NodeId, NodeId)>,
}

impl Graph {
    /// Create a graph with `node_count` isolated nodes
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); node_count],
            edges: Vec::new(),
            edge_set: HashSet::new(),
        }
    }

    /// Build a graph from an edge list, rejecting edges to unknown nodes
    pub fn from_edges(node_count: usize, edges: &[(NodeId, NodeId)]) -> Result<Self, GraphError> {
        let mut graph = Self::with_nodes(node_count);
        for &(a, b) in edges {
            graph.add_edge(a, b)?;
        }
        Ok(graph)
    }

    /// Append `count` isolated nodes, returning the id of the first one
    pub fn add_nodes(&mut self, count: usize) -> NodeId {
        let first = self.adjacency.len();
        self.adjacency.resize_with(first + count, Vec::new);
        first
    }

    /// Add an intra-layer edge
    ///
    /// Returns `Ok(false)` when the edge was a self loop or already present.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<bool, GraphError> {
        self.add_edge_with_kind(a, b, EdgeKind::IntraLayer)
    }

    /// Add an edge tagged with the given kind
    pub fn add_edge_with_kind(
        &mut self,
        a: NodeId,
        b: NodeId,
        kind: EdgeKind,
    ) -> Result<bool, GraphError> {
        let node_count = self.node_count();
        for node in [a, b] {
            if node >= node_count {
                return Err(GraphError::UnknownNode { node, node_count });
            }
        }

        if a == b {
            return Ok(false);
        }

        let key = if a < b { (a, b) } else { (b, a) };
        if !self.edge_set.insert(key) {
            return Ok(false);
        }

        self.adjacency[a].push(b);
        self.adjacency[b].push(a);
        self.edges.push(Edge {
            a: key.0,
            b: key.1,
            kind,
        });
        Ok(true)
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges tagged [`EdgeKind::InterLayer`]
    pub fn inter_layer_edge_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|e| e.kind == EdgeKind::InterLayer)
            .count()
    }

    /// Degree of a node (0 for ids outside the graph)
    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency.get(node).map_or(0, Vec::len)
    }

    /// Neighbors of a node in insertion order
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        self.adjacency.get(node).map_or(&[], Vec::as_slice)
    }

    /// All edges in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Iterate node ids
    pub fn nodes(&self) -> std::ops::Range<NodeId> {
        0..self.node_count()
    }

    /// Check if two nodes share an edge
    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        let key = if a < b { (a, b) } else { (b, a) };
        self.edge_set.contains(&key)
    }

    /// Copy of this graph with every node id shifted by `offset`
    ///
    /// The copy has `node_count + offset` nodes; ids below `offset` are isolated.
    pub fn relabeled(&self, offset: usize) -> Self {
        let mut graph = Self::with_nodes(self.node_count() + offset);
        for edge in &self.edges {
            let a = edge.a + offset;
            let b = edge.b + offset;
            graph.adjacency[a].push(b);
            graph.adjacency[b].push(a);
            graph.edge_set.insert((a, b));
            graph.edges.push(Edge { a, b, kind: edge.kind });
        }
        graph
    }

    /// Merge another graph's edges into this one, shifting its ids by `offset`
    ///
    /// The caller must already have room for the shifted ids.
    pub fn absorb(&mut self, other: &Graph, offset: usize) -> Result<(), GraphError> {
        for edge in other.edges() {
            self.add_edge_with_kind(edge.a + offset, edge.b + offset, edge.kind)?;
        }
        Ok(())
    }

    /// Sum of all degrees (twice the edge count)
    pub fn total_degree(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Summary of the graph structure for logs and the CLI
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Graph:\n");
        output.push_str(&format!("  Nodes: {}\n", self.node_count()));
        output.push_str(&format!("  Edges: {}\n", self.edge_count()));
        output.push_str(&format!(
            "  Inter-layer edges: {}\n\n",
            self.inter_layer_edge_count()
        ));

        for (node, neighbors) in self.adjacency.iter().enumerate().take(32) {
            let neighbor_str: Vec<String> = neighbors.iter().map(|n| n.to_string()).collect();
            output.push_str(&format!("  {} -> [{}]\n", node, neighbor_str.join(", ")));
        }
        if self.node_count() > 32 {
            output.push_str(&format!("  ... ({} more)\n", self.node_count() - 32));
        }
        output
    }
}
