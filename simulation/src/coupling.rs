//! Two-layer coupled networks
//!
//! A coupled graph puts two `N`-node layers side by side: layer 0 keeps its
//! ids `0..N`, layer 1 is shifted to `N..2N`. Inter-layer edges are then drawn
//! at random according to a [`CouplingPolicy`].

use rand::Rng;
use rand::seq::SliceRandom;
use sandpile_core::{
    ConfigError, CouplingError, EdgeKind, Graph, Layer, NodeId, SandpileError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How inter-layer edges are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouplingPolicy {
    /// Bernoulli(p) stubs in each layer, shuffled and paired positionally
    ///
    /// Produces a matching: every node has at most one inter-layer edge.
    #[default]
    StubPairing,
    /// Each layer-0 node, with probability p, links to a uniformly random layer-1 node
    ///
    /// Several layer-0 nodes may pick the same partner.
    RandomPartner,
}

/// Layer of every node in a coupled graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerAssignment {
    layers: Vec<Layer>,
}

impl LayerAssignment {
    /// First `layer_size` nodes in layer 0, the next `layer_size` in layer 1
    pub fn split(layer_size: usize) -> Self {
        let mut layers = vec![Layer::Lower; layer_size];
        layers.resize(layer_size * 2, Layer::Upper);
        Self { layers }
    }

    /// Layer of a node
    #[inline]
    pub fn layer_of(&self, node: NodeId) -> Layer {
        self.layers[node]
    }

    pub fn as_slice(&self) -> &[Layer] {
        &self.layers
    }

    /// Number of nodes in a layer
    pub fn count(&self, layer: Layer) -> usize {
        self.layers.iter().filter(|&&l| l == layer).count()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// A coupled two-layer graph and its bookkeeping
#[derive(Debug, Clone)]
pub struct CoupledGraph {
    pub graph: Graph,
    pub layers: LayerAssignment,
    /// Stub candidates drawn per layer (`[layer 0, layer 1]`)
    pub stubs: [usize; 2],
}

impl CoupledGraph {
    /// Nodes per layer
    pub fn layer_size(&self) -> usize {
        self.layers.len() / 2
    }

    /// Number of inter-layer edges
    pub fn coupling_edges(&self) -> usize {
        self.graph.inter_layer_edge_count()
    }
}

/// Builder for coupled graphs over two layers of `layer_size` nodes
#[derive(Debug, Clone, Copy)]
pub struct CoupledGraphBuilder {
    layer_size: usize,
    coupling_probability: f64,
    policy: CouplingPolicy,
}

impl CoupledGraphBuilder {
    /// Create a builder for layers of `layer_size` nodes coupled with probability `p`
    pub fn new(layer_size: usize, coupling_probability: f64) -> Self {
        Self {
            layer_size,
            coupling_probability,
            policy: CouplingPolicy::default(),
        }
    }

    /// Select the coupling policy
    pub fn with_policy(mut self, policy: CouplingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CouplingPolicy {
        self.policy
    }

    /// Compose `lower` and `upper` into a coupled graph
    ///
    /// Both layers must have exactly `layer_size` nodes. Only the layers'
    /// intra-layer edges are copied; the inputs are left untouched.
    pub fn build<R: Rng + ?Sized>(
        &self,
        lower: &Graph,
        upper: &Graph,
        rng: &mut R,
    ) -> Result<CoupledGraph, SandpileError> {
        let n = self.layer_size;
        if n == 0 {
            return Err(CouplingError::ZeroLayerSize.into());
        }
        if lower.node_count() != n || upper.node_count() != n {
            return Err(CouplingError::NodeCountMismatch {
                expected: n,
                lower: lower.node_count(),
                upper: upper.node_count(),
            }
            .into());
        }
        let p = self.coupling_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidProbability(p).into());
        }

        let mut graph = upper.relabeled(n);
        graph.absorb(lower, 0)?;

        let stubs = match self.policy {
            CouplingPolicy::StubPairing => pair_stubs(&mut graph, n, p, rng)?,
            CouplingPolicy::RandomPartner => link_random_partners(&mut graph, n, p, rng)?,
        };

        debug!(
            layer_size = n,
            p,
            policy = ?self.policy,
            lower_stubs = stubs[0],
            upper_stubs = stubs[1],
            coupling_edges = graph.inter_layer_edge_count(),
            "Built coupled graph"
        );

        Ok(CoupledGraph {
            graph,
            layers: LayerAssignment::split(n),
            stubs,
        })
    }
}

/// Bernoulli(p) selection over `range`
fn draw_stubs<R: Rng + ?Sized>(
    range: std::ops::Range<NodeId>,
    p: f64,
    rng: &mut R,
) -> Vec<NodeId> {
    range.filter(|_| rng.random::<f64>() < p).collect()
}

fn pair_stubs<R: Rng + ?Sized>(
    graph: &mut Graph,
    n: usize,
    p: f64,
    rng: &mut R,
) -> Result<[usize; 2], SandpileError> {
    let mut lower = draw_stubs(0..n, p, rng);
    let mut upper = draw_stubs(n..2 * n, p, rng);
    lower.shuffle(rng);
    upper.shuffle(rng);

    for (&a, &b) in lower.iter().zip(&upper) {
        graph.add_edge_with_kind(a, b, EdgeKind::InterLayer)?;
    }
    Ok([lower.len(), upper.len()])
}

fn link_random_partners<R: Rng + ?Sized>(
    graph: &mut Graph,
    n: usize,
    p: f64,
    rng: &mut R,
) -> Result<[usize; 2], SandpileError> {
    let lower = draw_stubs(0..n, p, rng);
    for &a in &lower {
        let partner = n + rng.random_range(0..n);
        graph.add_edge_with_kind(a, partner, EdgeKind::InterLayer)?;
    }
    Ok([lower.len(), 0])
}
