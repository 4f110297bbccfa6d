//! Avalanche engine for coupled two-layer networks
//!
//! Same cascade mechanics as the single-layer engine, over the `2N`-node
//! coupled graph with one shared load vector. Thresholds include inter-layer
//! edges. Instead of size and area, each topple is attributed to the layer of
//! the toppling node, and only avalanches with more than `min_layer_topples`
//! topples in some layer are recorded.

use rand::Rng;
use sandpile_core::{
    CoupledAvalancheRecord, Layer, NodeId, NodeSelector, SandpileError, UniformSelector,
    validate_topology,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cascade::{Cascade, Dissipation};
use crate::collector::{ResultCollector, expected_capacity};
use crate::coupling::CoupledGraph;
use crate::engine::EngineConfig;
use crate::load::LoadState;

/// Parameters of one coupled run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoupledConfig {
    /// Coupling probability label copied into every record
    pub coupling_probability: f64,
    /// Dissipation rate and iteration budget
    #[serde(flatten)]
    pub engine: EngineConfig,
    /// Record only avalanches where some layer toppled more than this
    pub min_layer_topples: u64,
}

impl Default for CoupledConfig {
    fn default() -> Self {
        Self {
            coupling_probability: 0.0,
            engine: EngineConfig::default(),
            min_layer_topples: 10,
        }
    }
}

impl CoupledConfig {
    pub fn new(coupling_probability: f64, engine: EngineConfig) -> Self {
        Self {
            coupling_probability,
            engine,
            ..Self::default()
        }
    }

    /// Set the emission threshold
    pub fn with_min_layer_topples(mut self, min_layer_topples: u64) -> Self {
        self.min_layer_topples = min_layer_topples;
        self
    }
}

/// Avalanche simulation on a coupled graph
pub struct CoupledAvalancheEngine<'g, R: Rng, S: NodeSelector = UniformSelector> {
    coupled: &'g CoupledGraph,
    config: CoupledConfig,
    dissipation: Dissipation,
    load: LoadState,
    cascade: Cascade,
    rng: R,
    selector: S,
    iteration: u64,
    /// Avalanches resolved, recorded or not
    avalanches: u64,
}

impl<'g, R: Rng> CoupledAvalancheEngine<'g, R, UniformSelector> {
    /// Create an engine over a coupled graph
    pub fn new(
        coupled: &'g CoupledGraph,
        config: CoupledConfig,
        rng: R,
    ) -> Result<Self, SandpileError> {
        validate_topology(&coupled.graph)?;
        let dissipation = config.engine.validate()?;
        let node_count = coupled.graph.node_count();

        Ok(Self {
            coupled,
            config,
            dissipation,
            load: LoadState::new(&coupled.graph),
            cascade: Cascade::new(node_count),
            rng,
            selector: UniformSelector,
            iteration: 0,
            avalanches: 0,
        })
    }
}

impl<'g, R: Rng, S: NodeSelector> CoupledAvalancheEngine<'g, R, S> {
    /// Replace the node selector
    pub fn with_selector<S2: NodeSelector>(
        self,
        selector: S2,
    ) -> CoupledAvalancheEngine<'g, R, S2> {
        CoupledAvalancheEngine {
            coupled: self.coupled,
            config: self.config,
            dissipation: self.dissipation,
            load: self.load,
            cascade: self.cascade,
            rng: self.rng,
            selector,
            iteration: self.iteration,
            avalanches: self.avalanches,
        }
    }

    /// Run one iteration on a node chosen by the selector
    pub fn step(&mut self) -> Option<CoupledAvalancheRecord> {
        let node = self
            .selector
            .select(self.coupled.graph.node_count(), &mut self.rng);
        self.perturb(node)
    }

    /// Run one iteration that drops its grain on `node`
    ///
    /// Returns a record only if the avalanche passes the emission threshold.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not a node of the graph. No iteration is counted
    /// and the load state is left untouched in that case.
    pub fn perturb(&mut self, node: NodeId) -> Option<CoupledAvalancheRecord> {
        assert!(
            node < self.load.node_count(),
            "node {} out of range for {} nodes",
            node,
            self.load.node_count()
        );
        let iteration = self.iteration;
        self.iteration += 1;

        self.load.add_grain(node);
        if !self.load.is_unstable(node) {
            return None;
        }

        self.avalanches += 1;
        let layers = &self.coupled.layers;
        let started_in = layers.layer_of(node);
        let mut topples = [0u64; 2];

        self.cascade.resolve(
            &self.coupled.graph,
            &mut self.load,
            self.dissipation,
            &mut self.rng,
            node,
            |toppled| topples[layers.layer_of(toppled).index()] += 1,
        );

        let [lower_topples, upper_topples] = topples;
        (lower_topples.max(upper_topples) > self.config.min_layer_topples).then_some(
            CoupledAvalancheRecord {
                p: self.config.coupling_probability,
                iteration,
                started_in,
                lower_topples,
                upper_topples,
            },
        )
    }

    /// Run the configured iteration budget, appending records to `collector`
    pub fn run(&mut self, collector: &mut ResultCollector<CoupledAvalancheRecord>) -> usize {
        let budget = self.config.engine.iterations;
        let progress_every = (budget / 10).max(1);
        let before = collector.len();
        let avalanches_before = self.avalanches;

        info!(
            layer_size = self.coupled.layer_size(),
            p = self.config.coupling_probability,
            coupling_edges = self.coupled.coupling_edges(),
            dissipation_rate = self.dissipation.rate(),
            iterations = budget,
            "Starting coupled avalanche run"
        );

        for done in 1..=budget {
            if let Some(record) = self.step() {
                collector.push(record);
            }
            if done % progress_every == 0 {
                debug!(done, budget, recorded = collector.len() - before, "Run progress");
            }
        }

        let emitted = collector.len() - before;
        info!(
            iterations = budget,
            avalanches = self.avalanches - avalanches_before,
            recorded = emitted,
            "Coupled avalanche run complete"
        );
        emitted
    }

    /// Run the configured budget into a fresh collector and return its records
    pub fn run_to_vec(&mut self) -> Vec<CoupledAvalancheRecord> {
        let mut collector =
            ResultCollector::with_capacity(expected_capacity(self.config.engine.iterations, 0.01));
        self.run(&mut collector);
        collector.finalize()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Avalanches resolved so far, including those below the threshold
    pub fn avalanche_count(&self) -> u64 {
        self.avalanches
    }

    pub fn config(&self) -> &CoupledConfig {
        &self.config
    }

    /// Layer of a node in the underlying coupled graph
    pub fn layer_of(&self, node: NodeId) -> Layer {
        self.coupled.layers.layer_of(node)
    }
}
