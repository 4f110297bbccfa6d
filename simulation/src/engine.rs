//! Single-layer avalanche engine
//!
//! Each iteration drops one grain on a node. If that node goes over its
//! threshold the resulting avalanche is resolved to completion and summarized
//! as an [`AvalancheRecord`]. Load carries over between iterations, so the
//! engine owns its [`LoadState`] for the whole run.

use rand::Rng;
use sandpile_core::{
    AvalancheRecord, ConfigError, NodeId, NodeSelector, SandpileError, Topology,
    UniformSelector, validate_topology,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cascade::{Cascade, Dissipation};
use crate::collector::{ResultCollector, expected_capacity};
use crate::load::LoadState;

/// Parameters of one engine run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-edge dissipation probability `f`
    pub dissipation_rate: f64,
    /// Number of perturbations to run
    pub iterations: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dissipation_rate: 0.01,
            iterations: 1_000_000,
        }
    }
}

impl EngineConfig {
    /// Create a config with the given rate and budget
    pub fn new(dissipation_rate: f64, iterations: u64) -> Self {
        Self {
            dissipation_rate,
            iterations,
        }
    }

    /// Set the dissipation rate
    pub fn with_dissipation_rate(mut self, rate: f64) -> Self {
        self.dissipation_rate = rate;
        self
    }

    /// Set the iteration budget
    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the iteration budget from a float such as `1e7`
    pub fn with_iterations_f64(mut self, iterations: f64) -> Result<Self, ConfigError> {
        self.iterations = iterations_from_f64(iterations)?;
        Ok(self)
    }

    /// Check the rate and budget
    pub fn validate(&self) -> Result<Dissipation, ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::InvalidIterations(0.0));
        }
        Dissipation::new(self.dissipation_rate)
    }
}

/// Convert a float-specified iteration count, truncating the fraction
pub fn iterations_from_f64(iterations: f64) -> Result<u64, ConfigError> {
    if !iterations.is_finite() || iterations < 1.0 || iterations >= u64::MAX as f64 {
        return Err(ConfigError::InvalidIterations(iterations));
    }
    Ok(iterations.trunc() as u64)
}

/// Avalanche simulation on a single network
pub struct AvalancheEngine<'g, T: Topology + ?Sized, R: Rng, S: NodeSelector = UniformSelector> {
    topology: &'g T,
    config: EngineConfig,
    dissipation: Dissipation,
    load: LoadState,
    cascade: Cascade,
    rng: R,
    selector: S,
    /// Index of the next perturbation
    iteration: u64,
    /// Per-node avalanche stamp for distinct-node counting
    last_toppled_in: Vec<u64>,
    avalanche_count: u64,
}

impl<'g, T: Topology + ?Sized, R: Rng> AvalancheEngine<'g, T, R, UniformSelector> {
    /// Create an engine with uniform node selection
    ///
    /// Fails if the topology is malformed or the config is out of range.
    pub fn new(topology: &'g T, config: EngineConfig, rng: R) -> Result<Self, SandpileError> {
        validate_topology(topology)?;
        let dissipation = config.validate()?;
        let node_count = topology.node_count();

        Ok(Self {
            topology,
            config,
            dissipation,
            load: LoadState::new(topology),
            cascade: Cascade::new(node_count),
            rng,
            selector: UniformSelector,
            iteration: 0,
            last_toppled_in: vec![0; node_count],
            avalanche_count: 0,
        })
    }
}

impl<'g, T: Topology + ?Sized, R: Rng, S: NodeSelector> AvalancheEngine<'g, T, R, S> {
    /// Replace the node selector
    pub fn with_selector<S2: NodeSelector>(self, selector: S2) -> AvalancheEngine<'g, T, R, S2> {
        AvalancheEngine {
            topology: self.topology,
            config: self.config,
            dissipation: self.dissipation,
            load: self.load,
            cascade: self.cascade,
            rng: self.rng,
            selector,
            iteration: self.iteration,
            last_toppled_in: self.last_toppled_in,
            avalanche_count: self.avalanche_count,
        }
    }

    /// Run one iteration on a node chosen by the selector
    pub fn step(&mut self) -> Option<AvalancheRecord> {
        let node = self
            .selector
            .select(self.topology.node_count(), &mut self.rng);
        self.perturb(node)
    }

    /// Run one iteration that drops its grain on `node`
    ///
    /// Returns the avalanche record if the grain caused one.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not a node of the graph. No iteration is counted
    /// and the load state is left untouched in that case.
    pub fn perturb(&mut self, node: NodeId) -> Option<AvalancheRecord> {
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

        self.avalanche_count += 1;
        let stamp = self.avalanche_count;
        let last_toppled_in = &mut self.last_toppled_in;
        let mut area = 0u64;

        let outcome = self.cascade.resolve(
            self.topology,
            &mut self.load,
            self.dissipation,
            &mut self.rng,
            node,
            |toppled| {
                if last_toppled_in[toppled] != stamp {
                    last_toppled_in[toppled] = stamp;
                    area += 1;
                }
            },
        );

        (area > 0).then_some(AvalancheRecord {
            iteration,
            size: outcome.topples,
            duration: outcome.rounds,
            propagated: outcome.propagated,
            area,
        })
    }

    /// Run the configured iteration budget, appending records to `collector`
    ///
    /// Returns the number of records emitted by this call.
    pub fn run(&mut self, collector: &mut ResultCollector<AvalancheRecord>) -> usize {
        let budget = self.config.iterations;
        let progress_every = (budget / 10).max(1);
        let before = collector.len();

        info!(
            nodes = self.topology.node_count(),
            dissipation_rate = self.dissipation.rate(),
            iterations = budget,
            "Starting avalanche run"
        );

        for done in 1..=budget {
            if let Some(record) = self.step() {
                collector.push(record);
            }
            if done % progress_every == 0 {
                debug!(
                    done,
                    budget,
                    avalanches = collector.len() - before,
                    "Run progress"
                );
            }
        }

        let emitted = collector.len() - before;
        info!(
            iterations = budget,
            avalanches = emitted,
            total_load = self.load.total_load(),
            "Avalanche run complete"
        );
        emitted
    }

    /// Run the configured budget into a fresh collector and return its records
    pub fn run_to_vec(&mut self) -> Vec<AvalancheRecord> {
        let mut collector =
            ResultCollector::with_capacity(expected_capacity(self.config.iterations, 0.5));
        self.run(&mut collector);
        collector.finalize()
    }

    /// Current load state
    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    /// Index the next perturbation will get
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// The run parameters
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sandpile_core::{Graph, GraphBuilder, GraphError, ScriptedSelector};

    fn cycle_engine(
        graph: &Graph,
        f: f64,
    ) -> AvalancheEngine<'_, Graph, StdRng, ScriptedSelector> {
        AvalancheEngine::new(graph, EngineConfig::new(f, 3), StdRng::seed_from_u64(0))
            .unwrap()
            .with_selector(ScriptedSelector::fixed(0))
    }

    #[test]
    fn test_cycle_scenario() {
        let graph = GraphBuilder::new(4).ring();
        let mut engine = cycle_engine(&graph, 0.0);

        assert_eq!(engine.step(), None);
        assert_eq!(engine.load_state().loads(), &[1, 0, 0, 0]);

        assert_eq!(engine.step(), None);
        assert_eq!(engine.load_state().loads(), &[2, 0, 0, 0]);

        let record = engine.step().unwrap();
        assert_eq!(
            record,
            AvalancheRecord {
                iteration: 2,
                size: 1,
                duration: 1,
                propagated: 2,
                area: 1,
            }
        );
        assert_eq!(engine.load_state().loads(), &[0, 1, 0, 1]);
        assert_eq!(engine.iteration(), 3);
    }

    #[test]
    fn test_run_collects_cycle_record() {
        let graph = GraphBuilder::new(4).ring();
        let mut engine = cycle_engine(&graph, 0.0);

        let records = engine.run_to_vec();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].iteration, 2);
    }

    #[test]
    fn test_isolated_node_record() {
        let graph = Graph::with_nodes(1);
        let mut engine = AvalancheEngine::new(
            &graph,
            EngineConfig::new(0.5, 10),
            StdRng::seed_from_u64(4),
        )
        .unwrap();

        // Threshold 0: every grain topples the node immediately
        for i in 0..10 {
            let record = engine.step().unwrap();
            assert_eq!(
                record,
                AvalancheRecord {
                    iteration: i,
                    size: 1,
                    duration: 1,
                    propagated: 0,
                    area: 1,
                }
            );
        }
    }

    #[test]
    fn test_repeat_topples_count_once_in_area() {
        // Triangle at threshold everywhere: one extra grain topples every node
        let graph = GraphBuilder::new(3).complete();
        let mut engine =
            AvalancheEngine::new(&graph, EngineConfig::new(0.0, 1), StdRng::seed_from_u64(2))
                .unwrap();
        for node in 0..3 {
            for _ in 0..2 {
                assert!(engine.perturb(node).is_none());
            }
        }

        let record = engine.perturb(0).unwrap();
        assert!(record.area <= record.size);
        assert_eq!(record.area, 3);
        assert!(record.duration >= 1);
        assert!(engine.load_state().unstable_nodes().is_empty());
    }

    #[test]
    fn test_full_dissipation_records() {
        let graph = GraphBuilder::new(10).complete();
        let mut engine = AvalancheEngine::new(
            &graph,
            EngineConfig::new(1.0, 5_000),
            StdRng::seed_from_u64(8),
        )
        .unwrap();

        let records = engine.run_to_vec();
        assert!(!records.is_empty());
        for record in records {
            assert_eq!(record.area, 1);
            assert_eq!(record.size, 1);
            assert_eq!(record.duration, 1);
            assert_eq!(record.propagated, 0);
        }
    }

    #[test]
    fn test_rejects_bad_config() {
        let graph = GraphBuilder::new(4).ring();
        let err = AvalancheEngine::new(
            &graph,
            EngineConfig::new(1.5, 10),
            StdRng::seed_from_u64(0),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            SandpileError::Config(ConfigError::InvalidDissipationRate(_))
        ));

        let err = AvalancheEngine::new(&graph, EngineConfig::new(0.1, 0), StdRng::seed_from_u64(0))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SandpileError::Config(ConfigError::InvalidIterations(_))
        ));
    }

    #[test]
    fn test_rejects_empty_graph() {
        let graph = Graph::with_nodes(0);
        let err = AvalancheEngine::new(&graph, EngineConfig::default(), StdRng::seed_from_u64(0))
            .err()
            .unwrap();
        assert!(matches!(err, SandpileError::Graph(GraphError::Empty)));
    }

    #[test]
    fn test_iterations_from_f64() {
        assert_eq!(iterations_from_f64(1e7), Ok(10_000_000));
        assert_eq!(iterations_from_f64(2.9), Ok(2));
        assert!(iterations_from_f64(0.5).is_err());
        assert!(iterations_from_f64(-1.0).is_err());
        assert!(iterations_from_f64(f64::NAN).is_err());
        assert!(iterations_from_f64(f64::INFINITY).is_err());

        let config = EngineConfig::default().with_iterations_f64(2e6).unwrap();
        assert_eq!(config.iterations, 2_000_000);
    }

    #[test]
    fn test_same_seed_same_records() {
        let graph = GraphBuilder::new(30).erdos_renyi(0.2, &mut StdRng::seed_from_u64(5));
        let config = EngineConfig::new(0.05, 20_000);

        let a = AvalancheEngine::new(&graph, config, StdRng::seed_from_u64(99))
            .unwrap()
            .run_to_vec();
        let b = AvalancheEngine::new(&graph, config, StdRng::seed_from_u64(99))
            .unwrap()
            .run_to_vec();
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_perturb_unknown_node_panics() {
        let graph = GraphBuilder::new(4).ring();
        let mut engine =
            AvalancheEngine::new(&graph, EngineConfig::new(0.1, 1), StdRng::seed_from_u64(0))
                .unwrap();
        engine.perturb(4);
    }
}
