//! Cascade resolution shared by both engines
//!
//! Once a perturbation pushes a node over its threshold, the avalanche is
//! resolved with a FIFO queue of unstable nodes:
//!
//! 1. Pop the front node and report the topple to the caller
//! 2. Keep each neighbor independently with probability `1 - f`
//! 3. Deliver one grain to every kept neighbor, then reset the node to zero
//! 4. Queue kept neighbors that are now unstable, unless already queued
//!
//! A node may topple several times in one avalanche; it is only ever queued
//! once at a time. Every topple loses at least one grain, so the queue always
//! drains, even with `f = 0`.

use std::collections::VecDeque;

use rand::Rng;
use sandpile_core::{ConfigError, NodeId, Topology};
use tracing::trace;

use crate::load::LoadState;

/// Per-edge probability that a grain is lost instead of delivered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dissipation(f64);

impl Dissipation {
    /// Validate a dissipation rate in `[0, 1]`
    pub fn new(rate: f64) -> Result<Self, ConfigError> {
        if (0.0..=1.0).contains(&rate) {
            Ok(Self(rate))
        } else {
            Err(ConfigError::InvalidDissipationRate(rate))
        }
    }

    /// The rate `f`
    pub fn rate(self) -> f64 {
        self.0
    }

    /// One Bernoulli trial: true when the grain reaches the neighbor
    ///
    /// A uniform draw in `[0, 1)` is compared with `>=`, so `f = 0` always
    /// delivers and `f = 1` never does.
    #[inline]
    pub fn retains<R: Rng + ?Sized>(self, rng: &mut R) -> bool {
        rng.random::<f64>() >= self.0
    }
}

/// Aggregate counters of one resolved avalanche
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeOutcome {
    /// Topple events, repeats included
    pub topples: u64,
    /// Cascade rounds; 1 for a lone topple
    pub rounds: u64,
    /// Grains delivered to neighbors
    pub propagated: u64,
}

/// Reusable queue storage for cascade resolution
#[derive(Debug, Clone)]
pub(crate) struct Cascade {
    queue: VecDeque<NodeId>,
    queued: Vec<bool>,
    retained: Vec<NodeId>,
}

impl Cascade {
    pub(crate) fn new(node_count: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: vec![false; node_count],
            retained: Vec::new(),
        }
    }

    /// Resolve the avalanche started by the unstable node `origin`
    ///
    /// `on_topple` is called once per topple event, in processing order.
    pub(crate) fn resolve<T, R, F>(
        &mut self,
        topology: &T,
        load: &mut LoadState,
        dissipation: Dissipation,
        rng: &mut R,
        origin: NodeId,
        mut on_topple: F,
    ) -> CascadeOutcome
    where
        T: Topology + ?Sized,
        R: Rng + ?Sized,
        F: FnMut(NodeId),
    {
        debug_assert!(load.is_unstable(origin));

        let mut outcome = CascadeOutcome {
            topples: 0,
            rounds: 1,
            propagated: 0,
        };

        self.queue.push_back(origin);
        self.queued[origin] = true;

        while let Some(node) = self.queue.pop_front() {
            self.queued[node] = false;
            outcome.topples += 1;
            on_topple(node);

            self.retained.clear();
            for &neighbor in topology.neighbors(node) {
                if dissipation.retains(rng) {
                    self.retained.push(neighbor);
                }
            }
            outcome.propagated += self.retained.len() as u64;

            for &neighbor in &self.retained {
                load.add_grain(neighbor);
            }
            load.discharge(node);

            let mut any_unstable = false;
            for &neighbor in &self.retained {
                if load.is_unstable(neighbor) {
                    any_unstable = true;
                    if !self.queued[neighbor] {
                        self.queued[neighbor] = true;
                        self.queue.push_back(neighbor);
                    }
                }
            }
            if any_unstable {
                outcome.rounds += 1;
            }
        }

        trace!(
            origin,
            topples = outcome.topples,
            rounds = outcome.rounds,
            propagated = outcome.propagated,
            "Cascade resolved"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sandpile_core::{Graph, GraphBuilder};

    fn primed(graph: &Graph, node: NodeId) -> LoadState {
        let mut load = LoadState::new(graph);
        for _ in 0..=graph.degree(node) {
            load.add_grain(node);
        }
        load
    }

    #[test]
    fn test_dissipation_bounds() {
        assert!(Dissipation::new(0.0).is_ok());
        assert!(Dissipation::new(1.0).is_ok());
        assert_eq!(
            Dissipation::new(1.01),
            Err(ConfigError::InvalidDissipationRate(1.01))
        );
        assert!(Dissipation::new(-0.1).is_err());
        assert!(Dissipation::new(f64::NAN).is_err());
    }

    #[test]
    fn test_dissipation_extremes_are_exact() {
        let mut rng = StdRng::seed_from_u64(3);
        let keep_all = Dissipation::new(0.0).unwrap();
        let drop_all = Dissipation::new(1.0).unwrap();
        for _ in 0..10_000 {
            assert!(keep_all.retains(&mut rng));
            assert!(!drop_all.retains(&mut rng));
        }
    }

    #[test]
    fn test_single_topple_on_cycle() {
        let graph = GraphBuilder::new(4).ring();
        let mut load = primed(&graph, 0);
        let mut cascade = Cascade::new(4);
        let mut rng = StdRng::seed_from_u64(1);
        let mut toppled = Vec::new();

        let outcome = cascade.resolve(
            &graph,
            &mut load,
            Dissipation::new(0.0).unwrap(),
            &mut rng,
            0,
            |n| toppled.push(n),
        );

        assert_eq!(
            outcome,
            CascadeOutcome {
                topples: 1,
                rounds: 1,
                propagated: 2
            }
        );
        assert_eq!(toppled, vec![0]);
        assert_eq!(load.loads(), &[0, 1, 0, 1]);
    }

    #[test]
    fn test_chain_reaction_on_line() {
        // 0 - 1 - 2, node 1 sits at threshold and tips over when 0 topples
        let graph = GraphBuilder::new(3).line();
        let mut load = primed(&graph, 0);
        load.add_grain(1);
        load.add_grain(1);
        let mut cascade = Cascade::new(3);
        let mut rng = StdRng::seed_from_u64(1);
        let mut toppled = Vec::new();

        let outcome = cascade.resolve(
            &graph,
            &mut load,
            Dissipation::new(0.0).unwrap(),
            &mut rng,
            0,
            |n| toppled.push(n),
        );

        // 0 topples -> 1 reaches 3 > 2 and topples -> 0 and 2 each receive one grain
        assert_eq!(toppled, vec![0, 1]);
        assert_eq!(outcome.topples, 2);
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.propagated, 3);
        assert_eq!(load.loads(), &[1, 0, 1]);
    }

    #[test]
    fn test_full_dissipation_never_propagates() {
        let graph = GraphBuilder::new(6).complete();
        let mut load = primed(&graph, 2);
        let mut cascade = Cascade::new(6);
        let mut rng = StdRng::seed_from_u64(9);

        let outcome = cascade.resolve(
            &graph,
            &mut load,
            Dissipation::new(1.0).unwrap(),
            &mut rng,
            2,
            |_| {},
        );

        assert_eq!(outcome.topples, 1);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.propagated, 0);
        assert_eq!(load.total_load(), 0);
    }

    #[test]
    fn test_isolated_node_topples_alone() {
        let graph = Graph::with_nodes(1);
        let mut load = primed(&graph, 0);
        let mut cascade = Cascade::new(1);
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = cascade.resolve(
            &graph,
            &mut load,
            Dissipation::new(0.0).unwrap(),
            &mut rng,
            0,
            |_| {},
        );

        assert_eq!(
            outcome,
            CascadeOutcome {
                topples: 1,
                rounds: 1,
                propagated: 0
            }
        );
        assert_eq!(load.load(0), 0);
    }

    #[test]
    fn test_queue_drains_and_leaves_stable_state() {
        let graph = GraphBuilder::new(5).complete();
        let mut load = LoadState::new(&graph);
        for n in 0..5 {
            for _ in 0..4 {
                load.add_grain(n);
            }
        }
        load.add_grain(0);

        let mut cascade = Cascade::new(5);
        let mut rng = StdRng::seed_from_u64(11);
        let outcome = cascade.resolve(
            &graph,
            &mut load,
            Dissipation::new(0.0).unwrap(),
            &mut rng,
            0,
            |_| {},
        );

        assert!(outcome.topples >= 5);
        assert!(load.unstable_nodes().is_empty());
        assert!(cascade.queue.is_empty());
        assert!(cascade.queued.iter().all(|&q| !q));
    }
}
