//! Choice of the node that receives each grain
//!
//! Production runs draw uniformly at random. Tests substitute a
//! [`ScriptedSelector`] so a scenario can drop grains on known nodes.

use std::collections::VecDeque;

use rand::Rng;

use crate::graph::NodeId;

/// Picks the node perturbed by the next iteration
pub trait NodeSelector: Send {
    /// Select a node in `0..node_count`
    fn select<R: Rng + ?Sized>(&mut self, node_count: usize, rng: &mut R) -> NodeId;
}

/// Uniform random selection
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSelector;

impl NodeSelector for UniformSelector {
    fn select<R: Rng + ?Sized>(&mut self, node_count: usize, rng: &mut R) -> NodeId {
        rng.random_range(0..node_count)
    }
}

/// Replays a fixed sequence of nodes, cycling when exhausted
///
/// Selections are reduced modulo the node count so a script can never name a
/// node outside the graph.
#[derive(Debug, Clone)]
pub struct ScriptedSelector {
    script: VecDeque<NodeId>,
}

impl ScriptedSelector {
    /// Create a selector from a non-empty script
    ///
    /// An empty script falls back to always selecting node 0.
    pub fn new(script: impl IntoIterator<Item = NodeId>) -> Self {
        let mut script: VecDeque<NodeId> = script.into_iter().collect();
        if script.is_empty() {
            script.push_back(0);
        }
        Self { script }
    }

    /// Always select the same node
    pub fn fixed(node: NodeId) -> Self {
        Self::new([node])
    }
}

impl NodeSelector for ScriptedSelector {
    fn select<R: Rng + ?Sized>(&mut self, node_count: usize, _rng: &mut R) -> NodeId {
        // Never empty: new() guarantees one entry and rotation preserves length
        let node = self.script.front().copied().unwrap_or(0);
        self.script.rotate_left(1);
        node % node_count.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_uniform_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut selector = UniformSelector;
        for _ in 0..1000 {
            assert!(selector.select(10, &mut rng) < 10);
        }
    }

    #[test]
    fn test_scripted_cycles() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut selector = ScriptedSelector::new([2, 0, 1]);
        let picks: Vec<_> = (0..6).map(|_| selector.select(4, &mut rng)).collect();
        assert_eq!(picks, vec![2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_scripted_wraps_out_of_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut selector = ScriptedSelector::fixed(9);
        assert_eq!(selector.select(4, &mut rng), 1);
    }

    #[test]
    fn test_empty_script_selects_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut selector = ScriptedSelector::new(Vec::new());
        assert_eq!(selector.select(4, &mut rng), 0);
    }
}
