//! Sweep configuration
//!
//! A [`SweepConfig`] describes a complete batch: the worker pool, an optional
//! base seed, and the single-layer and coupled parameter grids. It can be
//! loaded from a JSON file; every field has a default, so a file only needs
//! the fields it changes.

use std::fs;
use std::path::Path;

use rand::Rng;
use sandpile_core::{ConfigError, Graph, GraphBuilder, GraphError};
use serde::{Deserialize, Serialize};

use crate::coupling::CouplingPolicy;
use crate::engine::iterations_from_f64;
use crate::sweep::PoolConfig;

/// Fixture network families available to the driver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkSpec {
    Ring,
    Line,
    Star,
    Complete,
    /// Erdős–Rényi G(n, p)
    ErdosRenyi { edge_probability: f64 },
    /// Random `degree`-regular graph
    RandomRegular { degree: usize },
}

impl NetworkSpec {
    /// Generate a network of `nodes` nodes
    pub fn build<R: Rng + ?Sized>(&self, nodes: usize, rng: &mut R) -> Result<Graph, GraphError> {
        let builder = GraphBuilder::new(nodes);
        Ok(match *self {
            NetworkSpec::Ring => builder.ring(),
            NetworkSpec::Line => builder.line(),
            NetworkSpec::Star => builder.star(),
            NetworkSpec::Complete => builder.complete(),
            NetworkSpec::ErdosRenyi { edge_probability } => {
                builder.erdos_renyi(edge_probability, rng)
            }
            NetworkSpec::RandomRegular { degree } => builder.random_regular(degree, rng)?,
        })
    }

    /// Short label used for task names
    pub fn label(&self) -> String {
        match self {
            NetworkSpec::Ring => "ring".to_string(),
            NetworkSpec::Line => "line".to_string(),
            NetworkSpec::Star => "star".to_string(),
            NetworkSpec::Complete => "complete".to_string(),
            NetworkSpec::ErdosRenyi { edge_probability } => format!("er_{}", edge_probability),
            NetworkSpec::RandomRegular { degree } => format!("rr_{}", degree),
        }
    }
}

/// Single-layer grid: one task per network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleSweepConfig {
    /// Nodes per network
    pub nodes: usize,
    pub networks: Vec<NetworkSpec>,
    /// Dissipation rate; `1 / nodes` when unset
    pub dissipation_rate: Option<f64>,
    /// Iteration budget, may be written as a float such as `1e7`
    pub iterations: f64,
}

impl Default for SingleSweepConfig {
    fn default() -> Self {
        Self {
            nodes: 10_000,
            networks: vec![
                NetworkSpec::ErdosRenyi {
                    edge_probability: 0.0007,
                },
                NetworkSpec::ErdosRenyi {
                    edge_probability: 0.002,
                },
            ],
            dissipation_rate: None,
            iterations: 1e7,
        }
    }
}

impl SingleSweepConfig {
    /// The dissipation rate actually used
    pub fn effective_dissipation_rate(&self) -> f64 {
        self.dissipation_rate
            .unwrap_or_else(|| 1.0 / self.nodes.max(1) as f64)
    }
}

/// Coupled grid: one task per coupling probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoupledSweepConfig {
    /// Nodes per layer
    pub layer_size: usize,
    /// Family of both layers; each layer is drawn independently
    pub layer_network: NetworkSpec,
    pub dissipation_rate: f64,
    pub iterations: f64,
    pub p_values: Vec<f64>,
    pub policy: CouplingPolicy,
    pub min_layer_topples: u64,
}

impl Default for CoupledSweepConfig {
    fn default() -> Self {
        Self {
            layer_size: 2_000,
            layer_network: NetworkSpec::RandomRegular { degree: 3 },
            dissipation_rate: 0.01,
            iterations: 2e6,
            p_values: default_p_values(),
            policy: CouplingPolicy::StubPairing,
            min_layer_topples: 10,
        }
    }
}

/// 0.01..=0.1 in ten steps followed by 0.11..=0.5 in ten steps
pub fn default_p_values() -> Vec<f64> {
    let mut values = linspace(0.01, 0.1, 10);
    values.extend(linspace(0.11, 0.5, 10));
    values
}

/// `count` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Complete batch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Base seed; tasks seed from the OS when unset
    pub seed: Option<u64>,
    pub pool: PoolConfig,
    pub single: SingleSweepConfig,
    pub coupled: CoupledSweepConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            seed: None,
            pool: PoolConfig::auto(),
            single: SingleSweepConfig::default(),
            coupled: CoupledSweepConfig::default(),
        }
    }
}

impl SweepConfig {
    /// Read a JSON config file
    ///
    /// Only the syntax is checked here; each run validates its own section
    /// with [`validate_single`](Self::validate_single) or
    /// [`validate_coupled`](Self::validate_coupled).
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Check every field before any task starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_single()?;
        self.validate_coupled()
    }

    /// Check the pool and the single-layer section
    pub fn validate_single(&self) -> Result<(), ConfigError> {
        self.validate_pool()?;
        if self.single.nodes == 0 {
            return Err(ConfigError::InvalidField {
                field: "single.nodes",
                reason: "must be at least 1".to_string(),
            });
        }
        iterations_from_f64(self.single.iterations)?;
        check_rate(self.single.effective_dissipation_rate())
    }

    /// Check the pool and the coupled section
    pub fn validate_coupled(&self) -> Result<(), ConfigError> {
        self.validate_pool()?;
        if self.coupled.layer_size == 0 {
            return Err(ConfigError::InvalidField {
                field: "coupled.layer_size",
                reason: "must be at least 1".to_string(),
            });
        }
        iterations_from_f64(self.coupled.iterations)?;
        check_rate(self.coupled.dissipation_rate)?;
        for &p in &self.coupled.p_values {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::InvalidProbability(p));
            }
        }
        Ok(())
    }

    fn validate_pool(&self) -> Result<(), ConfigError> {
        if self.pool.threads == 0 {
            return Err(ConfigError::InvalidField {
                field: "pool.threads",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn check_rate(rate: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidDissipationRate(rate));
    }
    Ok(())
}
