//! # Sandpile Simulation
//!
//! Self-organized-criticality ("sandpile") avalanche dynamics on a single
//! network and on two coupled network layers.
//!
//! ## Overview
//!
//! Every iteration drops one grain on a node. A node whose load exceeds its
//! degree topples: each edge independently either carries one grain to the
//! neighbor or dissipates it (probability `f`), and the node resets to zero.
//! Neighbors pushed over their own threshold topple in turn until the network
//! is stable again. Each such avalanche is summarized as a record.
//!
//! ## Architecture
//!
//! - **Load** (`load.rs`): Per-node load and degree thresholds
//! - **Cascade** (`cascade.rs`): FIFO cascade resolution shared by both engines
//! - **Engine** (`engine.rs`): Single-layer runs emitting `iteration,S,T,G,A`
//! - **Coupling** (`coupling.rs`): Two layers joined by random inter-layer edges
//! - **Coupled engine** (`coupled_engine.rs`): Coupled runs emitting `p,iteration,started_in,A_0,A_1`
//! - **Collector** (`collector.rs`): Append-only record table
//! - **Stats** (`stats.rs`): Run aggregates and frequency tables
//! - **Sweep** (`sweep.rs`): Independent runs in parallel on a rayon pool
//! - **Config** (`config.rs`): JSON-loadable sweep configuration
//! - **Scenarios** (`scenarios.rs`): Small reproducible walkthroughs
//!
//! Each run is sequential; load carries over from one iteration to the next.
//! Parallelism only exists across runs.
//!
//! ## Example: 4-cycle
//!
//! ```rust,ignore
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use sandpile_simulation::*;
//!
//! let graph = GraphBuilder::new(4).ring();
//! let mut engine = AvalancheEngine::new(&graph, EngineConfig::new(0.0, 3), StdRng::seed_from_u64(0))?
//!     .with_selector(ScriptedSelector::fixed(0));
//!
//! let records = engine.run_to_vec();
//! assert_eq!(records[0].size, 1);
//! assert_eq!(engine.load_state().loads(), &[0, 1, 0, 1]);
//! ```

pub mod cascade;
pub mod collector;
pub mod config;
pub mod coupled_engine;
pub mod coupling;
pub mod engine;
pub mod load;
pub mod scenarios;
pub mod stats;
pub mod sweep;

// Re-export main types
pub use cascade::{CascadeOutcome, Dissipation};
pub use collector::{ResultCollector, expected_capacity};
pub use config::{
    CoupledSweepConfig, NetworkSpec, SingleSweepConfig, SweepConfig, default_p_values, linspace,
};
pub use coupled_engine::{CoupledAvalancheEngine, CoupledConfig};
pub use coupling::{CoupledGraph, CoupledGraphBuilder, CouplingPolicy, LayerAssignment};
pub use engine::{AvalancheEngine, EngineConfig, iterations_from_f64};
pub use load::LoadState;
pub use stats::{CoupledRunStats, RunStats, duration_distribution, size_distribution};
pub use sweep::{
    CoupledOutput, CoupledTask, PoolConfig, SingleLayerOutput, SingleLayerTask, SweepRunner,
    TaskOutput, task_rng,
};

// Re-export core types so callers need a single dependency
pub use sandpile_core::{
    AvalancheRecord, CoupledAvalancheRecord, Graph, GraphBuilder, Layer, NodeId, NodeSelector,
    Record, SandpileError, SandpileResult, ScriptedSelector, Topology, UniformSelector,
};
