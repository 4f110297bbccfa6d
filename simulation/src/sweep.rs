//! Parameter sweeps on a fixed-size worker pool
//!
//! A sweep is a list of independent tasks (one graph or one coupling
//! probability each). Tasks run in parallel, one per worker, and share nothing
//! mutable: source graphs are shared read-only through `Arc`, while every task
//! builds its own coupled graph, load state, collector and random generator.
//! Each task runs its full budget and succeeds or fails on its own.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use sandpile_core::{
    AvalancheRecord, CoupledAvalancheRecord, Graph, PoolError, Record, SandpileError,
};
use sandpile_logging::{RunContextGuard, run_span};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collector::{ResultCollector, expected_capacity};
use crate::coupled_engine::{CoupledAvalancheEngine, CoupledConfig};
use crate::coupling::{CoupledGraphBuilder, CouplingPolicy};
use crate::engine::{AvalancheEngine, EngineConfig};
use crate::stats::{CoupledRunStats, RunStats};

/// Worker pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads
    pub threads: usize,
    /// Stack size per worker, rayon's default when unset
    #[serde(default)]
    pub thread_stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

impl PoolConfig {
    /// One worker per available core
    pub fn auto() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            threads,
            thread_stack_size: None,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }
}

/// A single-layer run over one shared graph
#[derive(Debug, Clone)]
pub struct SingleLayerTask {
    pub label: String,
    pub graph: Arc<Graph>,
    pub config: EngineConfig,
}

impl SingleLayerTask {
    pub fn new(label: impl Into<String>, graph: Arc<Graph>, config: EngineConfig) -> Self {
        Self {
            label: label.into(),
            graph,
            config,
        }
    }
}

/// A coupled run for one coupling probability
#[derive(Debug, Clone)]
pub struct CoupledTask {
    pub lower: Arc<Graph>,
    pub upper: Arc<Graph>,
    pub policy: CouplingPolicy,
    pub config: CoupledConfig,
}

impl CoupledTask {
    pub fn new(lower: Arc<Graph>, upper: Arc<Graph>, config: CoupledConfig) -> Self {
        Self {
            lower,
            upper,
            policy: CouplingPolicy::default(),
            config,
        }
    }

    pub fn with_policy(mut self, policy: CouplingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Log label of the task
    pub fn label(&self) -> String {
        format!("p={}", self.config.coupling_probability)
    }
}

/// Records and summary produced by one task
#[derive(Debug, Clone)]
pub struct TaskOutput<R: Record, S> {
    pub label: String,
    pub task_index: usize,
    pub records: Vec<R>,
    pub stats: S,
}

pub type SingleLayerOutput = TaskOutput<AvalancheRecord, RunStats>;
pub type CoupledOutput = TaskOutput<CoupledAvalancheRecord, CoupledRunStats>;

/// Generator for task `index`
///
/// With a base seed the stream depends only on `(base, index)`, so a sweep
/// is reproducible regardless of scheduling. Without one, tasks seed from the OS.
pub fn task_rng(base_seed: Option<u64>, index: usize) -> StdRng {
    match base_seed {
        Some(base) => StdRng::seed_from_u64(base ^ mix(index as u64)),
        None => StdRng::from_os_rng(),
    }
}

/// splitmix64 finalizer
fn mix(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Runs sweep tasks on a dedicated rayon pool
pub struct SweepRunner {
    pool: rayon::ThreadPool,
    threads: usize,
    base_seed: Option<u64>,
}

impl SweepRunner {
    /// Build the worker pool
    pub fn new(config: PoolConfig) -> Result<Self, SandpileError> {
        if config.threads == 0 {
            return Err(PoolError::NoThreads.into());
        }

        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("sandpile-sweep-{}", i));
        if let Some(stack_size) = config.thread_stack_size {
            builder = builder.stack_size(stack_size);
        }
        let pool = builder
            .build()
            .map_err(|e| PoolError::Build(e.to_string()))?;

        info!(threads = config.threads, "Sweep pool ready");
        Ok(Self {
            pool,
            threads: config.threads,
            base_seed: None,
        })
    }

    /// Make the sweep reproducible from a base seed
    pub fn with_base_seed(mut self, seed: Option<u64>) -> Self {
        self.base_seed = seed;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run single-layer tasks, returning one result per task in input order
    pub fn run_single(
        &self,
        tasks: Vec<SingleLayerTask>,
    ) -> Vec<Result<SingleLayerOutput, SandpileError>> {
        let base_seed = self.base_seed;
        info!(tasks = tasks.len(), "Starting single-layer sweep");

        self.pool.install(|| {
            tasks
                .into_par_iter()
                .enumerate()
                .map(|(index, task)| run_single_task(index, task, base_seed))
                .collect()
        })
    }

    /// Run coupled tasks, returning one result per task in input order
    pub fn run_coupled(
        &self,
        tasks: Vec<CoupledTask>,
    ) -> Vec<Result<CoupledOutput, SandpileError>> {
        let base_seed = self.base_seed;
        info!(tasks = tasks.len(), "Starting coupled sweep");

        self.pool.install(|| {
            tasks
                .into_par_iter()
                .enumerate()
                .map(|(index, task)| run_coupled_task(index, task, base_seed))
                .collect()
        })
    }
}

fn run_single_task(
    index: usize,
    task: SingleLayerTask,
    base_seed: Option<u64>,
) -> Result<SingleLayerOutput, SandpileError> {
    let _context = RunContextGuard::for_task(task.label.clone(), index);
    let span = run_span("single");
    let _enter = span.enter();

    let rng = task_rng(base_seed, index);
    let mut engine = AvalancheEngine::new(task.graph.as_ref(), task.config, rng)
        .inspect_err(|e| warn!(error = %e, "Task rejected"))?;

    let mut collector =
        ResultCollector::with_capacity(expected_capacity(task.config.iterations, 0.5));
    engine.run(&mut collector);
    let records = collector.finalize();
    let stats = RunStats::from_records(task.config.iterations, &records);

    info!(
        avalanches = stats.avalanches,
        largest_area = stats.largest_area,
        mean_size = stats.mean_size,
        "Task complete"
    );
    Ok(TaskOutput {
        label: task.label,
        task_index: index,
        records,
        stats,
    })
}

fn run_coupled_task(
    index: usize,
    task: CoupledTask,
    base_seed: Option<u64>,
) -> Result<CoupledOutput, SandpileError> {
    let label = task.label();
    let _context = RunContextGuard::for_task(label.clone(), index);
    let span = run_span("coupled");
    let _enter = span.enter();

    let mut rng = task_rng(base_seed, index);
    let p = task.config.coupling_probability;
    let coupled = CoupledGraphBuilder::new(task.lower.node_count(), p)
        .with_policy(task.policy)
        .build(&task.lower, &task.upper, &mut rng)
        .inspect_err(|e| warn!(error = %e, "Coupling failed"))?;

    let mut engine = CoupledAvalancheEngine::new(&coupled, task.config, rng)
        .inspect_err(|e| warn!(error = %e, "Task rejected"))?;
    let records = engine.run_to_vec();
    let stats = CoupledRunStats::from_records(p, &records);

    info!(
        recorded = stats.avalanches,
        cross_layer = stats.cross_layer,
        coupling_edges = coupled.coupling_edges(),
        "Task complete"
    );
    Ok(TaskOutput {
        label,
        task_index: index,
        records,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use sandpile_core::{ConfigError, GraphBuilder};

    fn runner(threads: usize, seed: u64) -> SweepRunner {
        SweepRunner::new(PoolConfig::auto().with_threads(threads))
            .unwrap()
            .with_base_seed(Some(seed))
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = SweepRunner::new(PoolConfig::auto().with_threads(0))
            .err()
            .unwrap();
        assert!(matches!(err, SandpileError::Pool(PoolError::NoThreads)));
    }

    #[test]
    fn test_task_rng_is_reproducible() {
        let a: Vec<u64> = (0..4).map(|i| task_rng(Some(7), i).random()).collect();
        let b: Vec<u64> = (0..4).map(|i| task_rng(Some(7), i).random()).collect();
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn test_single_sweep_keeps_order_and_shares_graph() {
        let graph = Arc::new(GraphBuilder::new(20).ring());
        let tasks: Vec<_> = (0..6)
            .map(|i| {
                SingleLayerTask::new(
                    format!("ring-{}", i),
                    Arc::clone(&graph),
                    EngineConfig::new(0.05, 2_000),
                )
            })
            .collect();

        let results = runner(3, 11).run_single(tasks);
        assert_eq!(results.len(), 6);
        for (i, result) in results.iter().enumerate() {
            let output = result.as_ref().unwrap();
            assert_eq!(output.task_index, i);
            assert_eq!(output.label, format!("ring-{}", i));
            assert_eq!(output.stats.avalanches, output.records.len() as u64);
        }
        assert_eq!(Arc::strong_count(&graph), 1);
    }

    #[test]
    fn test_seeded_sweep_is_deterministic() {
        let graph = Arc::new(GraphBuilder::new(30).complete());
        let tasks = || {
            vec![
                SingleLayerTask::new("a", Arc::clone(&graph), EngineConfig::new(0.1, 3_000)),
                SingleLayerTask::new("b", Arc::clone(&graph), EngineConfig::new(0.2, 3_000)),
            ]
        };

        let first = runner(2, 42).run_single(tasks());
        let second = runner(1, 42).run_single(tasks());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.as_ref().unwrap().records, b.as_ref().unwrap().records);
        }
    }

    #[test]
    fn test_failing_task_does_not_cancel_others() {
        let graph = Arc::new(GraphBuilder::new(10).ring());
        let tasks = vec![
            SingleLayerTask::new("ok", Arc::clone(&graph), EngineConfig::new(0.1, 500)),
            SingleLayerTask::new("bad", Arc::clone(&graph), EngineConfig::new(2.0, 500)),
            SingleLayerTask::new("ok-too", graph, EngineConfig::new(0.1, 500)),
        ];

        let results = runner(2, 1).run_single(tasks);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SandpileError::Config(ConfigError::InvalidDissipationRate(_)))
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_coupled_sweep() {
        let lower = Arc::new(GraphBuilder::new(40).complete());
        let upper = Arc::new(GraphBuilder::new(40).complete());
        let tasks: Vec<_> = [0.0, 0.5, 1.0]
            .into_iter()
            .map(|p| {
                CoupledTask::new(
                    Arc::clone(&lower),
                    Arc::clone(&upper),
                    CoupledConfig::new(p, EngineConfig::new(0.01, 5_000)),
                )
            })
            .collect();

        let results = runner(3, 5).run_coupled(tasks);
        assert_eq!(results.len(), 3);
        let uncoupled = results[0].as_ref().unwrap();
        assert_eq!(uncoupled.label, "p=0");
        assert_eq!(uncoupled.stats.cross_layer, 0);
        for result in &results {
            let output = result.as_ref().unwrap();
            for record in &output.records {
                assert_eq!(record.p, output.stats.p);
            }
        }
    }

    #[test]
    fn test_coupled_mismatch_is_reported() {
        let task = CoupledTask::new(
            Arc::new(GraphBuilder::new(5).ring()),
            Arc::new(GraphBuilder::new(6).ring()),
            CoupledConfig::new(0.1, EngineConfig::new(0.1, 10)),
        );
        let results = runner(1, 0).run_coupled(vec![task]);
        assert!(matches!(results[0], Err(SandpileError::Coupling(_))));
    }
}
