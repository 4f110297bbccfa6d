//! Pre-defined avalanche scenarios
//!
//! Small, fully reproducible walkthroughs printed step by step. Each one
//! returns what it observed so the tests and the CLI can check it.

use rand::SeedableRng;
use rand::rngs::StdRng;
use sandpile_core::{
    AvalancheRecord, Graph, GraphBuilder, NodeId, NodeSelector, SandpileResult, ScriptedSelector,
};
use tracing::info;

use crate::coupled_engine::{CoupledAvalancheEngine, CoupledConfig};
use crate::coupling::CoupledGraphBuilder;
use crate::engine::{AvalancheEngine, EngineConfig};
use crate::stats::{CoupledRunStats, RunStats};

/// What a deterministic walkthrough produced
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub records: Vec<AvalancheRecord>,
    pub final_loads: Vec<u32>,
}

/// Grains on node 0 of a 4-cycle with no dissipation
///
/// ```text
/// 0 - 1
/// |   |
/// 3 - 2      every node has threshold 2
///
/// grain 1: [1,0,0,0]
/// grain 2: [2,0,0,0]
/// grain 3: [3,0,0,0] -> node 0 topples -> [0,1,0,1]   S=1 T=1 G=2 A=1
/// ```
pub fn run_cycle_scenario() -> SandpileResult<ScenarioReport> {
    info!("=== Running Cycle Scenario ===");

    let graph = GraphBuilder::new(4).ring();
    println!("{}", graph.visualize());

    let mut engine =
        AvalancheEngine::new(&graph, EngineConfig::new(0.0, 3), StdRng::seed_from_u64(0))?
            .with_selector(ScriptedSelector::fixed(0));

    let mut records = Vec::new();
    for grain in 1..=3 {
        let record = engine.step();
        println!(
            "  grain {} on node 0: loads {:?}",
            grain,
            engine.load_state().loads()
        );
        if let Some(record) = record {
            println!(
                "  avalanche: S={} T={} G={} A={}",
                record.size, record.duration, record.propagated, record.area
            );
            records.push(record);
        }
    }

    Ok(ScenarioReport {
        records,
        final_loads: engine.load_state().loads().to_vec(),
    })
}

/// A line of `nodes` nodes filled to threshold, then tipped from one end
///
/// Every node topples exactly once, in order, and the cascade runs one round
/// per hop.
pub fn run_line_chain_scenario(nodes: usize) -> SandpileResult<ScenarioReport> {
    info!(nodes, "=== Running Line Chain Scenario ===");

    let graph = GraphBuilder::new(nodes).line();
    let mut engine =
        AvalancheEngine::new(&graph, EngineConfig::new(0.0, 1), StdRng::seed_from_u64(0))?;

    println!("\n--- Filling every node to its threshold ---");
    for node in graph.nodes() {
        fill_to_threshold(&mut engine, node);
    }
    println!("  loads {:?}", engine.load_state().loads());

    println!("\n--- One more grain on node 0 ---");
    let records: Vec<AvalancheRecord> = engine.perturb(0).into_iter().collect();
    for record in &records {
        println!(
            "  avalanche at iteration {}: S={} T={} G={} A={}",
            record.iteration, record.size, record.duration, record.propagated, record.area
        );
    }
    println!("  loads {:?}", engine.load_state().loads());

    Ok(ScenarioReport {
        records,
        final_loads: engine.load_state().loads().to_vec(),
    })
}

fn fill_to_threshold<S: NodeSelector>(
    engine: &mut AvalancheEngine<'_, Graph, StdRng, S>,
    node: NodeId,
) {
    let critical = engine.load_state().critical_load(node);
    for _ in 0..critical {
        engine.perturb(node);
    }
}

/// The same complete graph driven with no dissipation and with full dissipation
///
/// With `f = 1` no grain ever reaches a neighbor, so every avalanche is a
/// single topple.
pub fn run_dissipation_scenario(
    nodes: usize,
    iterations: u64,
    seed: u64,
) -> SandpileResult<(RunStats, RunStats)> {
    info!(nodes, iterations, "=== Running Dissipation Scenario ===");

    let graph = GraphBuilder::new(nodes).complete();
    let mut outcomes = Vec::with_capacity(2);

    for f in [0.0, 1.0] {
        let config = EngineConfig::new(f, iterations);
        let records =
            AvalancheEngine::new(&graph, config, StdRng::seed_from_u64(seed))?.run_to_vec();
        let stats = RunStats::from_records(iterations, &records);

        println!("\n--- f = {} ---", f);
        println!("  Avalanches: {}", stats.avalanches);
        println!("  Largest area: {}", stats.largest_area);
        println!("  Longest duration: {}", stats.longest_duration);
        println!("  Mean size: {:.2}", stats.mean_size);
        outcomes.push(stats);
    }

    let full = outcomes.pop().unwrap_or_default();
    let none = outcomes.pop().unwrap_or_default();
    Ok((none, full))
}

/// Two random 3-regular layers coupled at increasing probability
pub fn run_coupling_scenario(
    layer_size: usize,
    iterations: u64,
    seed: u64,
) -> SandpileResult<Vec<CoupledRunStats>> {
    info!(layer_size, iterations, "=== Running Coupling Scenario ===");

    let mut rng = StdRng::seed_from_u64(seed);
    let lower = GraphBuilder::new(layer_size).random_regular(3, &mut rng)?;
    let upper = GraphBuilder::new(layer_size).random_regular(3, &mut rng)?;

    let mut summaries = Vec::new();
    for p in [0.0, 0.1, 0.5] {
        let coupled = CoupledGraphBuilder::new(layer_size, p).build(&lower, &upper, &mut rng)?;
        let config = CoupledConfig::new(p, EngineConfig::new(0.01, iterations));
        let records =
            CoupledAvalancheEngine::new(&coupled, config, StdRng::seed_from_u64(seed))?
                .run_to_vec();
        let stats = CoupledRunStats::from_records(p, &records);

        println!("\n--- p = {} ({} inter-layer edges) ---", p, coupled.coupling_edges());
        println!("  Recorded avalanches: {}", stats.avalanches);
        println!(
            "  Started in layer 0 / 1: {} / {}",
            stats.started_in[0], stats.started_in[1]
        );
        println!(
            "  Reached both layers: {} ({:.1}%)",
            stats.cross_layer,
            stats.cross_layer_fraction() * 100.0
        );
        summaries.push(stats);
    }

    Ok(summaries)
}
