//! Sandpile - avalanche simulation driver
//!
//! Runs single-layer and coupled avalanche sweeps and writes their records as
//! JSON lines. Logs go to stderr (and optionally a file) so stdout carries
//! only records.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{info, warn};

use sandpile_logging::{ConsoleConfig, LogConfig, SandpileSubscriberBuilder};
use sandpile_simulation::{
    CoupledConfig, CoupledTask, CouplingPolicy, EngineConfig, NetworkSpec, SingleLayerTask,
    SweepConfig, SweepRunner, iterations_from_f64, scenarios, size_distribution,
};

#[derive(Parser)]
#[command(
    name = "sandpile",
    about = "Sandpile avalanche simulation on single and coupled networks",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Human-readable console logs instead of JSONL
    #[arg(long, global = true)]
    pretty: bool,

    /// Write JSONL logs to this directory instead of the console
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum NetworkKind {
    Ring,
    Line,
    Star,
    Complete,
    /// Erdős–Rényi, see --edge-prob
    Er,
    /// Random regular, see --degree
    Rr,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Shuffled Bernoulli stubs paired positionally
    Stub,
    /// Random layer-1 partner per selected layer-0 node
    Random,
}

impl From<PolicyArg> for CouplingPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Stub => CouplingPolicy::StubPairing,
            PolicyArg::Random => CouplingPolicy::RandomPartner,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioKind {
    /// Three grains on a 4-cycle
    Cycle,
    /// A line at threshold tipped from one end
    Line,
    /// f = 0 against f = 1 on a complete graph
    Dissipation,
    /// Two random regular layers at increasing coupling
    Coupling,
}

#[derive(clap::Args)]
struct NetworkArgs {
    /// Network family
    #[arg(short, long, value_enum)]
    network: Option<NetworkKind>,

    /// Edge probability for --network er
    #[arg(long, default_value = "0.002")]
    edge_prob: f64,

    /// Degree for --network rr
    #[arg(long, default_value = "3")]
    degree: usize,
}

impl NetworkArgs {
    fn spec(&self) -> Option<NetworkSpec> {
        self.network.map(|kind| match kind {
            NetworkKind::Ring => NetworkSpec::Ring,
            NetworkKind::Line => NetworkSpec::Line,
            NetworkKind::Star => NetworkSpec::Star,
            NetworkKind::Complete => NetworkSpec::Complete,
            NetworkKind::Er => NetworkSpec::ErdosRenyi {
                edge_probability: self.edge_prob,
            },
            NetworkKind::Rr => NetworkSpec::RandomRegular {
                degree: self.degree,
            },
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Single-layer runs, one per network
    Single {
        /// JSON sweep configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        network: NetworkArgs,

        /// Nodes per network
        #[arg(long)]
        nodes: Option<usize>,

        /// Dissipation rate f (default 1/N)
        #[arg(short = 'f', long)]
        dissipation: Option<f64>,

        /// Iterations, e.g. 1e6
        #[arg(short, long)]
        iterations: Option<f64>,

        /// Base seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads
        #[arg(long)]
        threads: Option<usize>,

        /// Write one <label>.jsonl per network here instead of stdout
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Coupled two-layer runs, one per coupling probability
    Coupled {
        /// JSON sweep configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        network: NetworkArgs,

        /// Nodes per layer
        #[arg(long)]
        layer_size: Option<usize>,

        /// Coupling probabilities (default 0.01..0.1 and 0.11..0.5)
        #[arg(short, long, value_delimiter = ',')]
        p: Option<Vec<f64>>,

        /// How inter-layer edges are drawn
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Dissipation rate f
        #[arg(short = 'f', long)]
        dissipation: Option<f64>,

        /// Iterations per coupling probability, e.g. 2e6
        #[arg(short, long)]
        iterations: Option<f64>,

        /// Record only avalanches with more topples than this in some layer
        #[arg(long)]
        min_layer_topples: Option<u64>,

        /// Base seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads
        #[arg(long)]
        threads: Option<usize>,

        /// Write records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create and summarize a fixture network
    Topology {
        #[command(flatten)]
        network: NetworkArgs,

        /// Number of nodes
        #[arg(long, default_value = "8")]
        nodes: usize,

        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Run a small reproducible walkthrough
    Scenario {
        #[arg(value_enum)]
        kind: ScenarioKind,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = match cli.log_dir {
        Some(directory) => LogConfig::batch(directory),
        None => LogConfig::default(),
    };
    if cli.pretty {
        log_config.console = ConsoleConfig::pretty();
    }
    let logging = SandpileSubscriberBuilder::new()
        .with_config(log_config)
        .with_level(if cli.verbose { "debug" } else { "info" });
    let _log_guard = logging.init()?;

    match cli.command {
        Commands::Single {
            config,
            network,
            nodes,
            dissipation,
            iterations,
            seed,
            threads,
            output_dir,
        } => {
            let mut sweep = load_config(config.as_deref())?;
            if let Some(spec) = network.spec() {
                sweep.single.networks = vec![spec];
            }
            if let Some(nodes) = nodes {
                sweep.single.nodes = nodes;
            }
            if dissipation.is_some() {
                sweep.single.dissipation_rate = dissipation;
            }
            if let Some(iterations) = iterations {
                sweep.single.iterations = iterations;
            }
            apply_common(&mut sweep, seed, threads);
            run_single(&sweep, output_dir.as_deref())?;
        }
        Commands::Coupled {
            config,
            network,
            layer_size,
            p,
            policy,
            dissipation,
            iterations,
            min_layer_topples,
            seed,
            threads,
            output,
        } => {
            let mut sweep = load_config(config.as_deref())?;
            if let Some(spec) = network.spec() {
                sweep.coupled.layer_network = spec;
            }
            if let Some(layer_size) = layer_size {
                sweep.coupled.layer_size = layer_size;
            }
            if let Some(p) = p {
                sweep.coupled.p_values = p;
            }
            if let Some(policy) = policy {
                sweep.coupled.policy = policy.into();
            }
            if let Some(dissipation) = dissipation {
                sweep.coupled.dissipation_rate = dissipation;
            }
            if let Some(iterations) = iterations {
                sweep.coupled.iterations = iterations;
            }
            if let Some(min_layer_topples) = min_layer_topples {
                sweep.coupled.min_layer_topples = min_layer_topples;
            }
            apply_common(&mut sweep, seed, threads);
            run_coupled(&sweep, output.as_deref())?;
        }
        Commands::Topology {
            network,
            nodes,
            seed,
        } => {
            let spec = network.spec().unwrap_or(NetworkSpec::Ring);
            let graph = spec.build(nodes, &mut StdRng::seed_from_u64(seed))?;
            println!("{}", graph.visualize());
        }
        Commands::Scenario { kind } => match kind {
            ScenarioKind::Cycle => {
                scenarios::run_cycle_scenario()?;
            }
            ScenarioKind::Line => {
                scenarios::run_line_chain_scenario(6)?;
            }
            ScenarioKind::Dissipation => {
                scenarios::run_dissipation_scenario(16, 100_000, 1)?;
            }
            ScenarioKind::Coupling => {
                scenarios::run_coupling_scenario(500, 200_000, 1)?;
            }
        },
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SweepConfig> {
    match path {
        Some(path) => SweepConfig::from_file(path),
        None => Ok(SweepConfig::default()),
    }
}

fn apply_common(sweep: &mut SweepConfig, seed: Option<u64>, threads: Option<usize>) {
    if seed.is_some() {
        sweep.seed = seed;
    }
    if let Some(threads) = threads {
        sweep.pool.threads = threads;
    }
}

/// Generator for driver-side graph construction
fn graph_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn run_single(sweep: &SweepConfig, output_dir: Option<&Path>) -> anyhow::Result<()> {
    sweep.validate_single()?;
    let single = &sweep.single;
    let config = EngineConfig::new(
        single.effective_dissipation_rate(),
        iterations_from_f64(single.iterations)?,
    );

    let mut rng = graph_rng(sweep.seed);
    let mut tasks = Vec::with_capacity(single.networks.len());
    for spec in &single.networks {
        let graph = spec
            .build(single.nodes, &mut rng)
            .with_context(|| format!("Failed to build {} network", spec.label()))?;
        info!(
            label = %spec.label(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built network"
        );
        tasks.push(SingleLayerTask::new(spec.label(), Arc::new(graph), config));
    }

    let runner = SweepRunner::new(sweep.pool)?.with_base_seed(sweep.seed);
    let results = runner.run_single(tasks);

    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)?;
    }
    let mut stdout = io::stdout().lock();
    let mut failures = 0;
    for result in results {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Task failed");
                failures += 1;
                continue;
            }
        };

        let distinct_areas = size_distribution(&output.records).len();
        info!(
            label = %output.label,
            avalanches = output.stats.avalanches,
            largest_area = output.stats.largest_area,
            longest_duration = output.stats.longest_duration,
            mean_size = output.stats.mean_size,
            distinct_areas,
            "Run summary"
        );

        match output_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.jsonl", output.label));
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                write_jsonl(BufWriter::new(file), &output.records)?;
            }
            None => write_jsonl(&mut stdout, &output.records)?,
        }
    }

    anyhow::ensure!(failures == 0, "{} task(s) failed", failures);
    Ok(())
}

fn run_coupled(sweep: &SweepConfig, output: Option<&Path>) -> anyhow::Result<()> {
    sweep.validate_coupled()?;
    let coupled = &sweep.coupled;
    let engine = EngineConfig::new(
        coupled.dissipation_rate,
        iterations_from_f64(coupled.iterations)?,
    );

    let mut rng = graph_rng(sweep.seed);
    let lower = Arc::new(coupled.layer_network.build(coupled.layer_size, &mut rng)?);
    let upper = Arc::new(coupled.layer_network.build(coupled.layer_size, &mut rng)?);

    let tasks: Vec<CoupledTask> = coupled
        .p_values
        .iter()
        .map(|&p| {
            let config = CoupledConfig::new(p, engine)
                .with_min_layer_topples(coupled.min_layer_topples);
            CoupledTask::new(Arc::clone(&lower), Arc::clone(&upper), config)
                .with_policy(coupled.policy)
        })
        .collect();

    let runner = SweepRunner::new(sweep.pool)?.with_base_seed(sweep.seed);
    let results = runner.run_coupled(tasks);

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let mut failures = 0;
    for result in results {
        match result {
            Ok(output) => {
                info!(
                    p = output.stats.p,
                    recorded = output.stats.avalanches,
                    started_lower = output.stats.started_in[0],
                    started_upper = output.stats.started_in[1],
                    cross_layer = output.stats.cross_layer,
                    "Run summary"
                );
                write_jsonl(&mut writer, &output.records)?;
            }
            Err(e) => {
                warn!(error = %e, "Task failed");
                failures += 1;
            }
        }
    }

    anyhow::ensure!(failures == 0, "{} task(s) failed", failures);
    Ok(())
}

/// One JSON object per line, columns in record order
fn write_jsonl<W: Write, R: Serialize>(mut writer: W, records: &[R]) -> anyhow::Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
