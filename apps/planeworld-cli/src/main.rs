use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use planeworld_kernel::{MAX_LAYERS, Simulation, SimulationConfig, World, WorldSummary};
use planeworld_plugins::builtin_registry;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "planeworld-cli", about = "CLI tool for planeworld worlds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and built-in plugin types
    Info,
    /// Load a world description, print what it contains, tear it down
    Validate {
        /// World description file
        #[arg(short, long)]
        world: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load a world and step it
    Run {
        /// World description file
        #[arg(short, long)]
        world: PathBuf,
        /// Number of updates to perform
        #[arg(short, long, default_value = "1000")]
        steps: u64,
        /// Simulated seconds per update
        #[arg(long, default_value = "0.005")]
        step_size: f64,
        /// Pace to wall time at this multiple of real time
        #[arg(long)]
        realtime: Option<f64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("planeworld-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("max layers: {MAX_LAYERS}");
            let registry = builtin_registry();
            println!("plugins: {}", registry.types().collect::<Vec<_>>().join(", "));
        }
        Commands::Validate { world, json } => {
            let loaded = World::make_world(&world, builtin_registry())
                .with_context(|| format!("invalid world {}", world.display()))?;
            let summary = loaded.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            let report = loaded.close();
            tracing::debug!(?report, "validation teardown");
        }
        Commands::Run {
            world,
            steps,
            step_size,
            realtime,
        } => {
            anyhow::ensure!(step_size > 0.0, "step size must be positive, got {step_size}");
            let config = SimulationConfig {
                step_size,
                max_steps: steps,
                realtime_factor: realtime,
            };
            let mut sim = Simulation::new(&world, config, builtin_registry())
                .with_context(|| format!("failed to load world {}", world.display()))?;
            let stats = sim.run();
            println!(
                "ran {} steps: sim time {:.3}s, wall time {:?}",
                stats.steps, stats.sim_time, stats.wall_time
            );
            for model in sim.world().summary().models {
                for body in &model.bodies {
                    println!(
                        "  {}/{}.{}: x={:.4} y={:.4} theta={:.4}",
                        model.namespace, model.name, body.name, body.pose.x, body.pose.y, body.pose.theta
                    );
                }
            }
            sim.shutdown();
        }
    }

    Ok(())
}

fn print_summary(summary: &WorldSummary) {
    println!("world: {}", summary.path.display());
    println!("layers: {}", summary.layers.len());
    for layer in &summary.layers {
        println!(
            "  {} (bits {:#06x}, {} segments)",
            layer.names.join("/"),
            layer.category_bits,
            layer.segments
        );
    }
    println!("models: {}", summary.models.len());
    for model in &summary.models {
        println!(
            "  {}/{} from {} ({} bodies, plugins: [{}])",
            model.namespace,
            model.name,
            model.path.display(),
            model.bodies.len(),
            model.plugins.join(", ")
        );
    }
    println!("bodies: {}, fixtures: {}", summary.bodies, summary.fixtures);
}
