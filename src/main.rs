use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ecosphere::{EcosystemGraph, EcosystemView, NodeKind, ViewConfig};

/// Headless runner for orbital token ecosystem layouts.
#[derive(Parser)]
#[command(name = "ecosphere")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate an ecosystem file
    Validate {
        /// Ecosystem file (.json, .yaml or .yml)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Run the view headlessly and write a snapshot
    Simulate {
        /// Ecosystem file (.json, .yaml or .yml)
        #[arg(short, long)]
        input: PathBuf,

        /// View configuration file (.json, .yaml or .yml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of frames to run
        #[arg(short, long, default_value = "600")]
        frames: usize,

        /// Simulated milliseconds between frames
        #[arg(long, default_value = "16.667")]
        frame_ms: f64,

        /// Orbital force strength (overrides the config file)
        #[arg(short, long)]
        strength: Option<f32>,

        /// Disable particle flows
        #[arg(long)]
        no_particles: bool,

        /// Seed for particle offsets (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Snapshot output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a generated sample ecosystem
    Sample {
        /// Root tokens
        #[arg(long, default_value = "1")]
        roots: usize,

        /// Branches per root
        #[arg(short, long, default_value = "4")]
        branches: usize,

        /// Leaves per branch
        #[arg(short, long, default_value = "6")]
        leaves: usize,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_graph(input: &Path) -> anyhow::Result<EcosystemGraph> {
    EcosystemGraph::from_path(input)
        .with_context(|| format!("failed to load ecosystem from {}", input.display()))
}

fn write_output(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

fn validate(input: &Path) -> anyhow::Result<()> {
    let graph = load_graph(input)?;
    println!(
        "'{}' is valid: {} nodes ({} root, {} branch, {} leaf), {} links",
        input.display(),
        graph.nodes.len(),
        graph.count_kind(NodeKind::Root),
        graph.count_kind(NodeKind::Branch),
        graph.count_kind(NodeKind::Leaf),
        graph.links.len()
    );
    Ok(())
}

struct SimulateArgs {
    input: PathBuf,
    config: Option<PathBuf>,
    frames: usize,
    frame_ms: f64,
    strength: Option<f32>,
    no_particles: bool,
    seed: Option<u64>,
    output: Option<PathBuf>,
}

fn simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let graph = load_graph(&args.input)?;

    let mut config = match &args.config {
        Some(path) => ViewConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ViewConfig::default(),
    };
    if let Some(strength) = args.strength {
        config.orbital_strength = strength;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.no_particles {
        config.particles_enabled = false;
    }

    let mut view = EcosystemView::new(&graph, config)?;
    view.mount()?;
    view.run_frames(args.frames, args.frame_ms)?;
    let snapshot = view.snapshot();
    view.unmount();

    info!(
        frames = snapshot.frames,
        fps = snapshot.fps,
        tier = %snapshot.tier,
        "simulation finished"
    );
    let json = serde_json::to_string_pretty(&snapshot)?;
    write_output(args.output.as_deref(), &json)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { input } => validate(&input)?,
        Commands::Simulate {
            input,
            config,
            frames,
            frame_ms,
            strength,
            no_particles,
            seed,
            output,
        } => simulate(SimulateArgs {
            input,
            config,
            frames,
            frame_ms,
            strength,
            no_particles,
            seed,
            output,
        })?,
        Commands::Sample {
            roots,
            branches,
            leaves,
            output,
        } => {
            let graph = EcosystemGraph::sample(roots, branches, leaves);
            let json = serde_json::to_string_pretty(&graph)?;
            write_output(output.as_deref(), &json)?;
        }
    }

    Ok(())
}
