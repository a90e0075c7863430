//! The `reconstruct` and `synth` commands.

use crate::input::{load_config, read_nodes_file, read_packets_file};
use crate::output::{write_file, write_json, write_nodes, write_packets, ReconstructionReport, ScenarioTruth};
use crate::RunnerError;
use clap::Args;
use meshtrace_core::{generate, ReconstructionConfig, Reconstructor, SynthConfig};
use meshtrace_dem::{DirectoryLoader, TileCache};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Arguments for `meshtrace reconstruct`.
#[derive(Debug, Clone, Args)]
pub struct ReconstructArgs {
    /// CSV node list (ID,Name,Lat,Lon).
    #[arg(long)]
    pub nodes: PathBuf,

    /// JSON packet list.
    #[arg(long)]
    pub packets: PathBuf,

    /// YAML configuration; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory of elevation tiles. Terrain is ignored when omitted.
    #[arg(long)]
    pub dem_dir: Option<PathBuf>,

    /// Report destination; stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the configured worker count.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Override the configured refinement iteration cap.
    #[arg(long)]
    pub max_iterations: Option<usize>,
}

/// Loads inputs, runs the reconstruction and writes the JSON report.
pub fn reconstruct(args: &ReconstructArgs) -> Result<ReconstructionReport, RunnerError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ReconstructionConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }

    let mut reconstructor = Reconstructor::new(config)?;

    let nodes = read_nodes_file(&args.nodes)?;
    let packets = read_packets_file(&args.packets)?;
    info!(nodes = nodes.len(), packets = packets.len(), "Inputs loaded");

    let terrain = match &args.dem_dir {
        Some(dir) => {
            let mut loader = DirectoryLoader::new();
            let tiles = loader.add_directory(dir)?;
            info!(dir = %dir.display(), tiles, "Elevation tiles indexed");
            let cache = Arc::new(TileCache::new(loader));
            reconstructor = reconstructor.with_terrain(cache.clone());
            Some(cache)
        }
        None => None,
    };

    let result = reconstructor.run(nodes, &packets)?;

    if let Some(cache) = terrain {
        let stats = cache.stats();
        info!(
            loaded = stats.loaded,
            missing = stats.missing,
            failed = stats.failed,
            hits = stats.hits,
            "Elevation cache"
        );
    }

    let report = ReconstructionReport::new(&result);
    match &args.output {
        Some(path) => write_file(path, |w| write_json(w, &report))?,
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_json(&mut lock, &report)?;
            writeln!(lock).map_err(|e| RunnerError::io("<stdout>", e))?;
        }
    }
    info!(
        decoded = report.totals.decoded,
        failed = report.totals.failed,
        rejected = report.totals.rejected,
        discovered = report.totals.discovered,
        "Reconstruction complete"
    );
    Ok(report)
}

/// Arguments for `meshtrace synth`.
#[derive(Debug, Clone, Args)]
pub struct SynthArgs {
    /// Directory for nodes.csv, packets.json and truth.json.
    #[arg(long)]
    pub out_dir: PathBuf,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Repeaters written to nodes.csv.
    #[arg(long, default_value_t = 60)]
    pub nodes: usize,

    /// Additional repeaters that route packets but are withheld from nodes.csv.
    #[arg(long, default_value_t = 4)]
    pub hidden: usize,

    #[arg(long, default_value_t = 200)]
    pub packets: usize,

    /// Radius of the area repeaters are scattered over.
    #[arg(long, default_value_t = 50.0)]
    pub spread_km: f64,
}

impl SynthArgs {
    fn synth_config(&self) -> SynthConfig {
        SynthConfig {
            seed: self.seed,
            node_count: self.nodes,
            hidden_count: self.hidden,
            packet_count: self.packets,
            spread_km: self.spread_km,
            ..Default::default()
        }
    }
}

/// Generates a synthetic scenario and writes it in the input formats.
pub fn synth(args: &SynthArgs) -> Result<(), RunnerError> {
    let scenario = generate(&args.synth_config(), &ReconstructionConfig::default().link)?;

    std::fs::create_dir_all(&args.out_dir).map_err(|e| RunnerError::io(&args.out_dir, e))?;
    write_file(&args.out_dir.join("nodes.csv"), |w| write_nodes(w, &scenario.known))?;
    write_file(&args.out_dir.join("packets.json"), |w| {
        write_packets(w, &scenario.packets)
    })?;
    write_file(&args.out_dir.join("truth.json"), |w| {
        write_json(w, &ScenarioTruth::new(&scenario))
    })?;

    info!(
        dir = %args.out_dir.display(),
        known = scenario.known.len(),
        hidden = scenario.hidden.len(),
        packets = scenario.packets.len(),
        "Scenario written"
    );
    Ok(())
}
