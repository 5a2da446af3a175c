//! Benchmark correspondence building and field transfer on random point clouds.
//!
//! Example:
//!   RUST_LOG=info cargo run --release --bin bench_transfer -- 200k 50k -k 8 --export report.json.gz

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;
use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use grid_transfer::{
    CorrespondenceOptions, Grid, NeighborStatistics, NodeId, Registry, RoundTripReport,
    TransferSummary,
};

#[derive(Parser)]
#[command(name = "bench_transfer")]
#[command(about = "Time nearest-neighbor field transfer between two random grids")]
struct Cli {
    /// Source node count (supports k/m suffixes)
    #[arg(value_parser = parse_count, default_value = "100k")]
    source: usize,

    /// Target node count (supports k/m suffixes)
    #[arg(value_parser = parse_count, default_value = "40k")]
    target: usize,

    /// Neighbors per target node
    #[arg(short, long, default_value_t = grid_transfer::constants::DEFAULT_NEIGHBORS)]
    k: usize,

    /// Drop neighbors farther than this
    #[arg(long)]
    max_distance: Option<f64>,

    /// Number of query chunks
    #[arg(long, default_value_t = grid_transfer::constants::DEFAULT_QUERY_CHUNKS)]
    chunks: usize,

    /// Random seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Skip the round-trip validation
    #[arg(long)]
    no_round_trip: bool,

    /// Write the reports as JSON (gzipped if the path ends in .gz)
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

fn parse_count(s: &str) -> Result<usize, String> {
    let s = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('m') {
        (n, 1_000_000)
    } else if let Some(n) = s.strip_suffix('k') {
        (n, 1_000)
    } else {
        (s.as_str(), 1)
    };

    num_str
        .parse::<f64>()
        .map(|n| (n * multiplier as f64) as usize)
        .map_err(|e| format!("Invalid number '{}': {}", s, e))
}

/// Unit cube point cloud carrying a smooth test field.
fn random_grid<R: Rng>(n: usize, rng: &mut R, field: Option<&str>) -> grid_transfer::Result<Grid> {
    let mut grid = Grid::with_capacity(n);
    for id in 0..n as NodeId {
        grid.insert_node(id, DVec3::new(rng.gen(), rng.gen(), rng.gen()))?;
    }
    if let Some(name) = field {
        let values: Vec<(NodeId, f64)> = grid
            .node_ids()
            .iter()
            .zip(grid.coordinates())
            .map(|(&id, p)| (id, (6.0 * p.x).sin() + p.y * p.z + 2.0))
            .collect();
        grid.set_field(name, values)?;
    }
    Ok(grid)
}

#[derive(Serialize)]
struct BenchExport {
    source_nodes: usize,
    target_nodes: usize,
    neighbors: usize,
    seed: u64,
    correspondence_ms: f64,
    transfer_ms: f64,
    statistics: NeighborStatistics,
    transfer: TransferSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    round_trip: Option<RoundTripReport>,
}

fn export(data: &BenchExport, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let is_gzip = path.extension().map(|ext| ext == "gz").unwrap_or(false);
    if is_gzip {
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer_pretty(encoder, data)?;
    } else {
        serde_json::to_writer_pretty(BufWriter::new(file), data)?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let field = "value";

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    println!("Generating {} source / {} target nodes...", cli.source, cli.target);
    let mut registry = Registry::new();
    let setup = random_grid(cli.source, &mut rng, Some(field))
        .and_then(|grid| registry.add_grid("source", grid))
        .and_then(|_| random_grid(cli.target, &mut rng, None))
        .and_then(|grid| registry.add_grid("target", grid));
    if let Err(e) = setup {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }

    let mut options = CorrespondenceOptions::default()
        .with_neighbors(cli.k)
        .with_chunks(cli.chunks);
    if let Some(d) = cli.max_distance {
        options = options.with_max_distance(d);
    }

    let mut run = || -> grid_transfer::Result<BenchExport> {
        let t0 = Instant::now();
        registry.build_correspondence("source", "target", &options)?;
        let correspondence_ms = t0.elapsed().as_secs_f64() * 1000.0;
        println!("  Correspondence: {:.1}ms", correspondence_ms);

        let t0 = Instant::now();
        let transfer = registry.transfer("source", field, "target")?;
        let transfer_ms = t0.elapsed().as_secs_f64() * 1000.0;
        println!(
            "  Transfer: {:.1}ms ({} exact, {} weighted, {} lonely)",
            transfer_ms, transfer.exact_matches, transfer.weighted, transfer.lonely
        );

        let statistics = registry.statistics("source", "target")?;
        if let Some(d) = &statistics.distances {
            println!(
                "  Distances: mean {:.5}, std {:.5}, min {:.5}, max {:.5}",
                d.mean, d.std_dev, d.min, d.max
            );
        }

        let round_trip = if cli.no_round_trip {
            None
        } else {
            registry.build_correspondence("target", "source", &options)?;
            let report = registry.validate_round_trip("source", field, "target");
            if let Some(r) = &report {
                if let Some(d) = &r.abs_difference {
                    println!(
                        "  Round trip: mean |diff| {:.5}, std {:.5}, NaN {}",
                        d.mean, d.std_dev, r.missing
                    );
                }
            }
            report
        };

        Ok(BenchExport {
            source_nodes: cli.source,
            target_nodes: cli.target,
            neighbors: cli.k,
            seed: cli.seed,
            correspondence_ms,
            transfer_ms,
            statistics,
            transfer,
            round_trip,
        })
    };

    let data = match run() {
        Ok(data) => data,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &cli.export {
        print!("Exporting to {}... ", path.display());
        match export(&data, path) {
            Ok(()) => println!("done"),
            Err(e) => {
                println!("failed");
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
