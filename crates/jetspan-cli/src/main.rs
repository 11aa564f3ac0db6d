// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jetspan_core::analysis;
use jetspan_core::config::resolution;
use jetspan_core::export::artifact::BaseArtifact;
use jetspan_core::graph::load_leg_durations;
use jetspan_core::routes::RouteOverlap;
use jetspan_core::{
    AirportDirectory, AssignmentEngine, CellAssignment, Diagnostics, FlightGraph, GroundTable,
    OriginSet, Pipeline, PrecomputeConfig, RouteDirectory, Router, SpatialIndex,
};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding airports.json, routes.json, origins.json and ground tables
    #[arg(short, long, env = "JETSPAN_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Precompute config (JSON); defaults apply when omitted
    #[arg(short, long, env = "JETSPAN_CONFIG")]
    config: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full precompute for one or more origins
    Precompute {
        /// Origin ids; all configured origins when empty
        origins: Vec<String>,
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
    /// Summarise the airport set and flight graph
    Airports {
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Assign a single point and explain the result
    Query {
        origin: String,
        lat: f64,
        lon: f64,
        #[arg(long, default_value_t = 6)]
        res: u8,
        /// Scan every reachable airport instead of the spatial index
        #[arg(long)]
        exhaustive: bool,
    },
    /// Compare the route directory with a reference route file
    CompareRoutes { reference: PathBuf },
    /// List travel-time jumps between neighbouring cells of an exported base artifact
    Discontinuities {
        origin: String,
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
        #[arg(long, default_value_t = 4)]
        res: u8,
        #[arg(long, default_value_t = 120)]
        threshold: u32,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
}

/// Everything loaded from the data directory.
struct Inputs {
    config: PrecomputeConfig,
    airports: AirportDirectory,
    routes: RouteDirectory,
    graph: FlightGraph,
    origins: OriginSet,
}

impl Inputs {
    fn load(data_dir: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => PrecomputeConfig::load(path)?,
            None => PrecomputeConfig::default(),
        };
        config.validate().context("Invalid precompute config")?;

        let airports = AirportDirectory::load(data_dir.join("airports.json"))?;
        let routes = RouteDirectory::load(data_dir.join("routes.json"))?;
        let origins = OriginSet::load(data_dir.join("origins.json"))?;

        let legs_path = data_dir.join("leg-durations.json");
        let graph = if legs_path.exists() {
            let legs = load_leg_durations(&legs_path)?;
            log::info!("Using measured leg durations — legs={}", legs.len());
            FlightGraph::build_with_durations(&airports, &routes, &config.graph, &legs)
        } else {
            FlightGraph::build(&airports, &routes, &config.graph)
        };

        Ok(Self {
            config,
            airports,
            routes,
            graph,
            origins,
        })
    }

    fn ground(&self, data_dir: &Path, origin: &str) -> Result<GroundTable> {
        let airport_table = data_dir.join("ground-airports.json");
        let origin_table = data_dir.join(format!("ground-{}.json", origin));
        let reference = resolution(self.config.assign.ground_reference_resolution)?;
        let table = GroundTable::load(
            Some(airport_table.as_path()).filter(|p| p.exists()),
            Some(origin_table.as_path()).filter(|p| p.exists()),
            &self.airports,
            reference,
        )?;
        Ok(table)
    }

    fn diagnostics(&self, ground: &GroundTable) -> Diagnostics {
        let mut diagnostics = self.airports.diagnostics.clone();
        diagnostics.merge(&self.graph.diagnostics);
        diagnostics.merge(&ground.diagnostics);
        diagnostics
    }
}

fn init_logging(verbose: u8) {
    let level = match (verbose, std::env::var("JETSPAN_LOG").ok().as_deref()) {
        (0, Some("debug")) => LevelFilter::Debug,
        (0, Some("warn")) => LevelFilter::Warn,
        (0, _) => LevelFilter::Info,
        (1, _) => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Precompute { origins, out } => {
            let inputs = Inputs::load(&cli.data_dir, cli.config.as_deref())?;
            let ids: Vec<String> = if origins.is_empty() {
                inputs.origins.ids().map(str::to_string).collect()
            } else {
                origins.clone()
            };
            if ids.is_empty() {
                anyhow::bail!("No origins configured in {:?}", cli.data_dir.join("origins.json"));
            }

            for id in &ids {
                let origin = inputs.origins.get(id)?;
                let ground = inputs.ground(&cli.data_dir, id)?;
                let diagnostics = inputs.diagnostics(&ground);
                let summary = Pipeline::new(&inputs.config, &inputs.airports, &inputs.graph, &ground)
                    .with_diagnostics(diagnostics.clone())
                    .run(origin, out)
                    .with_context(|| format!("Precompute failed for origin '{}'", id))?;

                println!(
                    "{}: {} airports reachable, {} chunk files ({} bytes), base {} bytes",
                    id,
                    summary.reachable_airports,
                    summary.chunk_files,
                    summary.chunk_bytes,
                    summary.base_bytes
                );
                for (res, cells) in &summary.cells {
                    println!(
                        "  r{}: {} cells, {} skipped",
                        res,
                        cells,
                        summary.skipped.get(res).copied().unwrap_or_default()
                    );
                }
                diagnostics.log_summary();
            }
        }
        Commands::Airports { top } => {
            let inputs = Inputs::load(&cli.data_dir, cli.config.as_deref())?;
            let stats = inputs.graph.stats();
            println!(
                "{} airports ({} connected), {} directed edges from {} route pairs",
                stats.airports,
                stats.connected_airports,
                stats.edges,
                inputs.routes.pair_count()
            );
            for (country, count) in inputs.airports.country_counts().iter().take(*top) {
                println!("  {:<3} {}", country, count);
            }
            let mut diagnostics = inputs.airports.diagnostics.clone();
            diagnostics.merge(&inputs.graph.diagnostics);
            diagnostics.log_summary();
        }
        Commands::Query {
            origin,
            lat,
            lon,
            res,
            exhaustive,
        } => {
            let inputs = Inputs::load(&cli.data_dir, cli.config.as_deref())?;
            let origin = inputs.origins.get(origin)?;
            origin.validate(&inputs.airports)?;
            let ground = inputs.ground(&cli.data_dir, &origin.id)?;
            let config = &inputs.config;

            let best = Router::new(&inputs.graph, config.router.clone()).route(origin);
            let index = SpatialIndex::build(&best, &inputs.graph, &config.spatial)?;
            let engine = AssignmentEngine::new(
                origin,
                &inputs.graph,
                &best,
                &index,
                &ground,
                &config.overheads,
                config.assign.clone(),
            )?;

            let res_h3 = resolution(*res)?;
            let cell = h3o::LatLng::new(*lat, *lon)
                .with_context(|| format!("Invalid coordinates ({}, {})", lat, lon))?
                .to_cell(res_h3);
            let assignment = if *exhaustive {
                engine.assign_exhaustive(cell)
            } else {
                engine.assign_point(*lat, *lon, res_h3)
            };

            println!("cell {} (r{})", cell, res);
            match assignment {
                Some(CellAssignment::Flight {
                    total,
                    departure,
                    arrival,
                    stops,
                    ground_measured,
                }) => {
                    println!(
                        "  fly {} -> {} ({} stops): {} min, ground leg {}",
                        departure,
                        arrival,
                        stops,
                        total,
                        if ground_measured { "measured" } else { "estimated" }
                    );
                    if let Some(record) = best.get(&arrival) {
                        println!("  path {}", record.path.join(" -> "));
                    }
                }
                Some(CellAssignment::Drive { total, measured }) => {
                    println!(
                        "  drive: {} min ({})",
                        total,
                        if measured { "measured" } else { "estimated" }
                    );
                }
                None => println!("  unreachable"),
            }
        }
        Commands::CompareRoutes { reference } => {
            let primary = RouteDirectory::load(cli.data_dir.join("routes.json"))?;
            let reference = RouteDirectory::load(reference)?;
            let overlap = RouteOverlap::compare(&primary, &reference);
            println!(
                "both={} primary_only={} reference_only={} overlap={:.1}%",
                overlap.both, overlap.primary_only, overlap.reference_only, overlap.overlap_pct
            );
            for (from, to) in &overlap.reference_only_sample {
                println!("  reference only: {} -> {}", from, to);
            }
        }
        Commands::Discontinuities {
            origin,
            out,
            res,
            threshold,
            top,
        } => {
            let path = Pipeline::base_path(out, origin);
            let base = BaseArtifact::read(&path)?;
            let cells = base.cells(*res);
            if cells.is_empty() {
                anyhow::bail!("Resolution {} is not in the base artifact {:?}", res, path);
            }
            let found = analysis::find_discontinuities(&cells, *threshold);
            println!(
                "{} discontinuities >= {} min across {} cells at r{}",
                found.len(),
                threshold,
                cells.len(),
                res
            );
            for (kind, count) in analysis::count_by_kind(&found) {
                println!("  {:?}: {}", kind, count);
            }
            for d in found.iter().take(*top) {
                println!(
                    "  {} | {} : {} vs {} (diff {}) {:?} at ({:.2}, {:.2})",
                    d.cell,
                    d.neighbor,
                    d.cell_total,
                    d.neighbor_total,
                    d.difference,
                    d.kind,
                    d.location[0],
                    d.location[1]
                );
            }
        }
    }

    Ok(())
}
