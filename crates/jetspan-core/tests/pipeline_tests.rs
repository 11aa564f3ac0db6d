use jetspan_core::analysis;
use jetspan_core::config::ConfigError;
use jetspan_core::export::artifact::{read_chunk, BaseArtifact, Manifest};
use jetspan_core::route_table::RouteTable;
use jetspan_core::{
    AirportDirectory, FlightGraph, GroundTable, OriginSet, Pipeline, PipelineError,
    PrecomputeConfig, RouteDirectory,
};
use h3o::Resolution;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const AIRPORTS: &str = r#"{
    "BRS": {"name": "Bristol", "lat": 51.3827, "lng": -2.7191, "country": "GB", "type": "medium"},
    "LHR": {"name": "Heathrow", "lat": 51.4700, "lng": -0.4543, "country": "GB", "type": "large"},
    "CDG": {"name": "Paris CDG", "lat": 49.0097, "lng": 2.5479, "country": "FR", "type": "large"},
    "MAD": {"name": "Madrid", "lat": 40.4719, "lng": -3.5626, "country": "ES", "type": "large"},
    "FCO": {"name": "Rome", "lat": 41.8003, "lng": 12.2389, "country": "IT", "type": "large"},
    "JFK": {"name": "New York JFK", "lat": 40.6413, "lng": -73.7781, "country": "US", "type": "large"},
    "BOS": {"name": "Boston", "lat": 42.3656, "lng": -71.0096, "country": "US", "type": "large"}
}"#;

const ROUTES: &str = r#"{
    "BRS": ["CDG", "MAD"],
    "LHR": ["CDG", "MAD", "FCO", "JFK", "BOS"],
    "CDG": ["FCO", "JFK", "NOPE"],
    "JFK": ["BOS"]
}"#;

const ORIGINS: &str = r#"{
    "bristol": {
        "name": "Bristol",
        "lat": 51.4545,
        "lng": -2.5879,
        "country": "GB",
        "airports": [
            {"code": "BRS", "ground_minutes": 25},
            {"code": "LHR", "ground_minutes": 110}
        ]
    },
    "stranded": {"name": "Stranded", "lat": 10.0, "lng": 10.0, "country": "XX", "airports": []}
}"#;

struct Fixture {
    airports: AirportDirectory,
    graph: FlightGraph,
    origins: OriginSet,
    ground: GroundTable,
}

fn fixture() -> Fixture {
    // Surface pipeline warnings in test output; a second init is a no-op.
    let _ = simplelog::SimpleLogger::init(simplelog::LevelFilter::Warn, simplelog::Config::default());
    let airports = AirportDirectory::from_json_str(AIRPORTS).unwrap();
    let routes = RouteDirectory::from_json_str(ROUTES).unwrap();
    let config = PrecomputeConfig::default();
    let graph = FlightGraph::build(&airports, &routes, &config.graph);
    let origins = OriginSet::from_json_str(ORIGINS).unwrap();
    let ground = GroundTable::from_json_str("{}", None, &airports, Resolution::Six).unwrap();
    Fixture {
        airports,
        graph,
        origins,
        ground,
    }
}

/// Small tiers so a run touches the whole globe quickly.
fn small_config() -> PrecomputeConfig {
    let mut config = PrecomputeConfig::default();
    config.export.base_resolutions = vec![0, 1, 2];
    config.export.chunked_resolutions = vec![3];
    config.export.chunk_parent_resolution = 1;
    // Wide enough that every cell around the origin is assigned.
    config.assign.drive_radius_km = 800.0;
    config
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(next) = stack.pop() {
        for entry in fs::read_dir(&next).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                found.push(path.strip_prefix(dir).unwrap().to_path_buf());
            }
        }
    }
    found.sort();
    found
}

#[test]
fn test_pipeline_writes_all_artifacts() {
    let f = fixture();
    let config = small_config();
    let out = tempdir().unwrap();
    let origin = f.origins.get("bristol").unwrap();

    let summary = Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(origin, out.path())
        .unwrap();

    assert!(summary.reachable_airports >= 5);
    assert!(summary.chunk_files > 0);
    assert!(out.path().join("bristol.json").exists());
    assert!(out.path().join("bristol-routes.json").exists());
    assert!(!Pipeline::staging_path(out.path(), "bristol").exists());

    let base = BaseArtifact::read(out.path().join("bristol.json")).unwrap();
    assert_eq!(base.origin, "bristol");
    assert_eq!(base.coords, [-2.5879, 51.4545]);
    assert!(base.resolutions.contains_key("0"));
    assert!(!base.cells(2).is_empty());

    let routes: RouteTable =
        serde_json::from_slice(&fs::read(out.path().join("bristol-routes.json")).unwrap()).unwrap();
    let jfk = routes.get("JFK").unwrap();
    assert_eq!(jfk.path, vec!["LHR", "JFK"]);
    assert_eq!(jfk.legs.len(), 1);

    let manifest: Manifest =
        serde_json::from_slice(&fs::read(out.path().join("bristol/manifest.json")).unwrap()).unwrap();
    let listed = &manifest.chunks["3"];
    assert_eq!(listed.len(), summary.chunk_files);
    // Every listed chunk exists and decodes; nothing unlisted was written.
    for parent in listed {
        let chunk = read_chunk(Pipeline::chunk_path(out.path(), "bristol", 3, parent)).unwrap();
        assert!(!chunk.is_empty());
    }
    let on_disk = fs::read_dir(out.path().join("bristol/r3")).unwrap().count();
    assert_eq!(on_disk, listed.len());
    assert_eq!(manifest.cells["3"], summary.cells[&3]);
}

#[test]
fn test_pipeline_output_is_byte_identical_across_runs() {
    let f = fixture();
    let mut config = small_config();
    config.export.include_boundaries = true;
    let origin = f.origins.get("bristol").unwrap();

    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(origin, first.path())
        .unwrap();
    Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(origin, second.path())
        .unwrap();

    let files = files_under(first.path());
    assert_eq!(files, files_under(second.path()));
    for file in files {
        let a = fs::read(first.path().join(&file)).unwrap();
        let b = fs::read(second.path().join(&file)).unwrap();
        assert!(a == b, "{:?} differs between runs", file);
    }
}

#[test]
fn test_rerun_replaces_stale_chunks() {
    let f = fixture();
    let config = small_config();
    let origin = f.origins.get("bristol").unwrap();
    let out = tempdir().unwrap();

    let stale = out.path().join("bristol/r3/stale.json.gz");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, b"old").unwrap();

    Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(origin, out.path())
        .unwrap();
    assert!(!stale.exists());
}

#[test]
fn test_oversized_chunk_aborts_run() {
    let f = fixture();
    let mut config = small_config();
    config.export.chunk_size_limit = 16;
    let out = tempdir().unwrap();

    let err = Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(f.origins.get("bristol").unwrap(), out.path())
        .unwrap_err();
    match err {
        PipelineError::ArtifactTooLarge { size, limit, .. } => {
            assert_eq!(limit, 16);
            assert!(size > 16);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_failed_rerun_keeps_previous_output_intact() {
    let f = fixture();
    let origin = f.origins.get("bristol").unwrap();
    let out = tempdir().unwrap();

    Pipeline::new(&small_config(), &f.airports, &f.graph, &f.ground)
        .run(origin, out.path())
        .unwrap();
    let before = files_under(out.path());
    let base_before = fs::read(out.path().join("bristol.json")).unwrap();

    let mut config = small_config();
    config.export.chunk_size_limit = 16;
    let err = Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(origin, out.path())
        .unwrap_err();
    assert!(matches!(err, PipelineError::ArtifactTooLarge { .. }));

    // Same files as after the good run, no leftovers from the failed one.
    assert_eq!(files_under(out.path()), before);
    assert_eq!(fs::read(out.path().join("bristol.json")).unwrap(), base_before);
    assert!(!Pipeline::staging_path(out.path(), "bristol").exists());

    let manifest: Manifest =
        serde_json::from_slice(&fs::read(out.path().join("bristol/manifest.json")).unwrap()).unwrap();
    for (res, parents) in &manifest.chunks {
        let res: u8 = res.parse().unwrap();
        for parent in parents {
            assert!(
                Pipeline::chunk_path(out.path(), "bristol", res, parent).exists(),
                "manifest lists missing chunk r{}/{}",
                res,
                parent
            );
        }
    }
}

#[test]
fn test_oversized_base_aborts_run() {
    let f = fixture();
    let mut config = small_config();
    config.export.base_size_limit = 64;
    let out = tempdir().unwrap();

    let err = Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(f.origins.get("bristol").unwrap(), out.path())
        .unwrap_err();
    assert!(matches!(err, PipelineError::ArtifactTooLarge { .. }));
    assert!(!out.path().join("bristol.json").exists());
}

#[test]
fn test_config_errors_fail_before_any_output() {
    let f = fixture();
    let out = tempdir().unwrap();
    let target = out.path().join("run");

    let err = Pipeline::new(&small_config(), &f.airports, &f.graph, &f.ground)
        .run(f.origins.get("stranded").unwrap(), &target)
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigError::NoDepartureAirports { .. })
    ));

    let mut config = small_config();
    config.export.base_resolutions.clear();
    config.export.chunked_resolutions.clear();
    let err = Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(f.origins.get("bristol").unwrap(), &target)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(ConfigError::EmptyResolutions)));
    assert!(!target.exists());
}

#[test]
fn test_graph_drops_unknown_route_endpoints() {
    let f = fixture();
    assert_eq!(f.graph.diagnostics.unknown_route_endpoints, 1);
    assert!(f.graph.leg_minutes("CDG", "NOPE").is_none());
    // Published one way, flown both ways.
    assert!(f.graph.leg_minutes("MAD", "BRS").is_some());
}

#[test]
fn test_discontinuities_over_exported_base() {
    let f = fixture();
    let config = small_config();
    let out = tempdir().unwrap();
    Pipeline::new(&config, &f.airports, &f.graph, &f.ground)
        .run(f.origins.get("bristol").unwrap(), out.path())
        .unwrap();

    let base = BaseArtifact::read(out.path().join("bristol.json")).unwrap();
    let cells = base.cells(2);
    let found = analysis::find_discontinuities(&cells, 0);
    assert!(!found.is_empty());
    assert!(found.windows(2).all(|w| w[0].difference >= w[1].difference));
}
