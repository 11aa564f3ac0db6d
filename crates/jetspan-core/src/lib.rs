// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

pub mod airports;
pub mod analysis;
pub mod assign;
pub mod config;
pub mod diagnostics;
pub mod export;
pub mod flight_time;
pub mod geo;
pub mod graph;
pub mod ground;
pub mod origin;
pub mod route_table;
pub mod router;
pub mod routes;
pub mod spatial;

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use airports::{Airport, AirportDirectory, FacilityClass};
pub use assign::{AssignConfig, AssignmentEngine, CellAssignment};
pub use config::{ConfigError, PrecomputeConfig};
pub use diagnostics::Diagnostics;
pub use export::{ExportConfig, ExportSummary, Pipeline, PipelineError};
pub use graph::{FlightGraph, GraphOptions};
pub use ground::{GroundTable, GroundTime, GroundTimes};
pub use origin::{Origin, OriginSet};
pub use router::{BestTimeRecord, BestTimes, Router, RouterConfig};
pub use routes::RouteDirectory;
pub use spatial::{SpatialConfig, SpatialIndex};

/// Failure to read one of the input snapshots.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}
