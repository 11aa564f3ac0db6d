// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Tiered export: coarse resolutions go into one base artifact per origin,
//! fine resolutions into gzipped chunks grouped by a coarser parent cell.
//!
//! Work is split into (resolution, parent) units. Each unit assigns its cells
//! and writes its own file; the only shared state is the read-only routing
//! output, and units are folded back together by their counters alone.

pub mod artifact;

use crate::airports::AirportDirectory;
use crate::assign::AssignmentEngine;
use crate::config::{self, ConfigError, PrecomputeConfig};
use crate::diagnostics::Diagnostics;
use crate::graph::FlightGraph;
use crate::ground::GroundTimes;
use crate::origin::Origin;
use crate::route_table::RouteTable;
use crate::router::{BestTimes, Router};
use crate::spatial::SpatialIndex;
use artifact::{BaseArtifact, CellMap, CellRecord, Manifest};
use h3o::{CellIndex, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Artifact {path} is {size} bytes, over the {limit} byte ceiling; partition it more finely")]
    ArtifactTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub base_resolutions: Vec<u8>,
    pub chunked_resolutions: Vec<u8>,
    pub chunk_parent_resolution: u8,
    pub base_size_limit: u64,
    /// Compressed bytes.
    pub chunk_size_limit: u64,
    pub include_boundaries: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_resolutions: vec![1, 2, 3, 4],
            chunked_resolutions: vec![5, 6],
            chunk_parent_resolution: 2,
            base_size_limit: 64 * MIB,
            chunk_size_limit: 4 * MIB,
            include_boundaries: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportSummary {
    pub origin: String,
    pub reachable_airports: usize,
    /// Emitted cells per resolution.
    pub cells: BTreeMap<u8, usize>,
    /// Unreachable cells per resolution.
    pub skipped: BTreeMap<u8, usize>,
    pub base_bytes: u64,
    pub chunk_files: usize,
    pub chunk_bytes: u64,
    pub largest_chunk_bytes: u64,
}

/// Output of one work unit.
struct UnitOutcome {
    resolution: u8,
    parent: CellIndex,
    cells: CellMap,
    skipped: usize,
}

struct ChunkWritten {
    resolution: u8,
    parent: String,
    cells: usize,
    skipped: usize,
    bytes: u64,
}

pub struct Pipeline<'a> {
    config: &'a PrecomputeConfig,
    airports: &'a AirportDirectory,
    graph: &'a FlightGraph,
    ground: &'a dyn GroundTimes,
    diagnostics: Diagnostics,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PrecomputeConfig,
        airports: &'a AirportDirectory,
        graph: &'a FlightGraph,
        ground: &'a dyn GroundTimes,
    ) -> Self {
        Self {
            config,
            airports,
            graph,
            ground,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Data-integrity counters gathered while loading, copied into the manifest.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn base_path(out_dir: &Path, origin: &str) -> PathBuf {
        out_dir.join(format!("{}.json", origin))
    }

    pub fn routes_path(out_dir: &Path, origin: &str) -> PathBuf {
        out_dir.join(format!("{}-routes.json", origin))
    }

    pub fn manifest_path(out_dir: &Path, origin: &str) -> PathBuf {
        out_dir.join(origin).join("manifest.json")
    }

    /// Scratch directory a run writes into before its output replaces the
    /// previous one.
    pub fn staging_path(out_dir: &Path, origin: &str) -> PathBuf {
        out_dir.join(format!(".{}.staging", origin))
    }

    pub fn chunk_path(out_dir: &Path, origin: &str, resolution: u8, parent: &str) -> PathBuf {
        out_dir
            .join(origin)
            .join(format!("r{}", resolution))
            .join(format!("{}.json.gz", parent))
    }

    pub fn run(&self, origin: &Origin, out_dir: &Path) -> Result<ExportSummary, PipelineError> {
        self.config.validate()?;
        origin.validate(self.airports)?;

        let router = Router::new(self.graph, self.config.router.clone());
        let best = router.route(origin);
        let index = SpatialIndex::build(&best, self.graph, &self.config.spatial)?;
        let engine = AssignmentEngine::new(
            origin,
            self.graph,
            &best,
            &index,
            self.ground,
            &self.config.overheads,
            self.config.assign.clone(),
        )?;

        let mut summary = ExportSummary {
            origin: origin.id.clone(),
            reachable_airports: best.len(),
            ..ExportSummary::default()
        };
        log::info!(
            "Export started — origin={} reachable={} stops={:?}",
            origin.id,
            best.len(),
            best.stops_histogram()
        );

        // Nothing under `out_dir` changes until every artifact is written and
        // within its size ceiling.
        let staging = Self::staging_path(out_dir, &origin.id);
        remove_dir(&staging)?;
        if let Err(err) = self.write_artifacts(&engine, origin, &best, &staging, &mut summary) {
            if let Err(cleanup) = remove_dir(&staging) {
                log::warn!(
                    "Could not remove staged output — path={} error={}",
                    staging.display(),
                    cleanup
                );
            }
            return Err(err);
        }
        promote(&staging, out_dir, &origin.id)?;

        for (res, count) in &summary.cells {
            log::info!(
                "Resolution done — origin={} res={} cells={} skipped={}",
                origin.id,
                res,
                count,
                summary.skipped.get(res).copied().unwrap_or_default()
            );
        }
        log::info!(
            "Export finished — origin={} base_bytes={} chunks={} chunk_bytes={} largest_chunk={}",
            origin.id,
            summary.base_bytes,
            summary.chunk_files,
            summary.chunk_bytes,
            summary.largest_chunk_bytes
        );
        Ok(summary)
    }

    /// Writes the route table, base artifact, chunks and manifest under `dir`.
    fn write_artifacts(
        &self,
        engine: &AssignmentEngine<'_>,
        origin: &Origin,
        best: &BestTimes,
        dir: &Path,
        summary: &mut ExportSummary,
    ) -> Result<(), PipelineError> {
        create_dir(dir)?;
        let routes = RouteTable::build(origin, best, self.graph);
        let bytes = artifact::encode_json(&routes)?;
        write_file(&Self::routes_path(dir, &origin.id), &bytes)?;

        let base = self.export_base(engine, origin, summary)?;
        let base_path = Self::base_path(dir, &origin.id);
        let bytes = artifact::encode_json(&base)?;
        check_size(&base_path, bytes.len() as u64, self.config.export.base_size_limit)?;
        write_file(&base_path, &bytes)?;
        summary.base_bytes = bytes.len() as u64;

        let chunks = self.export_chunks(engine, &origin.id, dir)?;
        let mut listed: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for &res in &self.config.export.chunked_resolutions {
            listed.entry(res.to_string()).or_default();
        }
        for chunk in &chunks {
            *summary.cells.entry(chunk.resolution).or_default() += chunk.cells;
            *summary.skipped.entry(chunk.resolution).or_default() += chunk.skipped;
            if chunk.cells == 0 {
                continue;
            }
            summary.chunk_files += 1;
            summary.chunk_bytes += chunk.bytes;
            summary.largest_chunk_bytes = summary.largest_chunk_bytes.max(chunk.bytes);
            listed
                .entry(chunk.resolution.to_string())
                .or_default()
                .push(chunk.parent.clone());
        }
        for ids in listed.values_mut() {
            ids.sort();
        }

        let manifest = Manifest {
            origin: origin.id.clone(),
            base: format!("{}.json", origin.id),
            routes: format!("{}-routes.json", origin.id),
            chunk_parent_resolution: self.config.export.chunk_parent_resolution,
            chunks: listed,
            cells: summary
                .cells
                .iter()
                .map(|(res, count)| (res.to_string(), *count))
                .collect(),
            diagnostics: self.diagnostics.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&manifest)?;
        write_file(&Self::manifest_path(dir, &origin.id), &bytes)?;
        Ok(())
    }

    fn export_base(
        &self,
        engine: &AssignmentEngine<'_>,
        origin: &Origin,
        summary: &mut ExportSummary,
    ) -> Result<BaseArtifact, PipelineError> {
        use rayon::prelude::*;

        let mut units = Vec::new();
        for &res in &self.config.export.base_resolutions {
            let resolution = config::resolution(res)?;
            units.extend(CellIndex::base_cells().map(|base| (res, resolution, base)));
        }

        let outcomes: Vec<UnitOutcome> = units
            .into_par_iter()
            .map(|(res, resolution, base)| self.assign_unit(engine, res, base, resolution))
            .collect();

        let mut resolutions: BTreeMap<String, CellMap> = BTreeMap::new();
        for &res in &self.config.export.base_resolutions {
            resolutions.entry(res.to_string()).or_default();
        }
        for outcome in outcomes {
            *summary.cells.entry(outcome.resolution).or_default() += outcome.cells.len();
            *summary.skipped.entry(outcome.resolution).or_default() += outcome.skipped;
            resolutions
                .entry(outcome.resolution.to_string())
                .or_default()
                .extend(outcome.cells);
        }

        Ok(BaseArtifact {
            origin: origin.id.clone(),
            name: origin.name.clone(),
            coords: [origin.lon, origin.lat],
            resolutions,
        })
    }

    fn export_chunks(
        &self,
        engine: &AssignmentEngine<'_>,
        origin: &str,
        out_dir: &Path,
    ) -> Result<Vec<ChunkWritten>, PipelineError> {
        use rayon::prelude::*;

        let export = &self.config.export;
        if export.chunked_resolutions.is_empty() {
            return Ok(Vec::new());
        }
        let parent_res = config::resolution(export.chunk_parent_resolution)?;
        let parents: Vec<CellIndex> = CellIndex::base_cells()
            .flat_map(|base| base.children(parent_res))
            .collect();

        let mut units = Vec::new();
        for &res in &export.chunked_resolutions {
            let resolution = config::resolution(res)?;
            units.extend(parents.iter().map(|&parent| (res, resolution, parent)));
        }

        units
            .into_par_iter()
            .map(|(res, resolution, parent)| {
                let outcome = self.assign_unit(engine, res, parent, resolution);
                self.write_chunk(origin, out_dir, outcome)
            })
            .collect()
    }

    /// Assigns every cell of `resolution` under `parent`.
    fn assign_unit(
        &self,
        engine: &AssignmentEngine<'_>,
        res: u8,
        parent: CellIndex,
        resolution: Resolution,
    ) -> UnitOutcome {
        let mut cells = CellMap::new();
        let mut skipped = 0;
        for cell in parent.children(resolution) {
            let Some(assignment) = engine.assign(cell) else {
                skipped += 1;
                continue;
            };
            let mut record = CellRecord::from_assignment(&assignment);
            if self.config.export.include_boundaries {
                record = record.with_boundary(cell);
            }
            cells.insert(cell.to_string(), record);
        }
        UnitOutcome {
            resolution: res,
            parent,
            cells,
            skipped,
        }
    }

    fn write_chunk(
        &self,
        origin: &str,
        out_dir: &Path,
        outcome: UnitOutcome,
    ) -> Result<ChunkWritten, PipelineError> {
        let parent = outcome.parent.to_string();
        let mut written = ChunkWritten {
            resolution: outcome.resolution,
            parent,
            cells: outcome.cells.len(),
            skipped: outcome.skipped,
            bytes: 0,
        };
        if outcome.cells.is_empty() {
            return Ok(written);
        }

        let path = Self::chunk_path(out_dir, origin, outcome.resolution, &written.parent);
        let json = artifact::encode_json(&outcome.cells)?;
        let bytes = artifact::gzip(&json).map_err(|source| PipelineError::Io {
            path: path.clone(),
            source,
        })?;
        check_size(&path, bytes.len() as u64, self.config.export.chunk_size_limit)?;
        write_file(&path, &bytes)?;
        written.bytes = bytes.len() as u64;
        Ok(written)
    }
}

fn check_size(path: &Path, size: u64, limit: u64) -> Result<(), PipelineError> {
    if size > limit {
        log::error!(
            "Artifact over size ceiling — path={} size={} limit={}",
            path.display(),
            size,
            limit
        );
        return Err(PipelineError::ArtifactTooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Moves a finished staging directory over the previous output for `origin`.
/// Chunk directories from earlier runs go with it.
fn promote(staging: &Path, out_dir: &Path, origin: &str) -> Result<(), PipelineError> {
    let chunks = out_dir.join(origin);
    remove_dir(&chunks)?;
    rename(&staging.join(origin), &chunks)?;
    rename(
        &Pipeline::base_path(staging, origin),
        &Pipeline::base_path(out_dir, origin),
    )?;
    rename(
        &Pipeline::routes_path(staging, origin),
        &Pipeline::routes_path(out_dir, origin),
    )?;
    remove_dir(staging)
}

fn rename(from: &Path, to: &Path) -> Result<(), PipelineError> {
    fs::rename(from, to).map_err(|source| PipelineError::Io {
        path: to.to_path_buf(),
        source,
    })
}

fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_dir(path: &Path) -> Result<(), PipelineError> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, bytes).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let config = ExportConfig::default();
        assert_eq!(config.base_resolutions, vec![1, 2, 3, 4]);
        assert_eq!(config.chunk_parent_resolution, 2);
        assert_eq!(config.chunk_size_limit, 4 * 1024 * 1024);
        assert!(!config.include_boundaries);
    }

    #[test]
    fn test_paths() {
        let out = Path::new("/tmp/out");
        assert_eq!(Pipeline::base_path(out, "bristol"), PathBuf::from("/tmp/out/bristol.json"));
        assert_eq!(
            Pipeline::routes_path(out, "bristol"),
            PathBuf::from("/tmp/out/bristol-routes.json")
        );
        assert_eq!(
            Pipeline::chunk_path(out, "bristol", 5, "822d57fffffffff"),
            PathBuf::from("/tmp/out/bristol/r5/822d57fffffffff.json.gz")
        );
    }

    #[test]
    fn test_size_check() {
        let path = Path::new("x.json");
        assert!(check_size(path, 10, 10).is_ok());
        match check_size(path, 11, 10) {
            Err(PipelineError::ArtifactTooLarge { size, limit, .. }) => {
                assert_eq!((size, limit), (11, 10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
