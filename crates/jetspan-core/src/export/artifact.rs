//! On-disk artifact shapes and their encoding.

use crate::assign::CellAssignment;
use crate::diagnostics::Diagnostics;
use crate::LoadError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use h3o::CellIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::str::FromStr;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Compact per-cell record. Flights carry `o`/`a`/`s`; drives carry `d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    #[serde(rename = "t")]
    pub total: u32,
    #[serde(rename = "o", default, skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub arrival: Option<String>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub stops: Option<u8>,
    #[serde(rename = "d", default, skip_serializing_if = "is_false")]
    pub drive: bool,
    /// Ground leg backed by real routing.
    #[serde(rename = "g", default)]
    pub measured: bool,
    /// `[lng, lat]` ring, only when boundaries are exported.
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<Vec<[f64; 2]>>,
}

impl CellRecord {
    pub fn from_assignment(assignment: &CellAssignment) -> Self {
        match assignment {
            CellAssignment::Flight {
                total,
                departure,
                arrival,
                stops,
                ground_measured,
            } => Self {
                total: *total,
                departure: Some(departure.clone()),
                arrival: Some(arrival.clone()),
                stops: Some(*stops),
                drive: false,
                measured: *ground_measured,
                boundary: None,
            },
            CellAssignment::Drive { total, measured } => Self {
                total: *total,
                departure: None,
                arrival: None,
                stops: None,
                drive: true,
                measured: *measured,
                boundary: None,
            },
        }
    }

    pub fn with_boundary(mut self, cell: CellIndex) -> Self {
        let ring = cell
            .boundary()
            .iter()
            .map(|ll| [round6(ll.lng()), round6(ll.lat())])
            .collect();
        self.boundary = Some(ring);
        self
    }

    pub fn to_assignment(&self) -> CellAssignment {
        match (&self.arrival, self.drive) {
            (Some(arrival), false) => CellAssignment::Flight {
                total: self.total,
                departure: self.departure.clone().unwrap_or_default(),
                arrival: arrival.clone(),
                stops: self.stops.unwrap_or_default(),
                ground_measured: self.measured,
            },
            _ => CellAssignment::Drive {
                total: self.total,
                measured: self.measured,
            },
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

pub type CellMap = BTreeMap<String, CellRecord>;

/// Coarse resolutions for one origin, in a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseArtifact {
    pub origin: String,
    pub name: String,
    /// `[lng, lat]`
    pub coords: [f64; 2],
    pub resolutions: BTreeMap<String, CellMap>,
}

impl BaseArtifact {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        crate::read_json(path.as_ref())
    }

    /// Decoded cells of one resolution; keys that are not valid cells are skipped.
    pub fn cells(&self, resolution: u8) -> HashMap<CellIndex, CellAssignment> {
        self.resolutions
            .get(&resolution.to_string())
            .map(decode_cells)
            .unwrap_or_default()
    }
}

pub fn decode_cells(cells: &CellMap) -> HashMap<CellIndex, CellAssignment> {
    cells
        .iter()
        .filter_map(|(key, record)| {
            CellIndex::from_str(key)
                .ok()
                .map(|cell| (cell, record.to_assignment()))
        })
        .collect()
}

/// Lists what a run wrote, so a client never has to probe for chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub origin: String,
    pub base: String,
    pub routes: String,
    pub chunk_parent_resolution: u8,
    /// Chunk parent ids per chunked resolution.
    pub chunks: BTreeMap<String, Vec<String>>,
    /// Emitted cells per resolution.
    pub cells: BTreeMap<String, usize>,
    pub diagnostics: Diagnostics,
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Gzip with the default header: no file name, zero mtime.
pub fn gzip(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

pub fn read_chunk<P: AsRef<Path>>(path: P) -> Result<CellMap, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(GzDecoder::new(BufReader::new(file))).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}
