//! Ground-transport times, read from a resolved snapshot.
//!
//! Tables are keyed by an H3 cell at a fixed reference resolution. Any cell
//! being assigned is mapped onto that resolution before the lookup.

use crate::airports::AirportDirectory;
use crate::diagnostics::Diagnostics;
use crate::LoadError;
use h3o::{CellIndex, LatLng, Resolution};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundTime {
    pub minutes: u32,
    /// Backed by real ground routing rather than a straight-line estimate.
    pub measured: bool,
}

impl GroundTime {
    pub fn measured(minutes: u32) -> Self {
        Self {
            minutes,
            measured: true,
        }
    }

    pub fn estimated(minutes: u32) -> Self {
        Self {
            minutes,
            measured: false,
        }
    }
}

/// Read-only lookup used during cell assignment. Implementations must be
/// fully resident; assignment never waits on I/O.
pub trait GroundTimes: Sync {
    /// Minutes from an airport to a reference-resolution cell.
    fn airport_to_cell(&self, airport: &str, cell: CellIndex) -> Option<GroundTime>;

    /// Minutes from the origin itself to a reference-resolution cell.
    fn origin_to_cell(&self, cell: CellIndex) -> Option<GroundTime>;
}

/// Maps `cell` onto `reference`: its ancestor if it is at least as fine,
/// otherwise the reference cell under its centroid.
pub fn reference_cell(cell: CellIndex, reference: Resolution) -> CellIndex {
    if cell.resolution() >= reference {
        if let Some(parent) = cell.parent(reference) {
            return parent;
        }
    }
    LatLng::from(cell).to_cell(reference)
}

/// One table value: a bare number (measured) or an object with a flag.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Minutes(u32),
    Detailed {
        minutes: u32,
        #[serde(default)]
        estimated: bool,
    },
}

impl From<RawEntry> for GroundTime {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Minutes(minutes) => GroundTime::measured(minutes),
            RawEntry::Detailed { minutes, estimated } => GroundTime {
                minutes,
                measured: !estimated,
            },
        }
    }
}

type RawTable = BTreeMap<String, RawEntry>;

#[derive(Debug, Clone)]
pub struct GroundTable {
    reference: Resolution,
    airports: HashMap<String, HashMap<CellIndex, GroundTime>>,
    origin: HashMap<CellIndex, GroundTime>,
    pub diagnostics: Diagnostics,
}

impl GroundTable {
    pub fn new(reference: Resolution) -> Self {
        Self {
            reference,
            airports: HashMap::new(),
            origin: HashMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn reference_resolution(&self) -> Resolution {
        self.reference
    }

    /// Loads the airport table (`{ code: { cell: entry } }`) and, if given,
    /// the origin table (`{ cell: entry }`). Entries for unknown airports or
    /// malformed cells are dropped and counted.
    pub fn load(
        airport_table: Option<&Path>,
        origin_table: Option<&Path>,
        airports: &AirportDirectory,
        reference: Resolution,
    ) -> Result<Self, LoadError> {
        let mut table = Self::new(reference);
        if let Some(path) = airport_table {
            let raw: BTreeMap<String, RawTable> = crate::read_json(path)?;
            table.add_airport_tables(raw, airports);
        }
        if let Some(path) = origin_table {
            let raw: RawTable = crate::read_json(path)?;
            table.add_origin_table(raw);
        }
        log::info!(
            "Ground times loaded — airports={} airport_entries={} origin_entries={} dropped={}",
            table.airports.len(),
            table.airport_entry_count(),
            table.origin.len(),
            table.diagnostics.total()
        );
        Ok(table)
    }

    pub fn from_json_str(
        airport_json: &str,
        origin_json: Option<&str>,
        airports: &AirportDirectory,
        reference: Resolution,
    ) -> Result<Self, serde_json::Error> {
        let mut table = Self::new(reference);
        table.add_airport_tables(serde_json::from_str(airport_json)?, airports);
        if let Some(json) = origin_json {
            table.add_origin_table(serde_json::from_str(json)?);
        }
        Ok(table)
    }

    fn add_airport_tables(&mut self, raw: BTreeMap<String, RawTable>, airports: &AirportDirectory) {
        for (code, entries) in raw {
            if !airports.contains(&code) {
                self.diagnostics.unknown_ground_airports += 1;
                self.diagnostics.sample(format!("ground table {}", code));
                continue;
            }
            for (cell, entry) in entries {
                if let Some(cell) = self.parse_cell(&cell) {
                    self.insert_airport(&code, cell, entry.into());
                }
            }
        }
    }

    fn add_origin_table(&mut self, raw: RawTable) {
        for (cell, entry) in raw {
            if let Some(cell) = self.parse_cell(&cell) {
                self.insert_origin(cell, entry.into());
            }
        }
    }

    fn parse_cell(&mut self, raw: &str) -> Option<CellIndex> {
        match CellIndex::from_str(raw) {
            Ok(cell) if cell.resolution() == self.reference => Some(cell),
            _ => {
                self.diagnostics.invalid_ground_cells += 1;
                self.diagnostics.sample(format!("ground cell {}", raw));
                None
            }
        }
    }

    pub fn insert_airport(&mut self, code: &str, cell: CellIndex, time: GroundTime) {
        self.airports
            .entry(code.to_string())
            .or_default()
            .insert(cell, time);
    }

    pub fn insert_origin(&mut self, cell: CellIndex, time: GroundTime) {
        self.origin.insert(cell, time);
    }

    pub fn airport_entry_count(&self) -> usize {
        self.airports.values().map(|t| t.len()).sum()
    }
}

impl GroundTimes for GroundTable {
    fn airport_to_cell(&self, airport: &str, cell: CellIndex) -> Option<GroundTime> {
        self.airports.get(airport)?.get(&cell).copied()
    }

    fn origin_to_cell(&self, cell: CellIndex) -> Option<GroundTime> {
        self.origin.get(&cell).copied()
    }
}
