//! Data-integrity counters.
//!
//! Bad records in the input snapshots are dropped where they are found and
//! counted here; a run reports them once, at the end, instead of per record.

use serde::{Deserialize, Serialize};

/// How many sample codes to keep per counter for the summary line.
const MAX_SAMPLES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Airports dropped because their coordinates were out of range.
    pub invalid_airports: usize,
    /// Routes dropped because an endpoint is missing from the airport set.
    pub unknown_route_endpoints: usize,
    /// Measured leg durations whose endpoints are not a known edge.
    pub unknown_leg_durations: usize,
    /// Ground-time tables keyed by an airport code we don't know.
    pub unknown_ground_airports: usize,
    /// Ground-time entries whose cell id did not parse or sits at the wrong resolution.
    pub invalid_ground_cells: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.invalid_airports
            + self.unknown_route_endpoints
            + self.unknown_leg_durations
            + self.unknown_ground_airports
            + self.invalid_ground_cells
    }

    /// Remember a representative offender (only the first few are kept).
    pub fn sample(&mut self, what: impl Into<String>) {
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(what.into());
        }
    }

    pub fn merge(&mut self, other: &Diagnostics) {
        self.invalid_airports += other.invalid_airports;
        self.unknown_route_endpoints += other.unknown_route_endpoints;
        self.unknown_leg_durations += other.unknown_leg_durations;
        self.unknown_ground_airports += other.unknown_ground_airports;
        self.invalid_ground_cells += other.invalid_ground_cells;
        for s in &other.samples {
            self.sample(s.clone());
        }
    }

    /// Emit the end-of-run summary.
    pub fn log_summary(&self) {
        if self.is_clean() {
            log::info!("Input data clean — no records dropped");
            return;
        }
        log::warn!(
            "Dropped {} input records — invalid_airports={} unknown_route_endpoints={} unknown_leg_durations={} unknown_ground_airports={} invalid_ground_cells={} samples=[{}]",
            self.total(),
            self.invalid_airports,
            self.unknown_route_endpoints,
            self.unknown_leg_durations,
            self.unknown_ground_airports,
            self.invalid_ground_cells,
            self.samples.join(", ")
        );
    }
}
