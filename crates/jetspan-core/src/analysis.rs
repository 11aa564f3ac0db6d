//! Finds sharp jumps in travel time between neighbouring cells.
//!
//! Large jumps usually point at a data seam (measured vs estimated ground
//! times) or at the assignment switching airports, and are worth eyeballing
//! after a run.

use crate::assign::CellAssignment;
use h3o::{CellIndex, LatLng};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscontinuityKind {
    /// Both flights, one ground leg measured and the other estimated.
    GroundSourceBoundary,
    /// One side drives, the other flies.
    DriveFlightBoundary,
    /// Different arrival airports.
    AirportSwitch,
    /// Same arrival (or both drive-only), different ground times.
    SameAirport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discontinuity {
    pub cell: String,
    pub neighbor: String,
    pub cell_total: u32,
    pub neighbor_total: u32,
    pub difference: u32,
    pub kind: DiscontinuityKind,
    /// Midpoint of the two centroids, `[lat, lng]`.
    pub location: [f64; 2],
}

pub fn classify(a: &CellAssignment, b: &CellAssignment) -> DiscontinuityKind {
    if !a.is_drive() && !b.is_drive() && a.ground_measured() != b.ground_measured() {
        DiscontinuityKind::GroundSourceBoundary
    } else if a.is_drive() != b.is_drive() {
        DiscontinuityKind::DriveFlightBoundary
    } else if a.arrival() != b.arrival() {
        DiscontinuityKind::AirportSwitch
    } else {
        DiscontinuityKind::SameAirport
    }
}

/// Every adjacent pair whose totals differ by at least `threshold` minutes,
/// worst first.
pub fn find_discontinuities(
    cells: &HashMap<CellIndex, CellAssignment>,
    threshold: u32,
) -> Vec<Discontinuity> {
    let mut found = Vec::new();
    for (&cell, assignment) in cells {
        for neighbor in cell.grid_disk::<Vec<_>>(1) {
            // Each pair once.
            if u64::from(neighbor) <= u64::from(cell) {
                continue;
            }
            let Some(other) = cells.get(&neighbor) else {
                continue;
            };
            let difference = assignment.total().abs_diff(other.total());
            if difference < threshold {
                continue;
            }
            let (a, b) = (LatLng::from(cell), LatLng::from(neighbor));
            found.push(Discontinuity {
                cell: cell.to_string(),
                neighbor: neighbor.to_string(),
                cell_total: assignment.total(),
                neighbor_total: other.total(),
                difference,
                kind: classify(assignment, other),
                location: [(a.lat() + b.lat()) / 2.0, (a.lng() + b.lng()) / 2.0],
            });
        }
    }
    found.sort_by(|x, y| {
        y.difference
            .cmp(&x.difference)
            .then_with(|| x.cell.cmp(&y.cell))
            .then_with(|| x.neighbor.cmp(&y.neighbor))
    });
    found
}

pub fn count_by_kind(found: &[Discontinuity]) -> BTreeMap<DiscontinuityKind, usize> {
    let mut counts = BTreeMap::new();
    for d in found {
        *counts.entry(d.kind).or_default() += 1;
    }
    counts
}
