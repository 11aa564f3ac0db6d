// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Per-cell door-to-door assignment: fly via the best nearby airport, or
//! drive directly from the origin.

use crate::config::{self, ConfigError};
use crate::geo;
use crate::graph::FlightGraph;
use crate::ground::{self, GroundTime, GroundTimes};
use crate::origin::{Origin, OverheadTable};
use crate::router::BestTimes;
use crate::spatial::SpatialIndex;
use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignConfig {
    /// Below this origin distance the cell is drive-only.
    pub min_fly_distance_km: f64,
    /// Drive-only totals are offered up to this origin distance.
    pub drive_radius_km: f64,
    /// Airports farther than this from the cell centroid are ignored.
    pub max_airport_ground_km: f64,
    /// Straight-line speed for ground legs missing from the tables.
    pub ground_speed_kmh: f64,
    pub ground_reference_resolution: u8,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            min_fly_distance_km: 150.0,
            drive_radius_km: 400.0,
            max_airport_ground_km: 400.0,
            ground_speed_kmh: 40.0,
            ground_reference_resolution: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellAssignment {
    Flight {
        total: u32,
        departure: String,
        arrival: String,
        stops: u8,
        /// The arrival airport's ground leg came from real routing.
        ground_measured: bool,
    },
    Drive {
        total: u32,
        measured: bool,
    },
}

impl CellAssignment {
    pub fn total(&self) -> u32 {
        match self {
            CellAssignment::Flight { total, .. } | CellAssignment::Drive { total, .. } => *total,
        }
    }

    pub fn is_drive(&self) -> bool {
        matches!(self, CellAssignment::Drive { .. })
    }

    pub fn arrival(&self) -> Option<&str> {
        match self {
            CellAssignment::Flight { arrival, .. } => Some(arrival),
            CellAssignment::Drive { .. } => None,
        }
    }

    pub fn ground_measured(&self) -> bool {
        match self {
            CellAssignment::Flight { ground_measured, .. } => *ground_measured,
            CellAssignment::Drive { measured, .. } => *measured,
        }
    }
}

pub struct AssignmentEngine<'a> {
    origin: &'a Origin,
    graph: &'a FlightGraph,
    best: &'a BestTimes,
    index: &'a SpatialIndex,
    ground: &'a dyn GroundTimes,
    overheads: &'a OverheadTable,
    config: AssignConfig,
    reference: Resolution,
}

impl<'a> AssignmentEngine<'a> {
    pub fn new(
        origin: &'a Origin,
        graph: &'a FlightGraph,
        best: &'a BestTimes,
        index: &'a SpatialIndex,
        ground: &'a dyn GroundTimes,
        overheads: &'a OverheadTable,
        config: AssignConfig,
    ) -> Result<Self, ConfigError> {
        let reference = config::resolution(config.ground_reference_resolution)?;
        Ok(Self {
            origin,
            graph,
            best,
            index,
            ground,
            overheads,
            config,
            reference,
        })
    }

    pub fn origin(&self) -> &Origin {
        self.origin
    }

    /// Minimum-time assignment using the spatial index for candidates.
    /// `None` means unreachable: outside the drive radius with no usable
    /// airport nearby.
    pub fn assign(&self, cell: CellIndex) -> Option<CellAssignment> {
        self.assign_with(cell, || self.index.query(cell))
    }

    /// Same as [`AssignmentEngine::assign`] but considers every reachable
    /// airport. Slow; used to check the index.
    pub fn assign_exhaustive(&self, cell: CellIndex) -> Option<CellAssignment> {
        self.assign_with(cell, || self.best.codes().collect())
    }

    pub fn assign_point(&self, lat: f64, lon: f64, resolution: Resolution) -> Option<CellAssignment> {
        let point = LatLng::new(lat, lon).ok()?;
        self.assign(point.to_cell(resolution))
    }

    fn assign_with<'c, F>(&'c self, cell: CellIndex, candidates: F) -> Option<CellAssignment>
    where
        F: FnOnce() -> Vec<&'c str>,
    {
        let centroid = LatLng::from(cell);
        let (lat, lon) = (centroid.lat(), centroid.lng());
        let origin_km = self.origin.distance_km_to(lat, lon);
        let reference = ground::reference_cell(cell, self.reference);

        if origin_km < self.config.min_fly_distance_km {
            return Some(self.drive(reference, origin_km));
        }

        let drive = (origin_km <= self.config.drive_radius_km).then(|| self.drive(reference, origin_km));
        let flight = self.best_flight(candidates(), reference, lat, lon);

        match (flight, drive) {
            (Some(f), Some(d)) if d.total() < f.total() => Some(d),
            (Some(f), _) => Some(f),
            (None, d) => d,
        }
    }

    fn best_flight<'c>(
        &self,
        candidates: Vec<&'c str>,
        reference: CellIndex,
        lat: f64,
        lon: f64,
    ) -> Option<CellAssignment> {
        let mut best: Option<(u32, &'c str, GroundTime)> = None;

        // Candidates arrive in code order, so strict `<` keeps the lower code on ties.
        for code in candidates {
            let Some(record) = self.best.get(code) else {
                continue;
            };
            let Some(airport) = self.graph.airport_by_code(code) else {
                continue;
            };
            let ground_km = geo::haversine_km(airport.lat, airport.lon, lat, lon);
            if ground_km > self.config.max_airport_ground_km {
                continue;
            }
            let ground = self
                .ground
                .airport_to_cell(code, reference)
                .unwrap_or_else(|| self.estimate(ground_km));
            let total = record
                .minutes
                .saturating_add(self.overheads.arrival_minutes(&self.origin.country, airport))
                .saturating_add(ground.minutes);
            if best.map_or(true, |(t, _, _)| total < t) {
                best = Some((total, code, ground));
            }
        }

        let (total, code, ground) = best?;
        let record = self.best.get(code)?;
        Some(CellAssignment::Flight {
            total,
            departure: record.departure().to_string(),
            arrival: code.to_string(),
            stops: record.stops,
            ground_measured: ground.measured,
        })
    }

    fn drive(&self, reference: CellIndex, origin_km: f64) -> CellAssignment {
        let ground = self
            .ground
            .origin_to_cell(reference)
            .unwrap_or_else(|| self.estimate(origin_km));
        CellAssignment::Drive {
            total: ground.minutes,
            measured: ground.measured,
        }
    }

    fn estimate(&self, distance_km: f64) -> GroundTime {
        GroundTime::estimated(geo::estimate_ground_minutes(
            distance_km,
            self.config.ground_speed_kmh,
        ))
    }
}
