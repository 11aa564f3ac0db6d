//! Coarse hexagonal bucket index over reachable airports.
//!
//! Each reachable airport sits in the bucket (an H3 cell at a coarse
//! resolution) that contains it. A query returns the airports of the queried
//! location's bucket plus those `ring_radius` rings around it, so the number
//! of candidates does not grow with the size of the airport set.

use crate::config::{self, ConfigError};
use crate::graph::FlightGraph;
use crate::ground;
use crate::router::BestTimes;
use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub bucket_resolution: u8,
    pub ring_radius: u32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            bucket_resolution: 2,
            ring_radius: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    resolution: Resolution,
    ring_radius: u32,
    buckets: HashMap<CellIndex, Vec<String>>,
}

impl SpatialIndex {
    pub fn build(
        best: &BestTimes,
        graph: &FlightGraph,
        config: &SpatialConfig,
    ) -> Result<Self, ConfigError> {
        let resolution = config::resolution(config.bucket_resolution)?;
        let mut buckets: HashMap<CellIndex, Vec<String>> = HashMap::new();

        for code in best.codes() {
            let Some(airport) = graph.airport_by_code(code) else {
                continue;
            };
            let Ok(point) = LatLng::new(airport.lat, airport.lon) else {
                continue;
            };
            buckets
                .entry(point.to_cell(resolution))
                .or_default()
                .push(code.to_string());
        }

        log::debug!(
            "Spatial index built — resolution={} buckets={} airports={}",
            config.bucket_resolution,
            buckets.len(),
            best.len()
        );
        Ok(Self {
            resolution,
            ring_radius: config.ring_radius,
            buckets,
        })
    }

    /// The bucket a cell falls in: its ancestor when it is finer than the
    /// bucket resolution, otherwise the bucket under its centroid.
    pub fn bucket_of(&self, cell: CellIndex) -> CellIndex {
        ground::reference_cell(cell, self.resolution)
    }

    /// Candidate airport codes near `cell`, sorted and deduplicated.
    pub fn query(&self, cell: CellIndex) -> Vec<&str> {
        self.collect(self.bucket_of(cell))
    }

    fn collect(&self, bucket: CellIndex) -> Vec<&str> {
        let mut found = BTreeSet::new();
        for neighbor in bucket.grid_disk::<Vec<_>>(self.ring_radius) {
            if let Some(codes) = self.buckets.get(&neighbor) {
                found.extend(codes.iter().map(|c| c.as_str()));
            }
        }
        found.into_iter().collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airports::{Airport, AirportDirectory, FacilityClass};
    use crate::graph::GraphOptions;
    use crate::origin::{DepartureAirport, Origin};
    use crate::router::{Router, RouterConfig};
    use crate::routes::RouteDirectory;

    fn fixture() -> (FlightGraph, BestTimes) {
        let make = |code: &str, lat: f64, lon: f64| Airport {
            code: code.to_string(),
            name: code.to_string(),
            lat,
            lon,
            country: "XX".to_string(),
            facility: FacilityClass::Large,
        };
        let airports = AirportDirectory::from_airports(vec![
            make("HOM", 51.4, -2.7),
            make("CDG", 49.0, 2.5),
            make("ORY", 48.7, 2.4),
            make("JFK", 40.6, -73.8),
        ]);
        let routes = RouteDirectory::from_pairs([("HOM", "CDG"), ("HOM", "ORY"), ("HOM", "JFK")]);
        let graph = FlightGraph::build(&airports, &routes, &GraphOptions::default());
        let origin = Origin {
            id: "o".to_string(),
            name: "o".to_string(),
            lat: 51.4,
            lon: -2.6,
            country: "GB".to_string(),
            airports: vec![DepartureAirport {
                code: "HOM".to_string(),
                ground_minutes: 20,
            }],
        };
        let best = Router::new(&graph, RouterConfig::default()).route(&origin);
        (graph, best)
    }

    #[test]
    fn test_query_finds_nearby_and_skips_far() {
        let (graph, best) = fixture();
        let index = SpatialIndex::build(&best, &graph, &SpatialConfig::default()).unwrap();

        let paris = LatLng::new(48.85, 2.35).unwrap().to_cell(Resolution::Six);
        assert_eq!(index.query(paris), vec!["CDG", "ORY"]);

        let pacific = LatLng::new(0.0, -150.0).unwrap().to_cell(Resolution::Six);
        assert!(index.query(pacific).is_empty());
    }

    #[test]
    fn test_coarse_cells_use_centroid_bucket() {
        let (graph, best) = fixture();
        let index = SpatialIndex::build(&best, &graph, &SpatialConfig::default()).unwrap();
        let coarse = LatLng::new(48.85, 2.35).unwrap().to_cell(Resolution::One);
        let bucket = index.bucket_of(coarse);
        assert_eq!(bucket.resolution(), Resolution::Two);
    }

    #[test]
    fn test_invalid_resolution_is_config_error() {
        let (graph, best) = fixture();
        let config = SpatialConfig {
            bucket_resolution: 20,
            ring_radius: 1,
        };
        assert_eq!(
            SpatialIndex::build(&best, &graph, &config).err(),
            Some(ConfigError::InvalidResolution(20))
        );
    }
}
