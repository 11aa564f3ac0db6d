use crate::graph::FlightGraph;
use crate::origin::Origin;
use crate::router::BestTimes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Denormalised breakdown of one reachable airport, for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableEntry {
    pub path: Vec<String>,
    /// Flight minutes per leg, in path order.
    pub legs: Vec<u32>,
    /// Router cost (no arrival overhead).
    pub total: u32,
    pub stops: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub origin: String,
    pub airports: BTreeMap<String, RouteTableEntry>,
}

impl RouteTable {
    pub fn build(origin: &Origin, best: &BestTimes, graph: &FlightGraph) -> Self {
        let mut airports = BTreeMap::new();
        for record in best.iter() {
            let legs: Option<Vec<u32>> = record
                .path
                .windows(2)
                .map(|pair| graph.leg_minutes(&pair[0], &pair[1]))
                .collect();
            let Some(legs) = legs else {
                log::debug!("Route table skips path with a missing leg — airport={}", record.airport);
                continue;
            };
            airports.insert(
                record.airport.clone(),
                RouteTableEntry {
                    path: record.path.clone(),
                    legs,
                    total: record.minutes,
                    stops: record.stops,
                },
            );
        }
        Self {
            origin: origin.id.clone(),
            airports,
        }
    }

    pub fn get(&self, code: &str) -> Option<&RouteTableEntry> {
        self.airports.get(code)
    }
}
