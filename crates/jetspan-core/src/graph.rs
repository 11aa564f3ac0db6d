//! Directed flight-connectivity graph.
//!
//! Nodes are airports, edges are nonstop services weighted by estimated (or
//! measured) block minutes. Built once, read-only afterwards.

use crate::airports::{Airport, AirportDirectory};
use crate::diagnostics::Diagnostics;
use crate::flight_time::FlightTimeModel;
use crate::geo;
use crate::routes::RouteDirectory;
use crate::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Dense airport index. Ids follow airport-code order, so comparing ids
/// compares codes.
pub type AirportId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub to: AirportId,
    pub minutes: u32,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    pub model: FlightTimeModel,
    /// Add B→A for every served A→B that lacks it.
    pub symmetric_routes: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            model: FlightTimeModel::Banded,
            symmetric_routes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub airports: usize,
    pub connected_airports: usize,
    pub edges: usize,
}

#[derive(Debug, Clone)]
pub struct FlightGraph {
    airports: Vec<Airport>,
    index: HashMap<String, AirportId>,
    adjacency: Vec<Vec<Edge>>,
    pub diagnostics: Diagnostics,
}

impl FlightGraph {
    pub fn build(airports: &AirportDirectory, routes: &RouteDirectory, options: &GraphOptions) -> Self {
        Self::build_with_durations(airports, routes, options, &BTreeMap::new())
    }

    /// Like [`FlightGraph::build`], but `durations` replaces the estimate for
    /// the listed `(from, to)` legs.
    pub fn build_with_durations(
        airports: &AirportDirectory,
        routes: &RouteDirectory,
        options: &GraphOptions,
        durations: &BTreeMap<(String, String), u32>,
    ) -> Self {
        let airports: Vec<Airport> = airports.iter().cloned().collect();
        let index: HashMap<String, AirportId> = airports
            .iter()
            .enumerate()
            .map(|(i, a)| (a.code.clone(), i))
            .collect();

        let mut diagnostics = Diagnostics::new();
        let mut edges: Vec<BTreeMap<AirportId, Edge>> = vec![BTreeMap::new(); airports.len()];

        for (from, to) in routes.pairs() {
            let (Some(&a), Some(&b)) = (index.get(from), index.get(to)) else {
                diagnostics.unknown_route_endpoints += 1;
                diagnostics.sample(format!("route {}->{}", from, to));
                continue;
            };
            let distance_km = distance_between(&airports[a], &airports[b]);
            edges[a].insert(
                b,
                Edge {
                    to: b,
                    minutes: options.model.minutes(distance_km),
                    distance_km,
                },
            );
        }

        if options.symmetric_routes {
            let mut reverse = Vec::new();
            for (a, out) in edges.iter().enumerate() {
                for edge in out.values() {
                    if !edges[edge.to].contains_key(&a) {
                        reverse.push((edge.to, Edge { to: a, ..*edge }));
                    }
                }
            }
            for (from, edge) in reverse {
                edges[from].insert(edge.to, edge);
            }
        }

        for ((from, to), minutes) in durations {
            let leg = match (index.get(from.as_str()), index.get(to.as_str())) {
                (Some(&a), Some(&b)) => edges[a].get_mut(&b),
                _ => None,
            };
            match leg {
                Some(edge) => edge.minutes = *minutes,
                None => {
                    diagnostics.unknown_leg_durations += 1;
                    diagnostics.sample(format!("duration {}->{}", from, to));
                }
            }
        }

        let adjacency: Vec<Vec<Edge>> = edges
            .into_iter()
            .map(|out| out.into_values().collect())
            .collect();

        let graph = Self {
            airports,
            index,
            adjacency,
            diagnostics,
        };
        let stats = graph.stats();
        log::info!(
            "Flight graph built — airports={} connected={} edges={} dropped_routes={}",
            stats.airports,
            stats.connected_airports,
            stats.edges,
            graph.diagnostics.unknown_route_endpoints
        );
        graph
    }

    pub fn id(&self, code: &str) -> Option<AirportId> {
        self.index.get(code).copied()
    }

    pub fn airport(&self, id: AirportId) -> &Airport {
        &self.airports[id]
    }

    pub fn airport_by_code(&self, code: &str) -> Option<&Airport> {
        self.id(code).map(|id| &self.airports[id])
    }

    pub fn airports(&self) -> &[Airport] {
        &self.airports
    }

    /// Outgoing edges, ordered by destination id.
    pub fn neighbors(&self, id: AirportId) -> &[Edge] {
        &self.adjacency[id]
    }

    pub fn edge(&self, from: AirportId, to: AirportId) -> Option<&Edge> {
        let out = &self.adjacency[from];
        out.binary_search_by_key(&to, |e| e.to).ok().map(|i| &out[i])
    }

    pub fn leg_minutes(&self, from: &str, to: &str) -> Option<u32> {
        let (a, b) = (self.id(from)?, self.id(to)?);
        self.edge(a, b).map(|e| e.minutes)
    }

    pub fn distance_km(&self, a: AirportId, b: AirportId) -> f64 {
        distance_between(&self.airports[a], &self.airports[b])
    }

    pub fn airport_count(&self) -> usize {
        self.airports.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|out| out.len()).sum()
    }

    pub fn stats(&self) -> GraphStats {
        let mut connected = vec![false; self.airports.len()];
        for (from, out) in self.adjacency.iter().enumerate() {
            if !out.is_empty() {
                connected[from] = true;
            }
            for edge in out {
                connected[edge.to] = true;
            }
        }
        GraphStats {
            airports: self.airports.len(),
            connected_airports: connected.iter().filter(|c| **c).count(),
            edges: self.edge_count(),
        }
    }
}

/// Reads measured leg durations: `{ "LHR": { "JFK": 425 } }`.
pub fn load_leg_durations<P: AsRef<Path>>(
    path: P,
) -> Result<BTreeMap<(String, String), u32>, LoadError> {
    let raw: BTreeMap<String, BTreeMap<String, u32>> = crate::read_json(path.as_ref())?;
    Ok(raw
        .into_iter()
        .flat_map(|(from, legs)| {
            legs.into_iter()
                .map(move |(to, minutes)| ((from.clone(), to), minutes))
        })
        .collect())
}

fn distance_between(a: &Airport, b: &Airport) -> f64 {
    geo::haversine_km(a.lat, a.lon, b.lat, b.lon)
}
