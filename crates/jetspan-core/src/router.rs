// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Bounded-stop, multi-source Dijkstra over the flight graph.
//!
//! Search nodes are `(airport, legs flown)` rather than plain airports: the
//! same airport reached with fewer legs has more stop budget left, so it is a
//! different state. Every departure airport of the origin seeds the frontier
//! at its ground-access time. The first leg adds the boarding overhead; every
//! later leg adds connection handling plus a stop penalty. Arrival overhead is
//! left to cell assignment, since it depends on where the traveller ends up.

use crate::graph::{AirportId, FlightGraph};
use crate::origin::Origin;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

/// Largest `max_stops` a config may ask for.
pub const MAX_STOPS_LIMIT: u8 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Intermediate stops allowed; `max_stops + 1` flight legs at most.
    pub max_stops: u8,
    pub boarding_minutes: u32,
    pub connection_minutes: u32,
    pub stop_penalty_minutes: u32,
    /// Maximum flown distance over great-circle distance from the primary
    /// departure airport.
    pub circuity_ratio: f64,
    pub time_budget_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_stops: 2,
            boarding_minutes: 90,
            connection_minutes: 90,
            stop_penalty_minutes: 30,
            circuity_ratio: 1.8,
            time_budget_ms: 30_000,
        }
    }
}

/// Cheapest known way to reach one airport from the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestTimeRecord {
    pub airport: String,
    /// Ground access + boarding + legs + connection costs. No arrival overhead.
    pub minutes: u32,
    pub stops: u8,
    /// Departure airport first, this airport last.
    pub path: Vec<String>,
    pub flown_km: f64,
}

impl BestTimeRecord {
    pub fn departure(&self) -> &str {
        self.path.first().map(|s| s.as_str()).unwrap_or(&self.airport)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestTimes {
    records: BTreeMap<String, BestTimeRecord>,
}

impl BestTimes {
    pub fn get(&self, code: &str) -> Option<&BestTimeRecord> {
        self.records.get(code)
    }

    pub fn minutes(&self, code: &str) -> Option<u32> {
        self.records.get(code).map(|r| r.minutes)
    }

    /// Records in airport-code order.
    pub fn iter(&self) -> impl Iterator<Item = &BestTimeRecord> {
        self.records.values()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of reachable airports per stop count.
    pub fn stops_histogram(&self) -> BTreeMap<u8, usize> {
        let mut hist = BTreeMap::new();
        for record in self.records.values() {
            *hist.entry(record.stops).or_default() += 1;
        }
        hist
    }
}

/// Frontier entry. Ordered by (cost, legs, path) and reversed, so the
/// max-heap pops the cheapest state first and breaks ties deterministically.
#[derive(Debug, Clone)]
struct Entry {
    cost: u32,
    legs: u8,
    path: Vec<AirportId>,
    flown_km: f64,
}

impl Entry {
    fn airport(&self) -> AirportId {
        self.path[self.path.len() - 1]
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.legs.cmp(&self.legs))
            .then_with(|| other.path.cmp(&self.path))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

pub struct Router<'g> {
    graph: &'g FlightGraph,
    config: RouterConfig,
}

impl<'g> Router<'g> {
    pub fn new(graph: &'g FlightGraph, config: RouterConfig) -> Self {
        Self { graph, config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn route(&self, origin: &Origin) -> BestTimes {
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.time_budget_ms);

        let mut seeds: BTreeMap<AirportId, u32> = BTreeMap::new();
        let mut primary = None;
        for departure in &origin.airports {
            let Some(id) = self.graph.id(&departure.code) else {
                log::warn!(
                    "Departure airport not in graph — origin={} code={}",
                    origin.id,
                    departure.code
                );
                continue;
            };
            primary.get_or_insert(id);
            let ground = seeds.entry(id).or_insert(departure.ground_minutes);
            *ground = (*ground).min(departure.ground_minutes);
        }
        let Some(primary) = primary else {
            log::warn!("Origin has no usable departure airports — origin={}", origin.id);
            return BestTimes::default();
        };

        let mut heap = BinaryHeap::new();
        let mut best: HashMap<(AirportId, u8), u32> = HashMap::new();
        let mut finalized: HashSet<(AirportId, u8)> = HashSet::new();
        let mut records: BTreeMap<String, BestTimeRecord> = BTreeMap::new();

        for (&id, &ground) in &seeds {
            best.insert((id, 0), ground);
            heap.push(Entry {
                cost: ground,
                legs: 0,
                path: vec![id],
                flown_km: 0.0,
            });
        }

        let mut popped = 0usize;
        let mut rejected_circuity = 0usize;
        while let Some(entry) = heap.pop() {
            if started.elapsed() >= budget {
                log::warn!(
                    "Router time budget exceeded — origin={} budget_ms={} reachable={}",
                    origin.id,
                    self.config.time_budget_ms,
                    records.len()
                );
                break;
            }
            let at = entry.airport();
            if !finalized.insert((at, entry.legs)) {
                continue;
            }
            popped += 1;

            if entry.legs >= 1 {
                let code = &self.graph.airport(at).code;
                if !records.contains_key(code) {
                    records.insert(code.clone(), self.record(&entry));
                }
            }

            // One more leg would exceed the stop budget.
            if entry.legs > self.config.max_stops {
                continue;
            }

            for edge in self.graph.neighbors(at) {
                if entry.path.contains(&edge.to) {
                    continue;
                }
                let Some(legs) = entry.legs.checked_add(1) else {
                    continue;
                };
                let next = (edge.to, legs);
                if finalized.contains(&next) {
                    continue;
                }

                let flown_km = entry.flown_km + edge.distance_km;
                let direct_km = self.graph.distance_km(primary, edge.to);
                if flown_km > self.config.circuity_ratio * direct_km {
                    rejected_circuity += 1;
                    continue;
                }

                let step = if entry.legs == 0 {
                    self.config.boarding_minutes + edge.minutes
                } else {
                    edge.minutes + self.config.connection_minutes + self.config.stop_penalty_minutes
                };
                let cost = entry.cost.saturating_add(step);
                if best.get(&next).is_some_and(|&b| cost > b) {
                    continue;
                }
                best.insert(next, cost);

                let mut path = entry.path.clone();
                path.push(edge.to);
                heap.push(Entry {
                    cost,
                    legs: next.1,
                    path,
                    flown_km,
                });
            }
        }

        log::info!(
            "Routing done — origin={} reachable={} states={} circuity_rejects={} elapsed_ms={}",
            origin.id,
            records.len(),
            popped,
            rejected_circuity,
            started.elapsed().as_millis()
        );
        BestTimes { records }
    }

    fn record(&self, entry: &Entry) -> BestTimeRecord {
        let path: Vec<String> = entry
            .path
            .iter()
            .map(|&id| self.graph.airport(id).code.clone())
            .collect();
        BestTimeRecord {
            airport: path[path.len() - 1].clone(),
            minutes: entry.cost,
            stops: entry.legs - 1,
            path,
            flown_km: entry.flown_km,
        }
    }
}
