//! Randomised checks of routing and assignment invariants on seeded graphs.

use h3o::{CellIndex, LatLng, Resolution};
use jetspan_core::geo;
use jetspan_core::origin::{DepartureAirport, OverheadTable};
use jetspan_core::{
    Airport, AirportDirectory, AssignConfig, AssignmentEngine, BestTimes, CellAssignment,
    FacilityClass, FlightGraph, GraphOptions, GroundTable, Origin, RouteDirectory, Router,
    RouterConfig, SpatialConfig, SpatialIndex,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct World {
    graph: FlightGraph,
    origin: Origin,
}

fn random_world(seed: u64) -> World {
    let mut rng = StdRng::seed_from_u64(seed);
    let airports: Vec<Airport> = (0..40)
        .map(|i| Airport {
            code: format!("A{:02}", i),
            name: String::new(),
            lat: rng.gen_range(38.0..58.0),
            lon: rng.gen_range(-10.0..25.0),
            country: if i % 3 == 0 { "GB" } else { "DE" }.to_string(),
            facility: FacilityClass::Medium,
        })
        .collect();

    let mut routes = RouteDirectory::new();
    for a in &airports {
        for b in &airports {
            if a.code != b.code && rng.gen_bool(0.08) {
                routes.insert(&a.code, &b.code);
            }
        }
    }

    let home = &airports[0];
    let origin = Origin {
        id: format!("seed{}", seed),
        name: String::new(),
        lat: home.lat + 0.2,
        lon: home.lon,
        country: "GB".to_string(),
        airports: vec![
            DepartureAirport {
                code: airports[0].code.clone(),
                ground_minutes: 30,
            },
            DepartureAirport {
                code: airports[1].code.clone(),
                ground_minutes: 120,
            },
        ],
    };
    let directory = AirportDirectory::from_airports(airports);
    World {
        graph: FlightGraph::build(&directory, &routes, &GraphOptions::default()),
        origin,
    }
}

fn route(world: &World, config: RouterConfig) -> BestTimes {
    Router::new(&world.graph, config).route(&world.origin)
}

fn sample_cells(seed: u64, count: usize) -> Vec<CellIndex> {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    (0..count)
        .map(|_| {
            LatLng::new(rng.gen_range(38.0..58.0), rng.gen_range(-10.0..25.0))
                .unwrap()
                .to_cell(Resolution::Five)
        })
        .collect()
}

#[test]
fn test_relaxing_stop_cap_never_increases_cost() {
    for seed in 0..8 {
        let world = random_world(seed);
        for k in 0..3u8 {
            let tight = route(&world, RouterConfig { max_stops: k, ..RouterConfig::default() });
            let loose = route(&world, RouterConfig { max_stops: k + 1, ..RouterConfig::default() });
            for record in tight.iter() {
                let relaxed = loose
                    .minutes(&record.airport)
                    .unwrap_or_else(|| panic!("seed {} k {}: {} lost", seed, k, record.airport));
                assert!(relaxed <= record.minutes, "seed {} k {} {}", seed, k, record.airport);
            }
            assert!(loose.len() >= tight.len());
        }
    }
}

#[test]
fn test_paths_respect_circuity_and_stop_budget() {
    for seed in 0..8 {
        let world = random_world(seed);
        let config = RouterConfig::default();
        let best = route(&world, config.clone());
        let primary = world.graph.airport_by_code(&world.origin.airports[0].code).unwrap();

        for record in best.iter() {
            assert!(record.stops <= config.max_stops);
            assert_eq!(record.path.len(), record.stops as usize + 2);

            let flown: f64 = record
                .path
                .windows(2)
                .map(|pair| {
                    let a = world.graph.airport_by_code(&pair[0]).unwrap();
                    let b = world.graph.airport_by_code(&pair[1]).unwrap();
                    geo::haversine_km(a.lat, a.lon, b.lat, b.lon)
                })
                .sum();
            let end = world.graph.airport_by_code(&record.airport).unwrap();
            let direct = geo::haversine_km(primary.lat, primary.lon, end.lat, end.lon);
            assert!(
                flown <= config.circuity_ratio * direct + 1e-6,
                "seed {}: {:?} flies {:.0} km for {:.0} km",
                seed,
                record.path,
                flown,
                direct
            );

            // Every leg exists in the graph.
            for pair in record.path.windows(2) {
                assert!(world.graph.leg_minutes(&pair[0], &pair[1]).is_some());
            }
        }
    }
}

#[test]
fn test_routing_is_deterministic() {
    let world = random_world(42);
    let a = route(&world, RouterConfig::default());
    let b = route(&world, RouterConfig::default());
    assert_eq!(a, b);
}

#[test]
fn test_assignment_is_minimal_and_index_matches_scan() {
    let overheads = OverheadTable::default();
    let assign_config = AssignConfig::default();
    let ground = GroundTable::new(Resolution::Six);

    for seed in 0..4 {
        let world = random_world(seed);
        let best = route(&world, RouterConfig::default());
        let index = SpatialIndex::build(&best, &world.graph, &SpatialConfig::default()).unwrap();
        let engine = AssignmentEngine::new(
            &world.origin,
            &world.graph,
            &best,
            &index,
            &ground,
            &overheads,
            assign_config.clone(),
        )
        .unwrap();

        for cell in sample_cells(seed, 150) {
            let centroid = LatLng::from(cell);
            let origin_km = world.origin.distance_km_to(centroid.lat(), centroid.lng());
            let exhaustive = engine.assign_exhaustive(cell);
            let indexed = engine.assign(cell);

            if origin_km < assign_config.min_fly_distance_km {
                assert!(exhaustive.as_ref().is_some_and(CellAssignment::is_drive));
                assert_eq!(indexed, exhaustive);
                continue;
            }

            // Brute force over every option the engine may consider.
            let mut options = Vec::new();
            for record in best.iter() {
                let airport = world.graph.airport_by_code(&record.airport).unwrap();
                let km = geo::haversine_km(airport.lat, airport.lon, centroid.lat(), centroid.lng());
                if km > assign_config.max_airport_ground_km {
                    continue;
                }
                options.push(
                    record.minutes
                        + overheads.arrival_minutes(&world.origin.country, airport)
                        + geo::estimate_ground_minutes(km, assign_config.ground_speed_kmh),
                );
            }
            if origin_km <= assign_config.drive_radius_km {
                options.push(geo::estimate_ground_minutes(origin_km, assign_config.ground_speed_kmh));
            }

            match (&exhaustive, options.iter().min()) {
                (Some(found), Some(&min)) => assert_eq!(found.total(), min, "seed {} cell {}", seed, cell),
                (None, None) => {}
                (found, min) => panic!("seed {} cell {}: {:?} vs {:?}", seed, cell, found, min),
            }

            // The index may only miss airports outside its ring.
            match (&indexed, &exhaustive) {
                (Some(i), Some(e)) => {
                    assert!(i.total() >= e.total());
                    let visible = match e.arrival() {
                        Some(code) => index.query(cell).contains(&code),
                        None => true,
                    };
                    if visible {
                        assert_eq!(i, e, "seed {} cell {}", seed, cell);
                    }
                }
                (None, Some(e)) => {
                    let code = e.arrival().unwrap_or_default();
                    assert!(!index.query(cell).contains(&code));
                }
                (Some(i), None) => panic!("index found {:?} where a full scan found nothing", i),
                (None, None) => {}
            }
        }
    }
}
