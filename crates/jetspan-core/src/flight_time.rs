//! Distance → block-time estimates for a nonstop leg.
//!
//! The banded model evaluates each band on its own, so it is discontinuous at
//! the band edges: 499 km estimates to 105 min while 501 km estimates to 80.
//! Estimates are approximations, not schedule data. `Smoothed` is offered as an
//! opt-in continuous alternative; `Banded` stays the default.

use serde::{Deserialize, Serialize};

/// One distance band: `minutes = km / speed_kmh * 60 + overhead`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedBand {
    /// Exclusive upper bound; the last band is unbounded.
    pub max_km: f64,
    pub speed_kmh: f64,
    pub overhead_minutes: f64,
}

impl SpeedBand {
    fn minutes(&self, distance_km: f64) -> f64 {
        distance_km / self.speed_kmh * 60.0 + self.overhead_minutes
    }
}

pub const BANDS: [SpeedBand; 5] = [
    // regional
    SpeedBand {
        max_km: 500.0,
        speed_kmh: 400.0,
        overhead_minutes: 30.0,
    },
    // short-haul
    SpeedBand {
        max_km: 1500.0,
        speed_kmh: 550.0,
        overhead_minutes: 25.0,
    },
    // medium-haul
    SpeedBand {
        max_km: 4000.0,
        speed_kmh: 700.0,
        overhead_minutes: 25.0,
    },
    // long-haul
    SpeedBand {
        max_km: 8000.0,
        speed_kmh: 800.0,
        overhead_minutes: 25.0,
    },
    // ultra-long
    SpeedBand {
        max_km: f64::INFINITY,
        speed_kmh: 850.0,
        overhead_minutes: 30.0,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightTimeModel {
    /// Independent bands, discontinuous at band edges.
    #[default]
    Banded,
    /// Piecewise-linear through the midpoint of each band-edge jump.
    Smoothed,
}

impl FlightTimeModel {
    pub fn minutes(&self, distance_km: f64) -> u32 {
        let minutes = match self {
            FlightTimeModel::Banded => banded_minutes(distance_km),
            FlightTimeModel::Smoothed => smoothed_minutes(distance_km),
        };
        minutes.round().max(0.0) as u32
    }
}

fn band_for(distance_km: f64) -> &'static SpeedBand {
    BANDS
        .iter()
        .find(|b| distance_km < b.max_km)
        .unwrap_or(&BANDS[BANDS.len() - 1])
}

fn banded_minutes(distance_km: f64) -> f64 {
    band_for(distance_km).minutes(distance_km)
}

/// Value at a band edge: halfway between the band below and the band above.
fn knot(edge: usize) -> (f64, f64) {
    let below = &BANDS[edge];
    let above = &BANDS[edge + 1];
    let km = below.max_km;
    (km, (below.minutes(km) + above.minutes(km)) / 2.0)
}

fn smoothed_minutes(distance_km: f64) -> f64 {
    let mut prev = (0.0, BANDS[0].overhead_minutes);
    for edge in 0..BANDS.len() - 1 {
        let next = knot(edge);
        if distance_km < next.0 {
            let t = (distance_km - prev.0) / (next.0 - prev.0);
            return prev.1 + t * (next.1 - prev.1);
        }
        prev = next;
    }
    let last = &BANDS[BANDS.len() - 1];
    prev.1 + (distance_km - prev.0) / last.speed_kmh * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banded_reference_values() {
        let m = FlightTimeModel::Banded;
        assert_eq!(m.minutes(0.0), 30);
        assert_eq!(m.minutes(400.0), 90);
        assert_eq!(m.minutes(1000.0), 134); // 109.09 + 25
        assert_eq!(m.minutes(5550.0), 441); // 416.25 + 25
        assert_eq!(m.minutes(10000.0), 736); // 705.88 + 30
    }

    #[test]
    fn test_banded_has_known_edge_drop() {
        // Kept on purpose: just above the edge can be cheaper than just below.
        let m = FlightTimeModel::Banded;
        assert!(m.minutes(501.0) < m.minutes(499.0));
    }

    #[test]
    fn test_smoothed_is_continuous_and_monotone() {
        let m = FlightTimeModel::Smoothed;
        let mut last = 0;
        let mut km = 0.0;
        while km < 16000.0 {
            let v = m.minutes(km);
            assert!(v >= last, "non-monotone at {} km: {} < {}", km, v, last);
            last = v;
            km += 25.0;
        }
        for band in &BANDS[..BANDS.len() - 1] {
            let below = smoothed_minutes(band.max_km - 1e-6);
            let above = smoothed_minutes(band.max_km + 1e-6);
            assert!((below - above).abs() < 1e-3, "jump at {}", band.max_km);
        }
    }

    #[test]
    fn test_smoothed_matches_start() {
        assert_eq!(FlightTimeModel::Smoothed.minutes(0.0), 30);
    }

    #[test]
    fn test_smoothed_passes_through_edge_midpoints() {
        // 500 km: regional gives 105, short-haul gives 79.5; halfway is 92.3.
        assert_eq!(FlightTimeModel::Smoothed.minutes(500.0), 92);
        // 250 km sits halfway between the 30 min start and that knot.
        assert_eq!(FlightTimeModel::Smoothed.minutes(250.0), 61);
    }
}
