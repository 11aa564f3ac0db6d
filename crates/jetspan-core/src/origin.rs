//! Origins and the arrival-overhead policy that depends on them.

use crate::airports::{Airport, AirportDirectory, FacilityClass};
use crate::config::ConfigError;
use crate::geo;
use crate::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A candidate departure airport and the fixed ground-access time to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureAirport {
    pub code: String,
    pub ground_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Origin {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    /// Ordered; the first one present in the flight graph is the primary
    /// departure airport used for circuity checks.
    pub airports: Vec<DepartureAirport>,
}

#[derive(Debug, Deserialize)]
struct OriginRecord {
    #[serde(default)]
    name: String,
    lat: f64,
    lng: f64,
    #[serde(default)]
    country: String,
    #[serde(default)]
    airports: Vec<DepartureAirport>,
}

impl Origin {
    /// Fails on taxonomy-(b) problems: no departure airports, a departure
    /// airport the directory does not know, or unusable coordinates.
    pub fn validate(&self, airports: &AirportDirectory) -> Result<(), ConfigError> {
        if !geo::is_valid_coordinate(self.lat, self.lon) {
            return Err(ConfigError::InvalidOriginCoordinates {
                origin: self.id.clone(),
            });
        }
        if self.airports.is_empty() {
            return Err(ConfigError::NoDepartureAirports {
                origin: self.id.clone(),
            });
        }
        if let Some(missing) = self.airports.iter().find(|d| !airports.contains(&d.code)) {
            return Err(ConfigError::UnknownDepartureAirport {
                origin: self.id.clone(),
                code: missing.code.clone(),
            });
        }
        Ok(())
    }

    pub fn distance_km_to(&self, lat: f64, lon: f64) -> f64 {
        geo::haversine_km(self.lat, self.lon, lat, lon)
    }
}

/// All configured origins, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct OriginSet {
    origins: BTreeMap<String, Origin>,
}

impl OriginSet {
    /// Loads `origins.json`: `{ id: { name, lat, lng, country, airports: [...] } }`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let records: BTreeMap<String, OriginRecord> = crate::read_json(path.as_ref())?;
        Ok(Self::from_records(records))
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let records: BTreeMap<String, OriginRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    fn from_records(records: BTreeMap<String, OriginRecord>) -> Self {
        let origins = records
            .into_iter()
            .map(|(id, r)| {
                let origin = Origin {
                    id: id.clone(),
                    name: r.name,
                    lat: r.lat,
                    lon: r.lng,
                    country: r.country,
                    airports: r.airports,
                };
                (id, origin)
            })
            .collect();
        Self { origins }
    }

    pub fn insert(&mut self, origin: Origin) {
        self.origins.insert(origin.id.clone(), origin);
    }

    pub fn get(&self, id: &str) -> Result<&Origin, ConfigError> {
        self.origins
            .get(id)
            .ok_or_else(|| ConfigError::UnknownOrigin(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.origins.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Origin> {
        self.origins.values()
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Validates every origin, stopping at the first failure.
    pub fn validate(&self, airports: &AirportDirectory) -> Result<(), ConfigError> {
        for origin in self.origins.values() {
            origin.validate(airports)?;
        }
        Ok(())
    }
}

/// A named group of countries treated as "regional" for arrival overhead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalBloc {
    pub name: String,
    pub countries: BTreeSet<String>,
}

impl RegionalBloc {
    pub fn new(name: &str, countries: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            countries: countries.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn contains(&self, country: &str) -> bool {
        self.countries.contains(country)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalClass {
    Domestic,
    Regional,
    International,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityBias {
    pub large: u32,
    pub medium: u32,
    pub small: u32,
}

impl FacilityBias {
    pub fn minutes(&self, facility: FacilityClass) -> u32 {
        match facility {
            FacilityClass::Large => self.large,
            FacilityClass::Medium => self.medium,
            FacilityClass::Small => self.small,
        }
    }
}

/// Arrival overhead, added once per final leg in assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverheadTable {
    pub domestic_minutes: u32,
    pub regional_minutes: u32,
    pub international_minutes: u32,
    pub facility_bias: FacilityBias,
    pub regional_blocs: Vec<RegionalBloc>,
}

impl Default for OverheadTable {
    fn default() -> Self {
        Self {
            domestic_minutes: 30,
            regional_minutes: 45,
            international_minutes: 60,
            facility_bias: FacilityBias::default(),
            regional_blocs: default_blocs(),
        }
    }
}

fn default_blocs() -> Vec<RegionalBloc> {
    vec![
        RegionalBloc::new(
            "schengen",
            &[
                "AT", "BE", "BG", "CH", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GR", "HR", "HU",
                "IS", "IT", "LI", "LT", "LU", "LV", "MT", "NL", "NO", "PL", "PT", "RO", "SE", "SI",
                "SK",
            ],
        ),
        RegionalBloc::new("common-travel-area", &["GB", "IE"]),
    ]
}

impl OverheadTable {
    /// An unknown (empty) country on either side is never domestic.
    pub fn classify(&self, origin_country: &str, airport_country: &str) -> ArrivalClass {
        if origin_country.is_empty() || airport_country.is_empty() {
            return ArrivalClass::International;
        }
        if origin_country == airport_country {
            return ArrivalClass::Domestic;
        }
        let shared = self
            .regional_blocs
            .iter()
            .any(|b| b.contains(origin_country) && b.contains(airport_country));
        if shared {
            ArrivalClass::Regional
        } else {
            ArrivalClass::International
        }
    }

    pub fn arrival_minutes(&self, origin_country: &str, airport: &Airport) -> u32 {
        let base = match self.classify(origin_country, &airport.country) {
            ArrivalClass::Domestic => self.domestic_minutes,
            ArrivalClass::Regional => self.regional_minutes,
            ArrivalClass::International => self.international_minutes,
        };
        base + self.facility_bias.minutes(airport.facility)
    }
}
