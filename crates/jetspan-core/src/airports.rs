use crate::diagnostics::Diagnostics;
use crate::geo;
use crate::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityClass {
    Large,
    #[default]
    Medium,
    Small,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub code: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    pub facility: FacilityClass,
}

/// One value of the `airports.json` map; the code is the map key.
#[derive(Debug, Clone, Deserialize)]
struct AirportRecord {
    #[serde(default)]
    name: String,
    lat: f64,
    lng: f64,
    #[serde(default)]
    country: String,
    #[serde(rename = "type", default)]
    facility: FacilityClass,
}

/// The subset of OurAirports `airports.csv` columns we read.
#[derive(Debug, Deserialize)]
struct OurAirportsRow {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    latitude_deg: f64,
    longitude_deg: f64,
    #[serde(default)]
    iso_country: String,
    #[serde(default)]
    iata_code: String,
}

/// Immutable airport set keyed by code.
#[derive(Debug, Clone, Default)]
pub struct AirportDirectory {
    airports: BTreeMap<String, Airport>,
    pub diagnostics: Diagnostics,
}

impl AirportDirectory {
    /// Builds a directory, dropping airports with unusable coordinates.
    pub fn from_airports(airports: impl IntoIterator<Item = Airport>) -> Self {
        let mut directory = Self::default();
        for airport in airports {
            if !geo::is_valid_coordinate(airport.lat, airport.lon) {
                directory.diagnostics.invalid_airports += 1;
                directory.diagnostics.sample(format!(
                    "airport {} at ({}, {})",
                    airport.code, airport.lat, airport.lon
                ));
                continue;
            }
            directory.airports.insert(airport.code.clone(), airport);
        }
        directory
    }

    /// Loads the `{ code: { name, lat, lng, country, type } }` JSON snapshot.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let records: BTreeMap<String, AirportRecord> = crate::read_json(path.as_ref())?;
        Ok(Self::from_records(records))
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let records: BTreeMap<String, AirportRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    fn from_records(records: BTreeMap<String, AirportRecord>) -> Self {
        Self::from_airports(records.into_iter().map(|(code, r)| Airport {
            code,
            name: r.name,
            lat: r.lat,
            lon: r.lng,
            country: r.country,
            facility: r.facility,
        }))
    }

    /// Reads an OurAirports `airports.csv` export, keeping large and medium
    /// airports that carry an IATA code.
    pub fn from_ourairports_csv<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let mut airports = Vec::new();

        for row in rdr.deserialize::<OurAirportsRow>() {
            let row = row?;
            let facility = match row.kind.as_str() {
                "large_airport" => FacilityClass::Large,
                "medium_airport" => FacilityClass::Medium,
                _ => continue,
            };
            let code = row.iata_code.trim();
            if code.is_empty() {
                continue;
            }
            airports.push(Airport {
                code: code.to_uppercase(),
                name: row.name,
                lat: row.latitude_deg,
                lon: row.longitude_deg,
                country: row.iso_country,
                facility,
            });
        }

        Ok(Self::from_airports(airports))
    }

    /// Opens an OurAirports `airports.csv` file.
    pub fn load_ourairports<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ourairports_csv(BufReader::new(file)).map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, code: &str) -> Option<&Airport> {
        self.airports.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.airports.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// Airports in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Airport> {
        self.airports.values()
    }

    /// Airport counts per country, largest first (ties by country code).
    pub fn country_counts(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for airport in self.airports.values() {
            *counts.entry(airport.country.as_str()).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(c, n)| (c.to_string(), n))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}
