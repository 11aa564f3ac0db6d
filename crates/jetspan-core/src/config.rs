use crate::assign::AssignConfig;
use crate::export::ExportConfig;
use crate::graph::GraphOptions;
use crate::origin::OverheadTable;
use crate::router::{RouterConfig, MAX_STOPS_LIMIT};
use crate::spatial::SpatialConfig;
use crate::LoadError;
use h3o::Resolution;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Origin '{origin}' has no candidate departure airports")]
    NoDepartureAirports { origin: String },
    #[error("Origin '{origin}' lists departure airport {code}, which is not in the airport directory")]
    UnknownDepartureAirport { origin: String, code: String },
    #[error("Origin '{origin}' has invalid coordinates")]
    InvalidOriginCoordinates { origin: String },
    #[error("Unknown origin: {0}")]
    UnknownOrigin(String),
    #[error("No export resolutions configured")]
    EmptyResolutions,
    #[error("Invalid H3 resolution: {0}")]
    InvalidResolution(u8),
    #[error("Resolution {0} is listed as both base and chunked")]
    DuplicateResolution(u8),
    #[error("Chunk parent resolution {parent} must be coarser than chunked resolution {resolution}")]
    ChunkParentNotCoarser { parent: u8, resolution: u8 },
    #[error("max_stops {value} exceeds the limit of {limit}")]
    TooManyStops { value: u8, limit: u8 },
    #[error("Circuity ratio must be a positive number, got {0}")]
    InvalidCircuityRatio(f64),
    #[error("Ground speed must be a positive number, got {0} km/h")]
    InvalidGroundSpeed(f64),
}

/// Turns a configured resolution number into an H3 resolution.
pub fn resolution(value: u8) -> Result<Resolution, ConfigError> {
    Resolution::try_from(value).map_err(|_| ConfigError::InvalidResolution(value))
}

/// Everything a precompute run is parameterised by. Every field has a
/// default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecomputeConfig {
    pub graph: GraphOptions,
    pub router: RouterConfig,
    pub overheads: OverheadTable,
    pub assign: AssignConfig,
    pub spatial: SpatialConfig,
    pub export: ExportConfig,
}

impl PrecomputeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        crate::read_json(path.as_ref())
    }

    /// Fail-fast checks run before any expensive work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let export = &self.export;
        if export.base_resolutions.is_empty() && export.chunked_resolutions.is_empty() {
            return Err(ConfigError::EmptyResolutions);
        }
        for &res in export.base_resolutions.iter().chain(&export.chunked_resolutions) {
            resolution(res)?;
        }
        if let Some(&dup) = export
            .base_resolutions
            .iter()
            .find(|r| export.chunked_resolutions.contains(r))
        {
            return Err(ConfigError::DuplicateResolution(dup));
        }
        if !export.chunked_resolutions.is_empty() {
            resolution(export.chunk_parent_resolution)?;
        }
        for &res in &export.chunked_resolutions {
            if export.chunk_parent_resolution >= res {
                return Err(ConfigError::ChunkParentNotCoarser {
                    parent: export.chunk_parent_resolution,
                    resolution: res,
                });
            }
        }

        if self.router.max_stops > MAX_STOPS_LIMIT {
            return Err(ConfigError::TooManyStops {
                value: self.router.max_stops,
                limit: MAX_STOPS_LIMIT,
            });
        }
        let ratio = self.router.circuity_ratio;
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(ConfigError::InvalidCircuityRatio(ratio));
        }
        let speed = self.assign.ground_speed_kmh;
        if !(speed.is_finite() && speed > 0.0) {
            return Err(ConfigError::InvalidGroundSpeed(speed));
        }
        resolution(self.spatial.bucket_resolution)?;
        resolution(self.assign.ground_reference_resolution)?;
        Ok(())
    }
}
