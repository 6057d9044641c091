//! Type-safe configuration loader using the `config` crate,
//! with manual environment-variable overrides for connection settings.

use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::{env, time::Duration};

use crate::errors::QueryError;
use crate::query::MetroCollection;

/// Top-level settings loaded from `Config.toml` and then overridden
/// (where applicable) by environment variables. Every key has a default,
/// so a missing file yields a working local setup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// MongoDB connection URI
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,

    /// Database holding the metro collections
    #[serde(default = "default_database")]
    pub database: String,

    /// Connect, server-selection and per-operation timeout (e.g. "5s")
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Parameters for the `metro-report` run
    #[serde(default)]
    pub report: ReportSettings,
}

/// What the report binary queries.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportSettings {
    /// Metro area label used for the per-metro listings
    pub metro_area: String,

    /// Count collections to list (distinct areas, per-metro top, overall top)
    pub collections: Vec<String>,

    /// How many records of each listing to log
    pub top_n: u64,

    /// Collection holding metro geometries
    pub geo_collection: String,

    /// `[longitude, latitude]` of the proximity queries
    pub center: [f64; 2],

    /// Distance cap for the proximity query
    pub max_distance_meters: f64,

    /// Result cap for the nearest-N query
    pub near_limit: u64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            metro_area: "Portland, OR--WA".to_string(),
            collections: vec![
                MetroCollection::MetroWord.name().to_string(),
                MetroCollection::MetroOsm.name().to_string(),
            ],
            top_n: 10,
            geo_collection: MetroCollection::Metro.name().to_string(),
            center: [-122.5, 45.5],
            max_distance_meters: 30_000.0,
            near_limit: 2,
        }
    }
}

fn default_mongodb_uri() -> String {
    "mongodb://127.0.0.1:27017".to_string()
}

fn default_database() -> String {
    "geotweet".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Settings {
    /// Load settings from `Config.toml` (if present),
    /// then apply any overrides from these environment variables:
    ///
    /// - `APP__MONGODB_URI` (or the older `GEOTWEET_MONGODB_URI`)
    /// - `APP__DATABASE`
    /// - `APP__TIMEOUT`
    ///
    /// # Errors
    ///
    /// * `QueryError::Config` for unreadable files, malformed values or a bad
    ///   `APP__TIMEOUT`.
    pub fn new() -> Result<Self, QueryError> {
        let cfg = Config::builder()
            .add_source(File::with_name("Config").required(false))
            .build()?;

        let mut settings: Settings = cfg.try_deserialize()?;
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    /// Parse settings from TOML text, without environment overrides.
    pub fn from_toml(toml: &str) -> Result<Self, QueryError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("APP__MONGODB_URI").or_else(|| lookup("GEOTWEET_MONGODB_URI")) {
            self.mongodb_uri = val;
        }
        if let Some(val) = lookup("APP__DATABASE") {
            self.database = val;
        }
        if let Some(val) = lookup("APP__TIMEOUT") {
            self.timeout =
                humantime::parse_duration(&val).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        }
        Ok(())
    }
}
