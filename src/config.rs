use serde::Deserialize;
use std::{fs::read_to_string, path::Path, path::PathBuf};

use crate::{
    analysis::predicate::SpatialPredicate,
    error::{IgtError, Result},
    sample_data::province_name,
    store::ConflictPolicy,
};

pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Persist the collections to PostGIS at the end of the pipeline.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub if_exists: ConflictPolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 5432,
            database: "igt_db".to_string(),
            user: "postgres".to_string(),
            password: "admin123".to_string(),
            if_exists: ConflictPolicy::Replace,
        }
    }
}

impl DatabaseConfig {
    /// Connection string for GDAL's PostgreSQL driver.
    pub fn gdal_connection_string(&self) -> String {
        format!(
            "PG:host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub target_province: String,
    /// Distance threshold of the centroid network. Only logged, the network phase is not run.
    pub connection_radius_km: f64,
    pub place_name: String,
    /// Predicate of the spatial query and the pairwise match count.
    pub operation: SpatialPredicate,
    /// Falls back to the GOOGLE_MAPS_API_KEY environment variable.
    pub google_api_key: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_province: "JK".to_string(),
            connection_radius_km: 100.0,
            place_name: default_place_name("JK").to_string(),
            operation: SpatialPredicate::Intersects,
            google_api_key: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DataPaths {
    pub provinces: Option<PathBuf>,
    /// Layer inside a multi-layer file such as a GeoPackage.
    pub provinces_layer: Option<String>,
    pub land_use: Option<PathBuf>,
    pub land_use_layer: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub use_sample_data: bool,
    pub database: DatabaseConfig,
    pub analysis: AnalysisConfig,
    pub data_paths: DataPaths,
    /// Directory for exported GeoJSON and GeoPackage files. Nothing is exported when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_sample_data: true,
            database: DatabaseConfig::default(),
            analysis: AnalysisConfig::default(),
            data_paths: DataPaths::default(),
            output_dir: None,
        }
    }
}

pub fn default_place_name(province_code: &str) -> &'static str {
    match province_code {
        "JI" => "Surabaya, Indonesia",
        _ => "Jakarta, Indonesia",
    }
}

impl Config {
    /// Parse a YAML config. Omitted keys, including keys of nested sections, keep their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|err| IgtError::InvalidArgument(format!("Invalid config, {}", err)))
    }

    pub fn from_yaml_file(filepath: &Path) -> Result<Self> {
        if !filepath.exists() {
            return Err(IgtError::InvalidArgument(format!(
                "Config file {:?} not found",
                filepath
            )));
        }
        let contents = read_to_string(filepath).map_err(|err| {
            IgtError::InvalidArgument(format!("Could not read config file {:?}, {}", filepath, err))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Apply command line flags. A province given on the command line also selects its place name.
    pub fn apply_overrides(&mut self, province: Option<&str>, sample_data: bool) {
        if let Some(province) = province {
            self.analysis.target_province = province.to_string();
            self.analysis.place_name = default_place_name(province).to_string();
        }
        if sample_data {
            self.use_sample_data = true;
        }
    }

    pub fn google_api_key(&self) -> Option<String> {
        self.analysis
            .google_api_key
            .clone()
            .or_else(|| std::env::var(GOOGLE_API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.analysis.connection_radius_km > 0.0) {
            return Err(IgtError::InvalidArgument(format!(
                "analysis.connection_radius_km must be positive, got {}",
                self.analysis.connection_radius_km
            )));
        }
        if self.use_sample_data {
            if province_name(&self.analysis.target_province).is_none() {
                return Err(IgtError::InvalidArgument(format!(
                    "Unknown province code '{}' for sample data",
                    self.analysis.target_province
                )));
            }
        } else if self.data_paths.provinces.is_none() || self.data_paths.land_use.is_none() {
            return Err(IgtError::InvalidArgument(
                "Real data loading not configured, set data_paths.provinces and data_paths.land_use or use_sample_data"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
