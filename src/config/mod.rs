#[cfg(feature = "cli")]
pub mod cli;
pub mod file;

use crate::adapters::{duckdb_store, tomtom, weather_api};
use crate::domain::model::{GeoPoint, Location};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_required_field, validate_sql_identifier, validate_url, Validate,
};
use file::{is_unresolved, ConfigFile};
use std::collections::BTreeMap;
use std::time::Duration;

pub const FILE_EXTENSION: &str = "parquet";
pub const FILE_NAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Route points sampled when none are configured.
pub const DEFAULT_ROUTE_POINTS: [&str; 3] = [
    "10.79187,106.68831", // Cach Mang Thang Tam
    "10.78792,106.70215",
    "10.79096,106.71560", // 橋頭附近
];

#[derive(Debug, Clone)]
pub struct TrafficSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub points: Vec<GeoPoint>,
    pub zoom: u8,
    pub timeout_seconds: u64,
    pub output_folder: String,
    pub route_distance_meters: f64,
    pub extra_params: BTreeMap<String, String>,
    pub file_timestamp_format: String,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: tomtom::DEFAULT_BASE_URL.to_string(),
            points: DEFAULT_ROUTE_POINTS
                .iter()
                .filter_map(|p| p.parse().ok())
                .collect(),
            zoom: 10,
            timeout_seconds: 10,
            output_folder: "traffic_data".to_string(),
            route_distance_meters: 5000.0,
            extra_params: BTreeMap::new(),
            file_timestamp_format: FILE_NAME_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub output_folder: String,
    pub timeout_seconds: u64,
    pub units: String,
    pub locations: Vec<Location>,
    pub extra_params: BTreeMap<String, String>,
    pub file_timestamp_format: String,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: weather_api::DEFAULT_BASE_URL.to_string(),
            output_folder: "source_data/weather".to_string(),
            timeout_seconds: 10,
            units: "metric".to_string(),
            locations: Vec::new(),
            extra_params: BTreeMap::new(),
            file_timestamp_format: FILE_NAME_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub database_path: String,
    pub table_name: String,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            database_path: duckdb_store::DEFAULT_DATABASE.to_string(),
            table_name: duckdb_store::DEFAULT_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub traffic: TrafficSettings,
    pub weather: WeatherSettings,
    pub load: LoadSettings,
}

fn secret(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && !is_unresolved(v))
}

impl Settings {
    /// Defaults, then the config file, then environment variables from
    /// `env`. Command-line overrides are applied by the caller afterwards.
    pub fn resolve(file: Option<ConfigFile>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(file) = file {
            settings.apply_file(file);
        }
        settings.apply_env(env)?;

        Ok(settings)
    }

    /// `.env` 已由 main 載入，這裡直接讀取行程環境變數
    pub fn from_env(file: Option<ConfigFile>) -> Result<Self> {
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(traffic) = file.traffic {
            let t = &mut self.traffic;
            t.api_key = secret(traffic.api_key).or(t.api_key.take());
            if let Some(base_url) = traffic.base_url {
                t.base_url = base_url;
            }
            if let Some(points) = traffic.points {
                t.points = points;
            }
            t.zoom = traffic.zoom.unwrap_or(t.zoom);
            t.timeout_seconds = traffic.timeout_seconds.unwrap_or(t.timeout_seconds);
            if let Some(folder) = traffic.output_folder {
                t.output_folder = folder;
            }
            t.route_distance_meters = traffic
                .route_distance_meters
                .unwrap_or(t.route_distance_meters);
            if let Some(extra) = traffic.extra_params {
                t.extra_params = extra;
            }
        }

        if let Some(weather) = file.weather {
            let w = &mut self.weather;
            w.api_key = secret(weather.api_key).or(w.api_key.take());
            if let Some(base_url) = weather.base_url {
                w.base_url = base_url;
            }
            if let Some(folder) = weather.output_folder {
                w.output_folder = folder;
            }
            w.timeout_seconds = weather.timeout_seconds.unwrap_or(w.timeout_seconds);
            if let Some(units) = weather.units {
                w.units = units;
            }
            if let Some(locations) = weather.locations {
                w.locations = locations;
            }
            if let Some(extra) = weather.extra_params {
                w.extra_params = extra;
            }
        }

        if let Some(load) = file.load {
            if let Some(database) = load.database {
                self.load.database_path = database;
            }
            if let Some(table) = load.table {
                self.load.table_name = table;
            }
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = secret(env("TOMTOM_API_KEY")) {
            self.traffic.api_key = Some(key);
        }
        if let Some(folder) = env("TRAFFIC_OUTPUT_FOLDER") {
            self.traffic.output_folder = folder;
        }
        if let Some(key) = secret(env("WEATHER_API_KEY")) {
            self.weather.api_key = Some(key);
        }
        if let Some(base_url) = env("WEATHER_API_BASE_URL") {
            self.weather.base_url = base_url;
        }
        if let Some(folder) = env("WEATHER_OUTPUT_FOLDER") {
            self.weather.output_folder = folder;
        }
        if let Some(timeout) = env("WEATHER_API_TIMEOUT_SECONDS") {
            self.weather.timeout_seconds =
                timeout
                    .trim()
                    .parse()
                    .map_err(|_| EtlError::InvalidConfigValueError {
                        field: "WEATHER_API_TIMEOUT_SECONDS".to_string(),
                        value: timeout.clone(),
                        reason: "Must be a whole number of seconds".to_string(),
                    })?;
        }
        Ok(())
    }
}

impl Validate for TrafficSettings {
    fn validate(&self) -> Result<()> {
        validate_required_field("TOMTOM_API_KEY", &self.api_key)?;
        validate_url("traffic.base_url", &self.base_url)?;
        validate_path("traffic.output_folder", &self.output_folder)?;
        validate_positive_number("traffic.timeout_seconds", self.timeout_seconds, 1)?;
        validate_range("traffic.zoom", self.zoom, 0, 22)?;

        if self.points.is_empty() {
            return Err(EtlError::ConfigValidationError {
                field: "traffic.points".to_string(),
                message: "No route points configured".to_string(),
            });
        }

        if !self.route_distance_meters.is_finite() {
            return Err(EtlError::InvalidConfigValueError {
                field: "traffic.route_distance_meters".to_string(),
                value: self.route_distance_meters.to_string(),
                reason: "Route distance must be a finite number".to_string(),
            });
        }

        tracing::debug!("✅ Traffic configuration validation passed");
        Ok(())
    }
}

impl Validate for WeatherSettings {
    fn validate(&self) -> Result<()> {
        validate_url("weather.base_url", &self.base_url)?;
        validate_path("weather.output_folder", &self.output_folder)?;
        validate_positive_number("weather.timeout_seconds", self.timeout_seconds, 1)?;
        validate_non_empty_string("weather.units", &self.units)?;
        Ok(())
    }
}

impl Validate for LoadSettings {
    fn validate(&self) -> Result<()> {
        validate_path("load.database", &self.database_path)?;
        validate_sql_identifier("load.table", &self.table_name)?;
        Ok(())
    }
}

impl ConfigProvider for TrafficSettings {
    fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    fn api_base_url(&self) -> &str {
        &self.base_url
    }

    fn route_points(&self) -> &[GeoPoint] {
        &self.points
    }

    fn zoom(&self) -> u8 {
        self.zoom
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn extra_params(&self) -> &BTreeMap<String, String> {
        &self.extra_params
    }

    fn route_distance_meters(&self) -> f64 {
        self.route_distance_meters
    }

    fn file_timestamp_format(&self) -> &str {
        &self.file_timestamp_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(None, env_from(&[])).unwrap();

        assert_eq!(settings.traffic.points.len(), 3);
        assert_eq!(settings.traffic.zoom, 10);
        assert_eq!(settings.traffic.output_folder, "traffic_data");
        assert_eq!(settings.traffic.route_distance_meters, 5000.0);
        assert_eq!(settings.weather.output_folder, "source_data/weather");
        assert_eq!(settings.load.database_path, "traffic_data.duckdb");
        assert_eq!(settings.load.table_name, "traffic_data");
        assert!(settings.traffic.api_key.is_none());
    }

    #[test]
    fn test_missing_api_key_fails_validation() {
        let settings = Settings::resolve(None, env_from(&[])).unwrap();
        assert!(matches!(
            settings.traffic.validate(),
            Err(EtlError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile::from_toml_str(
            "[traffic]\noutput_folder = \"from_file\"\napi_key = \"file-key\"\nzoom = 14\n",
        )
        .unwrap();
        let settings = Settings::resolve(
            Some(file),
            env_from(&[
                ("TRAFFIC_OUTPUT_FOLDER", "from_env"),
                ("WEATHER_API_TIMEOUT_SECONDS", "25"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.traffic.output_folder, "from_env");
        assert_eq!(settings.traffic.api_key.as_deref(), Some("file-key"));
        assert_eq!(settings.traffic.zoom, 14);
        assert_eq!(settings.weather.timeout_seconds, 25);
        assert!(settings.traffic.validate().is_ok());
    }

    #[test]
    fn test_unresolved_key_counts_as_missing() {
        let file = ConfigFile::from_toml_str(
            "[traffic]\napi_key = \"${TRAFFIC_ETL_SURELY_UNSET_VAR}\"\n",
        )
        .unwrap();
        let settings = Settings::resolve(Some(file), env_from(&[])).unwrap();
        assert!(settings.traffic.api_key.is_none());
    }

    #[test]
    fn test_invalid_timeout_env() {
        let result = Settings::resolve(None, env_from(&[("WEATHER_API_TIMEOUT_SECONDS", "ten")]));
        assert!(matches!(
            result,
            Err(EtlError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_validation_rules() {
        let mut traffic = TrafficSettings {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        assert!(traffic.validate().is_ok());

        traffic.points.clear();
        assert!(traffic.validate().is_err());

        let traffic = TrafficSettings {
            api_key: Some("k".to_string()),
            zoom: 23,
            ..Default::default()
        };
        assert!(traffic.validate().is_err());

        let load = LoadSettings {
            table_name: "drop table".to_string(),
            ..Default::default()
        };
        assert!(load.validate().is_err());
        assert!(WeatherSettings::default().validate().is_ok());
    }
}
