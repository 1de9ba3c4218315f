use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_range;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 地理座標點 (緯度, 經度，單位：度)
///
/// Keeps the text it was parsed from, so `10.79096,106.71560` is sent to
/// the API and used in file names exactly as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    text: String,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        Self::with_text(lat, lon, format!("{},{}", lat, lon))
    }

    fn with_text(lat: f64, lon: f64, text: String) -> Result<Self> {
        validate_range("latitude", lat, -90.0, 90.0)?;
        validate_range("longitude", lon, -180.0, 180.0)?;
        Ok(Self { lat, lon, text })
    }

    /// 檔名用的識別字：`.` 換成 `_`，`,` 換成 `-`
    pub fn file_identifier(&self) -> String {
        self.text.replace('.', "_").replace(',', "-")
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for GeoPoint {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| EtlError::InvalidConfigValueError {
            field: "point".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| invalid("Expected 'lat,lon'"))?;
        let (lat_text, lon_text) = (lat.trim(), lon.trim());
        let lat: f64 = lat_text
            .parse()
            .map_err(|_| invalid("Latitude is not a number"))?;
        let lon: f64 = lon_text
            .parse()
            .map_err(|_| invalid("Longitude is not a number"))?;

        Self::with_text(lat, lon, format!("{},{}", lat_text, lon_text))
    }
}

impl TryFrom<String> for GeoPoint {
    type Error = EtlError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<GeoPoint> for String {
    fn from(point: GeoPoint) -> Self {
        point.to_string()
    }
}

/// 天氣抽取的地點
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lon: f64, name: Option<String>) -> Self {
        Self { lat, lon, name }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("lat{}_lon{}", self.lat, self.lon))
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// 單一路段的車流資料
///
/// Units as reported by TomTom: speeds in km/h, travel times in seconds
/// for the segment, `confidence`, `frc`, `road_closure` and
/// `coordinate_count` unitless, coordinates in degrees.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub frc: Option<String>,
    pub current_speed: Option<f64>,
    pub free_flow_speed: Option<f64>,
    pub current_travel_time: Option<f64>,
    pub free_flow_travel_time: Option<f64>,
    pub confidence: Option<f64>,
    pub road_closure: bool,
    pub coordinate_count: i64,
    pub coordinates: Vec<Coordinate>,
}

/// 單一地點的即時天氣
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_utc: String,
    pub temperature_celsius: Option<f64>,
    pub feels_like_celsius: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub wind_deg: Option<f64>,
    pub weather_description: Option<String>,
    pub weather_icon: Option<String>,
    pub cloudiness_percent: Option<f64>,
    pub city_name: Option<String>,
}

/// 取樣點的平均值，鍵名帶單位
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrafficAverages {
    pub current_speed_kmph: Option<f64>,
    pub free_flow_speed_kmph: Option<f64>,
    pub current_travel_time_seconds_per_segment: Option<f64>,
    pub free_flow_travel_time_seconds_per_segment: Option<f64>,
    pub confidence_unitless: Option<f64>,
}

impl TrafficAverages {
    pub fn entries(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("average_currentSpeed_kmph", self.current_speed_kmph),
            ("average_freeFlowSpeed_kmph", self.free_flow_speed_kmph),
            (
                "average_currentTravelTime_seconds_per_segment",
                self.current_travel_time_seconds_per_segment,
            ),
            (
                "average_freeFlowTravelTime_seconds_per_segment",
                self.free_flow_travel_time_seconds_per_segment,
            ),
            ("average_confidence_unitless", self.confidence_unitless),
        ]
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(name, _)| *name == key)
            .and_then(|(_, value)| value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub dataset: Vec<TrafficRecord>,
    pub averages: TrafficAverages,
    pub estimated_travel_time_seconds: Option<f64>,
    /// Staged files that were read successfully.
    pub source_files: Vec<String>,
}

impl TransformOutput {
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub database_path: String,
    pub table_name: String,
    pub rows_loaded: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub extracted_files: Vec<String>,
    pub rows_transformed: usize,
    pub averages: TrafficAverages,
    pub estimated_travel_time_seconds: Option<f64>,
    pub load: LoadSummary,
}
