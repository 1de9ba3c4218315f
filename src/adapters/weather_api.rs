//! Current-weather API (OpenWeatherMap style) request building and JSON
//! decoding.

use crate::domain::model::{Location, WeatherRecord};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.exampleweather.com/v1/current";

pub fn construct_weather_api_url(
    base_url: &str,
    api_key: &str,
    location: &Location,
    units: &str,
    extra: &BTreeMap<String, String>,
) -> Result<String> {
    let mut url = Url::parse(base_url).map_err(|e| EtlError::InvalidConfigValueError {
        field: "weather.base_url".to_string(),
        value: base_url.to_string(),
        reason: format!("Invalid URL format: {}", e),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("lat", &location.lat.to_string());
        query.append_pair("lon", &location.lon.to_string());
        query.append_pair("appid", api_key);
        query.append_pair("units", units);
        for (param, value) in extra {
            query.append_pair(param, value);
        }
    }

    Ok(url.into())
}

fn number_at(data: &Value, pointer: &str) -> Option<f64> {
    match data.pointer(pointer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_at(data: &Value, pointer: &str) -> Option<String> {
    match data.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Decodes a current-weather document for `location`, stamping it with
/// `fetched_at`.
pub fn parse_weather_response(
    json_data: &str,
    location: &Location,
    fetched_at: DateTime<Utc>,
) -> Result<WeatherRecord> {
    if json_data.trim().is_empty() {
        return Err(EtlError::ProcessingError {
            message: "No JSON data provided for parsing".to_string(),
        });
    }

    let data: Value = serde_json::from_str(json_data)?;
    if !data.is_object() {
        return Err(EtlError::ProcessingError {
            message: "Weather response is not a JSON object".to_string(),
        });
    }

    Ok(WeatherRecord {
        latitude: location.lat,
        longitude: location.lon,
        timestamp_utc: fetched_at.to_rfc3339_opts(SecondsFormat::Micros, false),
        temperature_celsius: number_at(&data, "/main/temp"),
        feels_like_celsius: number_at(&data, "/main/feels_like"),
        pressure_hpa: number_at(&data, "/main/pressure"),
        humidity_percent: number_at(&data, "/main/humidity"),
        wind_speed_mps: number_at(&data, "/wind/speed"),
        wind_deg: number_at(&data, "/wind/deg"),
        weather_description: text_at(&data, "/weather/0/description"),
        weather_icon: text_at(&data, "/weather/0/icon"),
        cloudiness_percent: number_at(&data, "/clouds/all"),
        city_name: text_at(&data, "/name"),
    })
}
