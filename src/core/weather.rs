use crate::adapters::http::ApiClient;
use crate::adapters::parquet_file::encode_weather;
use crate::adapters::weather_api::{construct_weather_api_url, parse_weather_response};
use crate::config::{WeatherSettings, FILE_EXTENSION};
use crate::core::Storage;
use crate::domain::model::Location;
use crate::utils::error::Result;
use crate::utils::logger::redact_url;
use chrono::{DateTime, Local, Utc};
use std::time::Duration;

fn coordinate_token(value: f64) -> String {
    value.to_string().replace('.', "_").replace('-', "minus")
}

/// `weather_data_lat{lat}_lon{lon}_{timestamp}.parquet`，負號寫成 `minus`
pub fn construct_weather_file_name(
    location: &Location,
    timestamp_format: &str,
    now: DateTime<Local>,
) -> String {
    format!(
        "weather_data_lat{}_lon{}_{}.{}",
        coordinate_token(location.lat),
        coordinate_token(location.lon),
        now.format(timestamp_format),
        FILE_EXTENSION
    )
}

pub struct WeatherExtractor<S: Storage> {
    storage: S,
    settings: WeatherSettings,
    client: ApiClient,
}

impl<S: Storage> WeatherExtractor<S> {
    pub fn new(storage: S, settings: WeatherSettings) -> Result<Self> {
        let client = ApiClient::new(Duration::from_secs(settings.timeout_seconds))?;
        Ok(Self {
            storage,
            settings,
            client,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Fetches current weather for `location` and stages it as one Parquet
    /// file. Returns `Ok(None)` when the location is invalid, no API key is
    /// configured, or the request or response fails. Saving failures are
    /// errors.
    pub async fn extract_weather_data(&self, location: &Location) -> Result<Option<String>> {
        if !location.is_valid() {
            tracing::warn!(
                "Invalid location coordinates provided: ({}, {}). Skipping extraction.",
                location.lat,
                location.lon
            );
            return Ok(None);
        }

        tracing::info!(
            "--- Starting Weather Extraction for location: {} ({}, {}) ---",
            location.display_name(),
            location.lat,
            location.lon
        );

        let Some(api_key) = self.settings.api_key.as_deref() else {
            tracing::error!("❌ WEATHER_API_KEY is not set. Cannot fetch weather data.");
            return Ok(None);
        };

        self.storage.ensure_root().await?;
        tracing::info!(
            "Weather data output folder '{}' ensured.",
            self.storage.locate("")
        );

        let url = construct_weather_api_url(
            &self.settings.base_url,
            api_key,
            location,
            &self.settings.units,
            &self.settings.extra_params,
        )?;
        tracing::debug!("Constructed URL: {}", redact_url(&url));

        let Some(body) = self.client.try_fetch_text(&url).await else {
            tracing::warn!(
                "Failed to fetch weather data for location: {}",
                location.display_name()
            );
            return Ok(None);
        };

        let record = match parse_weather_response(&body, location, Utc::now()) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(
                    "❌ Failed to parse weather data for location {}: {}",
                    location.display_name(),
                    e
                );
                return Ok(None);
            }
        };

        let file_name =
            construct_weather_file_name(location, &self.settings.file_timestamp_format, Local::now());
        let bytes = encode_weather(std::slice::from_ref(&record))?;

        tracing::info!("💾 Saving weather data to {}", self.storage.locate(&file_name));
        self.storage.write_file(&file_name, &bytes).await?;
        tracing::info!(
            "✅ Extraction and saving successful for location: {}. File: {}",
            location.display_name(),
            file_name
        );

        Ok(Some(file_name))
    }

    /// Runs [`extract_weather_data`](Self::extract_weather_data) for every
    /// configured location.
    pub async fn extract_all(&self) -> Result<Vec<String>> {
        if self.settings.locations.is_empty() {
            tracing::info!("No weather locations configured.");
            return Ok(Vec::new());
        }

        let mut saved = Vec::new();
        for location in &self.settings.locations {
            if let Some(path) = self.extract_weather_data(location).await? {
                saved.push(path);
            }
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_weather_file_name_encodes_signs() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();

        let north_east = Location::new(10.79187, 106.68831, None);
        assert_eq!(
            construct_weather_file_name(&north_east, "%Y%m%d_%H%M%S", now),
            "weather_data_lat10_79187_lon106_68831_20240309_070501.parquet"
        );

        let south_west = Location::new(-33.87, -70.5, Some("x".to_string()));
        assert_eq!(
            construct_weather_file_name(&south_west, "%Y%m%d_%H%M%S", now),
            "weather_data_latminus33_87_lonminus70_5_20240309_070501.parquet"
        );
    }
}
