use crate::adapters::duckdb_store::load_traffic_records;
use crate::adapters::http::ApiClient;
use crate::adapters::parquet_file::encode_traffic;
use crate::adapters::tomtom::{construct_api_url, parse_flow_segment, RESPONSE_FORMAT};
use crate::config::{LoadSettings, FILE_EXTENSION};
use crate::core::transform::transform_traffic_data;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{GeoPoint, LoadSummary, TransformOutput};
use crate::utils::error::{EtlError, Result};
use crate::utils::logger::redact_url;
use chrono::{DateTime, Local};
use std::path::PathBuf;

/// `traffic_data_{lat_lon}_{timestamp}.parquet`
pub fn construct_file_name(point: &GeoPoint, timestamp_format: &str, now: DateTime<Local>) -> String {
    format!(
        "traffic_data_{}_{}.{}",
        point.file_identifier(),
        now.format(timestamp_format),
        FILE_EXTENSION
    )
}

/// TomTom 車流 ETL：每個取樣點一個 Parquet 檔，合併後載入 DuckDB
pub struct TrafficPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: ApiClient,
    load: LoadSettings,
}

impl<S: Storage, C: ConfigProvider> TrafficPipeline<S, C> {
    pub fn new(storage: S, config: C, load: LoadSettings) -> Result<Self> {
        let client = ApiClient::new(config.request_timeout())?;
        Ok(Self {
            storage,
            config,
            client,
            load,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Fetches, parses and stages one point. `Ok(None)` means the point
    /// produced no data; only staging failures are errors.
    async fn extract_point(&self, point: &GeoPoint) -> Result<Option<String>> {
        tracing::info!("Processing point: {} (lat, lon in degrees)", point);

        let url = construct_api_url(
            self.config.api_base_url(),
            self.config.api_key(),
            point,
            self.config.zoom(),
            RESPONSE_FORMAT,
            self.config.extra_params(),
        )?;
        tracing::debug!("Constructed URL: {}", redact_url(&url));

        let Some(xml) = self.client.try_fetch_text(&url).await else {
            tracing::warn!("No data or failed to fetch data for point {}", point);
            return Ok(None);
        };

        let record = match parse_flow_segment(&xml) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("❌ Error parsing XML response for point {}: {}", point, e);
                return Ok(None);
            }
        };

        let file_name = construct_file_name(point, self.config.file_timestamp_format(), Local::now());
        let bytes = encode_traffic(std::slice::from_ref(&record))?;

        tracing::info!("💾 Saving data to {}", self.storage.locate(&file_name));
        self.storage.write_file(&file_name, &bytes).await?;
        tracing::info!("✅ Data saved successfully.");

        Ok(Some(file_name))
    }

    /// Extracts every point in turn. A failing point is logged and skipped
    /// so the remaining points still run.
    pub async fn extract_traffic_data_for_areas(&self, points: &[GeoPoint]) -> Vec<String> {
        if points.is_empty() {
            tracing::info!("No points specified for extraction.");
            return Vec::new();
        }

        tracing::info!("--- Starting ETL Extraction for {} point(s) ---", points.len());
        let mut saved = Vec::with_capacity(points.len());
        for point in points {
            match self.extract_point(point).await {
                Ok(Some(path)) => saved.push(path),
                Ok(None) => {}
                Err(e) => tracing::error!(
                    "❌ An unexpected error occurred while processing point {}: {}",
                    point,
                    e
                ),
            }
        }
        tracing::info!(
            "✅ ETL Extraction phase completed. {} of {} point(s) staged.",
            saved.len(),
            points.len()
        );

        saved
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for TrafficPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<String>> {
        Ok(self
            .extract_traffic_data_for_areas(self.config.route_points())
            .await)
    }

    async fn transform(&self, staged_files: Vec<String>) -> Result<TransformOutput> {
        Ok(transform_traffic_data(
            &self.storage,
            &staged_files,
            self.config.route_distance_meters(),
        )
        .await)
    }

    async fn load(&self, output: &TransformOutput) -> Result<LoadSummary> {
        let records = output.dataset.clone();
        let db_path = PathBuf::from(&self.load.database_path);
        let table = self.load.table_name.clone();

        // DuckDB 為同步 API
        let rows_loaded = tokio::task::spawn_blocking(move || {
            load_traffic_records(&records, &db_path, &table)
        })
        .await
        .map_err(|e| EtlError::ProcessingError {
            message: format!("Load task failed: {}", e),
        })??;

        Ok(LoadSummary {
            database_path: self.load.database_path.clone(),
            table_name: self.load.table_name.clone(),
            rows_loaded,
        })
    }
}
