use crate::domain::model::{GeoPoint, LoadSummary, TransformOutput};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Byte storage for staged files, addressed by paths relative to the
/// storage root.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Prepares the storage root before anything is written. No-op unless
    /// the backend needs it.
    fn ensure_root(&self) -> impl std::future::Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Full location of `path`, for reporting.
    fn locate(&self, path: &str) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn api_key(&self) -> &str;
    fn api_base_url(&self) -> &str;
    fn route_points(&self) -> &[GeoPoint];
    fn zoom(&self) -> u8;
    fn request_timeout(&self) -> Duration;
    fn extra_params(&self) -> &BTreeMap<String, String>;
    fn route_distance_meters(&self) -> f64;
    fn file_timestamp_format(&self) -> &str;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<String>>;
    async fn transform(&self, staged_files: Vec<String>) -> Result<TransformOutput>;
    async fn load(&self, output: &TransformOutput) -> Result<LoadSummary>;
}
