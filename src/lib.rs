pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::storage::LocalStorage;
pub use config::Settings;
pub use core::{
    etl::EtlEngine, manifest::Manifest, traffic::TrafficPipeline, weather::WeatherExtractor,
};
pub use utils::error::{EtlError, Result};
