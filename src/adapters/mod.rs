// Adapters layer: concrete implementations for external systems
// (filesystem, HTTP APIs, Parquet files, DuckDB).

pub mod duckdb_store;
pub mod http;
pub mod parquet_file;
pub mod storage;
pub mod tomtom;
pub mod weather_api;
