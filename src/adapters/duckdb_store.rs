//! DuckDB load and query.

use crate::adapters::parquet_file::encode_traffic;
use crate::domain::model::TrafficRecord;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_sql_identifier;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::arrow::util::display::array_value_to_string;
use duckdb::arrow::util::pretty::pretty_format_batches;
use duckdb::{params, AccessMode, Config, Connection};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE: &str = "traffic_data.duckdb";
pub const DEFAULT_TABLE: &str = "traffic_data";

fn sql_string_literal(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

fn staging_path(db_path: &Path, table: &str) -> PathBuf {
    let file_name = format!("{}_staging.parquet", table);
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name),
        _ => PathBuf::from(file_name),
    }
}

/// Replaces `table` in the database at `db_path` with `records` and
/// returns the number of rows in the new table. An empty slice loads
/// nothing and returns 0.
pub fn load_traffic_records(records: &[TrafficRecord], db_path: &Path, table: &str) -> Result<usize> {
    tracing::info!("--- Starting Load Phase (DuckDB) ---");
    validate_sql_identifier("load.table", table)?;

    if records.is_empty() {
        tracing::info!("No data to load into DuckDB. Skipping load phase.");
        return Ok(0);
    }

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // 先寫成暫存 Parquet，再交給 DuckDB 的 read_parquet 讀入
    let staging = staging_path(db_path, table);
    std::fs::write(&staging, encode_traffic(records)?)?;

    let loaded = replace_table_from_parquet(db_path, table, &staging);

    if let Err(e) = std::fs::remove_file(&staging) {
        tracing::warn!("Could not remove staging file {}: {}", staging.display(), e);
    }

    let rows = loaded?;
    tracing::info!(
        "Successfully loaded {} rows into table '{}' in {}",
        rows,
        table,
        db_path.display()
    );
    tracing::info!("--- Load Phase (DuckDB) Complete ---");
    Ok(rows)
}

fn replace_table_from_parquet(db_path: &Path, table: &str, staging: &Path) -> Result<usize> {
    let conn = Connection::open(db_path)?;
    tracing::info!("Connected to DuckDB database: {}", db_path.display());

    tracing::info!("Loading data into table: {}", table);
    conn.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {} AS SELECT * FROM read_parquet({});",
        table,
        sql_string_literal(staging)
    ))?;

    let rows: i64 = conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;

    drop(conn);
    tracing::debug!("DuckDB connection closed.");
    Ok(rows as usize)
}

/// Rows of a table rendered as text, ready for display or CSV export.
#[derive(Debug, Clone)]
pub struct TableContents {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    batches: Vec<RecordBatch>,
}

impl TableContents {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_pretty_table(&self) -> Result<String> {
        if self.batches.is_empty() {
            return Ok(format!("{}\n(0 rows)", self.columns.join(" | ")));
        }
        pretty_format_batches(&self.batches)
            .map(|table| table.to_string())
            .map_err(|e| EtlError::ProcessingError {
                message: format!("Could not format query result: {}", e),
            })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Reads every row of `table` from the database at `db_path`, opened
/// read-only.
pub fn query_table(db_path: &Path, table: &str) -> Result<TableContents> {
    validate_sql_identifier("query.table", table)?;

    if !db_path.exists() {
        return Err(EtlError::ConfigError {
            message: format!("DuckDB database not found: {}", db_path.display()),
        });
    }

    tracing::info!("Attempting to connect to DuckDB database: {}", db_path.display());
    let config = Config::default().access_mode(AccessMode::ReadOnly)?;
    let conn = Connection::open_with_flags(db_path, config)?;

    if !table_exists(&conn, table)? {
        return Err(EtlError::TableNotFound {
            table: table.to_string(),
            database: db_path.display().to_string(),
        });
    }

    tracing::info!("Successfully connected. Querying table: {}", table);
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", table))?;
    let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
    let columns = stmt.column_names();

    let mut rows = Vec::new();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let mut values = Vec::with_capacity(batch.num_columns());
            for column in batch.columns() {
                let value = array_value_to_string(column.as_ref(), row).map_err(|e| {
                    EtlError::ProcessingError {
                        message: format!("Could not render value: {}", e),
                    }
                })?;
                values.push(value);
            }
            rows.push(values);
        }
    }

    tracing::debug!("Fetched {} row(s) from {}", rows.len(), table);
    Ok(TableContents {
        columns,
        rows,
        batches,
    })
}
