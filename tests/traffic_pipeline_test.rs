use httpmock::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use traffic_etl::adapters::duckdb_store::query_table;
use traffic_etl::adapters::parquet_file::encode_traffic;
use traffic_etl::config::{LoadSettings, TrafficSettings};
use traffic_etl::core::transform::transform_traffic_data;
use traffic_etl::core::{Storage, TrafficRecord};
use traffic_etl::domain::model::GeoPoint;
use traffic_etl::{EtlEngine, EtlError, LocalStorage, Result, TrafficPipeline};

const FLOW_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<flowSegmentData xmlns="http://lbs.tomtom.com/services" version="traffic-service 4.0.011">
  <frc>FRC3</frc>
  <currentSpeed>32</currentSpeed>
  <freeFlowSpeed>40</freeFlowSpeed>
  <currentTravelTime>90</currentTravelTime>
  <freeFlowTravelTime>72</freeFlowTravelTime>
  <confidence>0.9</confidence>
  <roadClosure>false</roadClosure>
  <coordinates>
    <coordinate><latitude>10.79187</latitude><longitude>106.68831</longitude></coordinate>
    <coordinate><latitude>10.79250</latitude><longitude>106.68990</longitude></coordinate>
  </coordinates>
</flowSegmentData>"#;

#[derive(Clone, Default)]
struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl Storage for MockStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| {
            EtlError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            ))
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn locate(&self, path: &str) -> String {
        format!("mock://{}", path)
    }
}

fn point(value: &str) -> GeoPoint {
    value.parse().unwrap()
}

fn settings_for(server: &MockServer, points: Vec<GeoPoint>) -> TrafficSettings {
    TrafficSettings {
        api_key: Some("test-key".to_string()),
        base_url: server.url("/flow"),
        points,
        timeout_seconds: 5,
        ..Default::default()
    }
}

fn load_settings(dir: &TempDir) -> LoadSettings {
    LoadSettings {
        database_path: dir.path().join("traffic.duckdb").to_string_lossy().into_owned(),
        table_name: "traffic_data".to_string(),
    }
}

#[tokio::test]
async fn test_end_to_end_run_loads_into_duckdb() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();

    let ok_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/flow/10/xml")
            .query_param("key", "test-key")
            .query_param("point", "10.79187,106.68831");
        then.status(200)
            .header("Content-Type", "text/xml")
            .body(FLOW_XML);
    });
    let failing_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/flow/10/xml")
            .query_param("point", "10.78792,106.70215");
        then.status(500).body("Internal Server Error");
    });

    let staging = temp_dir.path().join("staging");
    let storage = LocalStorage::new(&staging);
    let settings = settings_for(
        &server,
        vec![point("10.79187,106.68831"), point("10.78792,106.70215")],
    );
    let load = load_settings(&temp_dir);
    let database_path = load.database_path.clone();

    let pipeline = TrafficPipeline::new(storage, settings, load)?;
    let engine = EtlEngine::new_with_monitoring(pipeline, false);
    let report = engine.run().await?;

    ok_mock.assert();
    failing_mock.assert();

    // 失敗的取樣點不影響其他點
    assert_eq!(report.extracted_files.len(), 1);
    let staged = &report.extracted_files[0];
    assert!(staged.starts_with("traffic_data_10_79187-106_68831_"));
    assert!(staged.ends_with(".parquet"));
    assert!(staging.join(staged).exists());

    assert_eq!(report.rows_transformed, 1);
    assert_eq!(report.averages.current_speed_kmph, Some(32.0));
    assert_eq!(report.averages.get("average_freeFlowSpeed_kmph"), Some(40.0));
    // 5000 m at 32 km/h
    let estimate = report.estimated_travel_time_seconds.unwrap();
    assert!((estimate - 562.5).abs() < 1e-9);

    assert_eq!(report.load.rows_loaded, 1);
    assert_eq!(report.load.table_name, "traffic_data");

    let contents = query_table(std::path::Path::new(&database_path), "traffic_data")?;
    assert_eq!(contents.len(), 1);
    assert!(contents.columns.iter().any(|c| c == "currentSpeed"));
    assert!(contents.columns.iter().any(|c| c == "coordinate_count"));

    Ok(())
}

#[tokio::test]
async fn test_rerun_replaces_table() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/flow/10/xml");
        then.status(200).body(FLOW_XML);
    });

    let load = load_settings(&temp_dir);
    let database_path = load.database_path.clone();
    for _ in 0..2 {
        let pipeline = TrafficPipeline::new(
            LocalStorage::new(temp_dir.path().join("staging")),
            settings_for(&server, vec![point("10.79187,106.68831")]),
            load.clone(),
        )?;
        EtlEngine::new(pipeline).run().await?;
    }

    let contents = query_table(std::path::Path::new(&database_path), "traffic_data")?;
    assert_eq!(contents.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_all_points_failing_is_no_data() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/flow/10/xml");
        then.status(403).body("Forbidden");
    });

    let load = load_settings(&temp_dir);
    let database_path = load.database_path.clone();
    let pipeline = TrafficPipeline::new(
        MockStorage::default(),
        settings_for(&server, vec![point("10.79187,106.68831"), point("10.79096,106.7156")]),
        load,
    )?;

    let result = EtlEngine::new(pipeline).run().await;

    api_mock.assert_hits(2);
    assert!(matches!(result, Err(EtlError::NoData { ref stage }) if stage == "extract"));
    assert!(!std::path::Path::new(&database_path).exists());
    Ok(())
}

#[tokio::test]
async fn test_malformed_xml_skips_point() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/flow/10/xml")
            .query_param("point", "10.79187,106.68831");
        then.status(200)
            .body("<flowSegmentData><currentSpeed>32</freeFlowSpeed></flowSegmentData>");
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/flow/10/xml")
            .query_param("point", "10.79096,106.7156");
        then.status(200).body(FLOW_XML);
    });

    let storage = MockStorage::default();
    let pipeline = TrafficPipeline::new(
        storage.clone(),
        settings_for(&server, vec![]),
        LoadSettings::default(),
    )?;

    let files = pipeline
        .extract_traffic_data_for_areas(&[point("10.79187,106.68831"), point("10.79096,106.7156")])
        .await;

    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("traffic_data_10_79096-106_7156_"));
    assert!(storage.files.lock().await.contains_key(&files[0]));
    Ok(())
}

#[tokio::test]
async fn test_transform_skips_unreadable_files() -> anyhow::Result<()> {
    let storage = MockStorage::default();
    let fast = TrafficRecord {
        current_speed: Some(60.0),
        free_flow_speed: Some(60.0),
        ..Default::default()
    };
    let slow = TrafficRecord {
        current_speed: Some(30.0),
        free_flow_speed: None,
        ..Default::default()
    };
    storage.write_file("a.parquet", &encode_traffic(&[fast])?).await?;
    storage.write_file("b.parquet", &encode_traffic(&[slow])?).await?;
    storage.write_file("broken.parquet", b"not parquet").await?;

    let staged = vec![
        "a.parquet".to_string(),
        "broken.parquet".to_string(),
        "missing.parquet".to_string(),
        "b.parquet".to_string(),
    ];
    let output = transform_traffic_data(&storage, &staged, 4500.0).await;

    assert_eq!(output.dataset.len(), 2);
    assert_eq!(output.source_files, vec!["a.parquet", "b.parquet"]);
    assert_eq!(output.averages.current_speed_kmph, Some(45.0));
    assert_eq!(output.averages.free_flow_speed_kmph, Some(60.0));
    // 45 km/h = 12.5 m/s
    let estimate = output.estimated_travel_time_seconds.unwrap();
    assert!((estimate - 360.0).abs() < 1e-9);

    let empty = transform_traffic_data(&storage, &["broken.parquet".to_string()], 4500.0).await;
    assert!(empty.is_empty());
    assert_eq!(empty.estimated_travel_time_seconds, None);
    Ok(())
}
