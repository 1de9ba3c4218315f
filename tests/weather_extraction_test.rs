use httpmock::prelude::*;
use tempfile::TempDir;
use traffic_etl::adapters::parquet_file::decode_weather;
use traffic_etl::config::WeatherSettings;
use traffic_etl::domain::model::Location;
use traffic_etl::{LocalStorage, WeatherExtractor};

fn weather_body() -> serde_json::Value {
    serde_json::json!({
        "coord": {"lon": 106.68831, "lat": 10.79187},
        "weather": [{"id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03d"}],
        "main": {"temp": 31.4, "feels_like": 37.1, "pressure": 1009, "humidity": 63},
        "wind": {"speed": 4.1, "deg": 220},
        "clouds": {"all": 40},
        "name": "Ho Chi Minh City"
    })
}

fn settings_for(server: &MockServer, dir: &TempDir, api_key: Option<&str>) -> WeatherSettings {
    WeatherSettings {
        api_key: api_key.map(str::to_string),
        base_url: server.url("/v1/current"),
        output_folder: dir.path().to_string_lossy().into_owned(),
        timeout_seconds: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_weather_extraction_writes_parquet() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/current")
            .query_param("lat", "10.79187")
            .query_param("lon", "106.68831")
            .query_param("appid", "weather-key")
            .query_param("units", "metric");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(weather_body());
    });

    let settings = settings_for(&server, &temp_dir, Some("weather-key"));
    let extractor = WeatherExtractor::new(LocalStorage::new(temp_dir.path()), settings)?;
    let location = Location::new(10.79187, 106.68831, Some("Example City".to_string()));

    let file = extractor.extract_weather_data(&location).await?.unwrap();

    api_mock.assert();
    assert!(file.starts_with("weather_data_lat10_79187_lon106_68831_"));
    assert!(file.ends_with(".parquet"));

    let records = decode_weather(std::fs::read(temp_dir.path().join(&file))?)?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.latitude, 10.79187);
    assert_eq!(record.temperature_celsius, Some(31.4));
    assert_eq!(record.humidity_percent, Some(63.0));
    assert_eq!(record.weather_description.as_deref(), Some("scattered clouds"));
    assert_eq!(record.city_name.as_deref(), Some("Ho Chi Minh City"));
    assert!(record.timestamp_utc.ends_with("+00:00"));
    Ok(())
}

#[tokio::test]
async fn test_missing_api_key_makes_no_request() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/v1/current");
        then.status(200).json_body(weather_body());
    });

    let extractor = WeatherExtractor::new(
        LocalStorage::new(temp_dir.path()),
        settings_for(&server, &temp_dir, None),
    )?;
    let result = extractor
        .extract_weather_data(&Location::new(10.0, 106.0, None))
        .await?;

    assert!(result.is_none());
    api_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_invalid_coordinates_are_skipped() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/v1/current");
        then.status(200).json_body(weather_body());
    });

    let extractor = WeatherExtractor::new(
        LocalStorage::new(temp_dir.path()),
        settings_for(&server, &temp_dir, Some("weather-key")),
    )?;

    assert!(extractor
        .extract_weather_data(&Location::new(91.0, 106.0, None))
        .await?
        .is_none());
    assert!(extractor
        .extract_weather_data(&Location::new(10.0, -181.0, None))
        .await?
        .is_none());
    api_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_http_and_parse_failures_return_none() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/current").query_param("lat", "1");
        then.status(401).body("Invalid API key");
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/current").query_param("lat", "2");
        then.status(200).body("<html>not json</html>");
    });

    let extractor = WeatherExtractor::new(
        LocalStorage::new(temp_dir.path()),
        settings_for(&server, &temp_dir, Some("weather-key")),
    )?;

    assert!(extractor
        .extract_weather_data(&Location::new(1.0, 1.0, None))
        .await?
        .is_none());
    assert!(extractor
        .extract_weather_data(&Location::new(2.0, 1.0, None))
        .await?
        .is_none());
    assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_extract_all_covers_configured_locations() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/v1/current");
        then.status(200).json_body(weather_body());
    });

    let mut settings = settings_for(&server, &temp_dir, Some("weather-key"));
    settings.locations = vec![
        Location::new(10.79187, 106.68831, None),
        Location::new(-33.87, 151.21, Some("Sydney".to_string())),
    ];
    let extractor = WeatherExtractor::new(LocalStorage::new(temp_dir.path()), settings)?;

    let files = extractor.extract_all().await?;

    api_mock.assert_hits(2);
    assert_eq!(files.len(), 2);
    assert!(files[1].starts_with("weather_data_latminus33_87_lon151_21_"));
    Ok(())
}

#[tokio::test]
async fn test_output_folder_exists_even_when_fetch_fails() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/v1/current");
        then.status(503).body("Service Unavailable");
    });

    let output = temp_dir.path().join("source_data").join("weather");
    let extractor = WeatherExtractor::new(
        LocalStorage::new(&output),
        settings_for(&server, &temp_dir, Some("weather-key")),
    )?;

    let result = extractor
        .extract_weather_data(&Location::new(10.79187, 106.68831, None))
        .await?;

    api_mock.assert();
    assert!(result.is_none());
    assert!(output.is_dir());
    assert_eq!(std::fs::read_dir(&output)?.count(), 0);
    Ok(())
}
