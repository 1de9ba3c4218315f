use crate::adapters::parquet_file::decode_traffic;
use crate::domain::model::{TrafficAverages, TrafficRecord, TransformOutput};
use crate::domain::ports::Storage;

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Averages over all records; missing values are ignored.
pub fn compute_averages(records: &[TrafficRecord]) -> TrafficAverages {
    TrafficAverages {
        current_speed_kmph: mean(records.iter().map(|r| r.current_speed)),
        free_flow_speed_kmph: mean(records.iter().map(|r| r.free_flow_speed)),
        current_travel_time_seconds_per_segment: mean(
            records.iter().map(|r| r.current_travel_time),
        ),
        free_flow_travel_time_seconds_per_segment: mean(
            records.iter().map(|r| r.free_flow_travel_time),
        ),
        confidence_unitless: mean(records.iter().map(|r| r.confidence)),
    }
}

/// Travel time in seconds for a route of `route_distance_meters` driven at
/// `average_speed_kmph`.
pub fn estimate_travel_time_seconds(
    average_speed_kmph: Option<f64>,
    route_distance_meters: f64,
) -> Option<f64> {
    let speed_kmph = match average_speed_kmph {
        Some(v) if v >= 0.0 && route_distance_meters > 0.0 => v,
        _ => {
            tracing::warn!(
                "Cannot estimate travel time: Average current speed is missing/invalid, or route distance is missing/zero."
            );
            return None;
        }
    };

    // km/h -> m/s
    let speed_mps = speed_kmph * 1000.0 / 3600.0;
    if speed_mps <= 0.0 {
        tracing::warn!(
            "Cannot estimate travel time: Average current speed is effectively zero (indicates significant delay)."
        );
        return None;
    }

    let seconds = route_distance_meters / speed_mps;
    tracing::info!(
        "Estimated travel time for route (assuming distance {:.2} meters): {:.2} seconds ({:.2} minutes) at {:.2} km/h",
        route_distance_meters,
        seconds,
        seconds / 60.0,
        speed_kmph
    );
    Some(seconds)
}

/// Reads the staged files of one extraction run, combines them and derives
/// averages and the route travel time estimate. Unreadable files are
/// skipped.
pub async fn transform_traffic_data<S: Storage>(
    storage: &S,
    staged_files: &[String],
    route_distance_meters: f64,
) -> TransformOutput {
    tracing::info!("--- Starting Transformation ---");

    if staged_files.is_empty() {
        tracing::warn!("No files provided for transformation.");
        return TransformOutput::default();
    }

    let mut dataset = Vec::new();
    let mut source_files = Vec::new();
    for path in staged_files {
        tracing::info!("📖 Reading file: {}", storage.locate(path));
        let decoded = match storage.read_file(path).await {
            Ok(bytes) => decode_traffic(bytes),
            Err(e) => Err(e),
        };
        match decoded {
            Ok(records) => {
                dataset.extend(records);
                source_files.push(path.clone());
            }
            Err(e) => {
                tracing::error!("❌ Error reading file {}: {}", path, e);
            }
        }
    }

    if source_files.is_empty() {
        tracing::warn!("No dataframes successfully read.");
        return TransformOutput::default();
    }

    tracing::info!(
        "Combined data from {} files into {} row(s)",
        source_files.len(),
        dataset.len()
    );

    let averages = compute_averages(&dataset);
    tracing::info!("Calculated Averages from Sampled Points:");
    for (key, value) in averages.entries() {
        match value {
            Some(v) => tracing::info!("  {}: {:.4}", key, v),
            None => tracing::info!("  {}: n/a", key),
        }
    }

    let estimated_travel_time_seconds =
        estimate_travel_time_seconds(averages.current_speed_kmph, route_distance_meters);

    tracing::info!("--- Transformation Complete ---");
    TransformOutput {
        dataset,
        averages,
        estimated_travel_time_seconds,
        source_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(speed: Option<f64>, confidence: Option<f64>) -> TrafficRecord {
        TrafficRecord {
            current_speed: speed,
            free_flow_speed: Some(60.0),
            current_travel_time: Some(100.0),
            free_flow_travel_time: Some(80.0),
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn test_averages_ignore_missing_values() {
        let records = vec![
            record(Some(30.0), Some(1.0)),
            record(None, Some(0.5)),
            record(Some(60.0), None),
        ];

        let averages = compute_averages(&records);
        assert_eq!(averages.current_speed_kmph, Some(45.0));
        assert_eq!(averages.free_flow_speed_kmph, Some(60.0));
        assert_eq!(averages.current_travel_time_seconds_per_segment, Some(100.0));
        assert_eq!(averages.confidence_unitless, Some(0.75));
    }

    #[test]
    fn test_averages_of_all_missing_is_none() {
        let averages = compute_averages(&[record(None, None)]);
        assert_eq!(averages.current_speed_kmph, None);
        assert_eq!(averages.confidence_unitless, None);
        assert_eq!(compute_averages(&[]), TrafficAverages::default());
    }

    #[test]
    fn test_estimate_travel_time() {
        // 36 km/h = 10 m/s; 5000 m -> 500 s
        let seconds = estimate_travel_time_seconds(Some(36.0), 5000.0).unwrap();
        assert!((seconds - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_edge_cases() {
        assert_eq!(estimate_travel_time_seconds(None, 5000.0), None);
        assert_eq!(estimate_travel_time_seconds(Some(0.0), 5000.0), None);
        assert_eq!(estimate_travel_time_seconds(Some(-5.0), 5000.0), None);
        assert_eq!(estimate_travel_time_seconds(Some(40.0), 0.0), None);
        assert_eq!(estimate_travel_time_seconds(Some(f64::NAN), 5000.0), None);
    }
}
