//! TomTom Traffic `flowSegmentData/absolute` request building and XML
//! decoding.

use crate::domain::model::{Coordinate, GeoPoint, TrafficRecord};
use crate::utils::error::{EtlError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

pub const DEFAULT_BASE_URL: &str =
    "https://api.tomtom.com/traffic/services/4/flowSegmentData/absolute";
pub const RESPONSE_FORMAT: &str = "xml";

/// `{base}/{zoom}/{format}?key=..&point=lat,lon` followed by `extra`.
pub fn construct_api_url(
    base_url: &str,
    api_key: &str,
    point: &GeoPoint,
    zoom: u8,
    format: &str,
    extra: &BTreeMap<String, String>,
) -> Result<String> {
    let raw = format!("{}/{}/{}", base_url.trim_end_matches('/'), zoom, format);
    let mut url = Url::parse(&raw).map_err(|e| EtlError::InvalidConfigValueError {
        field: "traffic.base_url".to_string(),
        value: base_url.to_string(),
        reason: format!("Invalid URL format: {}", e),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("key", api_key);
        query.append_pair("point", &point.to_string());
        for (param, value) in extra {
            query.append_pair(param, value);
        }
    }

    Ok(url.into())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSegmentXml {
    frc: Option<String>,
    current_speed: Option<String>,
    free_flow_speed: Option<String>,
    current_travel_time: Option<String>,
    free_flow_travel_time: Option<String>,
    confidence: Option<String>,
    road_closure: Option<String>,
    coordinates: Option<CoordinatesXml>,
}

#[derive(Debug, Deserialize)]
struct CoordinatesXml {
    #[serde(default)]
    coordinate: Vec<CoordinateXml>,
}

#[derive(Debug, Deserialize)]
struct CoordinateXml {
    latitude: Option<String>,
    longitude: Option<String>,
}

// 無法解析的數值視為缺值
fn coerce_numeric(value: Option<String>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok())
}

fn parse_degrees(value: Option<String>) -> Result<Option<f64>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse::<f64>()
            .map(Some)
            .map_err(|_| EtlError::ProcessingError {
                message: format!("Invalid coordinate value '{}'", text),
            }),
    }
}

/// Decodes one flow segment response into a [`TrafficRecord`].
pub fn parse_flow_segment(xml_data: &str) -> Result<TrafficRecord> {
    if xml_data.trim().is_empty() {
        return Err(EtlError::ProcessingError {
            message: "No XML data provided for parsing".to_string(),
        });
    }

    let segment: FlowSegmentXml = quick_xml::de::from_str(xml_data)?;

    let mut coordinates = Vec::new();
    if let Some(coords) = segment.coordinates {
        for coord in coords.coordinate {
            let lat = parse_degrees(coord.latitude)?;
            let lon = parse_degrees(coord.longitude)?;
            if let (Some(latitude), Some(longitude)) = (lat, lon) {
                coordinates.push(Coordinate {
                    latitude,
                    longitude,
                });
            }
        }
    }

    let record = TrafficRecord {
        frc: segment.frc,
        current_speed: coerce_numeric(segment.current_speed),
        free_flow_speed: coerce_numeric(segment.free_flow_speed),
        current_travel_time: coerce_numeric(segment.current_travel_time),
        free_flow_travel_time: coerce_numeric(segment.free_flow_travel_time),
        confidence: coerce_numeric(segment.confidence),
        road_closure: segment
            .road_closure
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        coordinate_count: coordinates.len() as i64,
        coordinates,
    };

    tracing::debug!(
        "Parsed flow segment with {} coordinate(s); units: currentSpeed, freeFlowSpeed (km/h); currentTravelTime, freeFlowTravelTime (seconds per segment)",
        record.coordinate_count
    );

    Ok(record)
}
