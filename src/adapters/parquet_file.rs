//! Parquet encoding of staged traffic and weather records.

use crate::domain::model::{Coordinate, TrafficRecord, WeatherRecord};
use crate::utils::error::{EtlError, Result};
use arrow_array::builder::{Float64Builder, ListBuilder, StructBuilder};
use arrow_array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, RecordBatch, StringArray,
    StructArray,
};
use arrow_schema::{DataType, Field, Fields, Schema, SchemaRef};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::sync::Arc;

fn coordinate_fields() -> Fields {
    Fields::from(vec![
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
    ])
}

pub fn traffic_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("frc", DataType::Utf8, true),
        Field::new("currentSpeed", DataType::Float64, true),
        Field::new("freeFlowSpeed", DataType::Float64, true),
        Field::new("currentTravelTime", DataType::Float64, true),
        Field::new("freeFlowTravelTime", DataType::Float64, true),
        Field::new("confidence", DataType::Float64, true),
        Field::new("roadClosure", DataType::Boolean, false),
        Field::new("coordinate_count", DataType::Int64, false),
        Field::new(
            "coordinates",
            DataType::List(Arc::new(Field::new(
                "item",
                DataType::Struct(coordinate_fields()),
                true,
            ))),
            true,
        ),
    ]))
}

pub fn weather_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("timestamp_utc", DataType::Utf8, false),
        Field::new("temperature_celsius", DataType::Float64, true),
        Field::new("feels_like_celsius", DataType::Float64, true),
        Field::new("pressure_hpa", DataType::Float64, true),
        Field::new("humidity_percent", DataType::Float64, true),
        Field::new("wind_speed_mps", DataType::Float64, true),
        Field::new("wind_deg", DataType::Float64, true),
        Field::new("weather_description", DataType::Utf8, true),
        Field::new("weather_icon", DataType::Utf8, true),
        Field::new("cloudiness_percent", DataType::Float64, true),
        Field::new("city_name", DataType::Utf8, true),
    ]))
}

fn missing_builder() -> EtlError {
    EtlError::ProcessingError {
        message: "Coordinate builder has an unexpected layout".to_string(),
    }
}

fn coordinates_array(records: &[TrafficRecord]) -> Result<ArrayRef> {
    let mut list = ListBuilder::new(StructBuilder::from_fields(coordinate_fields(), 0));

    for record in records {
        let coords = list.values();
        for coordinate in &record.coordinates {
            coords
                .field_builder::<Float64Builder>(0)
                .ok_or_else(missing_builder)?
                .append_value(coordinate.latitude);
            coords
                .field_builder::<Float64Builder>(1)
                .ok_or_else(missing_builder)?
                .append_value(coordinate.longitude);
            coords.append(true);
        }
        list.append(true);
    }

    Ok(Arc::new(list.finish()))
}

fn float_column<T>(records: &[T], value: impl Fn(&T) -> Option<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(
        records.iter().map(value).collect::<Vec<_>>(),
    ))
}

fn text_column<T>(records: &[T], value: impl Fn(&T) -> Option<&str>) -> ArrayRef {
    Arc::new(StringArray::from(
        records.iter().map(value).collect::<Vec<_>>(),
    ))
}

fn write_batch(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buffer)
}

pub fn encode_traffic(records: &[TrafficRecord]) -> Result<Vec<u8>> {
    let columns: Vec<ArrayRef> = vec![
        text_column(records, |r| r.frc.as_deref()),
        float_column(records, |r| r.current_speed),
        float_column(records, |r| r.free_flow_speed),
        float_column(records, |r| r.current_travel_time),
        float_column(records, |r| r.free_flow_travel_time),
        float_column(records, |r| r.confidence),
        Arc::new(BooleanArray::from(
            records.iter().map(|r| r.road_closure).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            records.iter().map(|r| r.coordinate_count).collect::<Vec<_>>(),
        )),
        coordinates_array(records)?,
    ];

    let batch = RecordBatch::try_new(traffic_schema(), columns)?;
    write_batch(&batch)
}

pub fn encode_weather(records: &[WeatherRecord]) -> Result<Vec<u8>> {
    let columns: Vec<ArrayRef> = vec![
        float_column(records, |r| Some(r.latitude)),
        float_column(records, |r| Some(r.longitude)),
        text_column(records, |r| Some(r.timestamp_utc.as_str())),
        float_column(records, |r| r.temperature_celsius),
        float_column(records, |r| r.feels_like_celsius),
        float_column(records, |r| r.pressure_hpa),
        float_column(records, |r| r.humidity_percent),
        float_column(records, |r| r.wind_speed_mps),
        float_column(records, |r| r.wind_deg),
        text_column(records, |r| r.weather_description.as_deref()),
        text_column(records, |r| r.weather_icon.as_deref()),
        float_column(records, |r| r.cloudiness_percent),
        text_column(records, |r| r.city_name.as_deref()),
    ];

    let batch = RecordBatch::try_new(weather_schema(), columns)?;
    write_batch(&batch)
}

fn read_batches(data: Vec<u8>) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| EtlError::ProcessingError {
            message: format!("Column '{}' is missing or has an unexpected type", name),
        })
}

fn float_at(array: &Float64Array, row: usize) -> Option<f64> {
    (!array.is_null(row)).then(|| array.value(row))
}

fn text_at(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

fn coordinates_at(list: &ListArray, row: usize) -> Result<Vec<Coordinate>> {
    if list.is_null(row) {
        return Ok(Vec::new());
    }

    let values = list.value(row);
    let entries = values
        .as_any()
        .downcast_ref::<StructArray>()
        .ok_or_else(|| EtlError::ProcessingError {
            message: "Column 'coordinates' has an unexpected type".to_string(),
        })?;
    let latitudes = entries
        .column_by_name("latitude")
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>());
    let longitudes = entries
        .column_by_name("longitude")
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>());

    let (Some(latitudes), Some(longitudes)) = (latitudes, longitudes) else {
        return Err(EtlError::ProcessingError {
            message: "Coordinate entries lack latitude/longitude".to_string(),
        });
    };

    Ok((0..entries.len())
        .filter(|&i| !latitudes.is_null(i) && !longitudes.is_null(i))
        .map(|i| Coordinate {
            latitude: latitudes.value(i),
            longitude: longitudes.value(i),
        })
        .collect())
}

pub fn decode_traffic(data: Vec<u8>) -> Result<Vec<TrafficRecord>> {
    let mut records = Vec::new();

    for batch in read_batches(data)? {
        let frc = column::<StringArray>(&batch, "frc")?;
        let current_speed = column::<Float64Array>(&batch, "currentSpeed")?;
        let free_flow_speed = column::<Float64Array>(&batch, "freeFlowSpeed")?;
        let current_travel_time = column::<Float64Array>(&batch, "currentTravelTime")?;
        let free_flow_travel_time = column::<Float64Array>(&batch, "freeFlowTravelTime")?;
        let confidence = column::<Float64Array>(&batch, "confidence")?;
        let road_closure = column::<BooleanArray>(&batch, "roadClosure")?;
        let coordinate_count = column::<Int64Array>(&batch, "coordinate_count")?;
        let coordinates = column::<ListArray>(&batch, "coordinates")?;

        for row in 0..batch.num_rows() {
            records.push(TrafficRecord {
                frc: text_at(frc, row),
                current_speed: float_at(current_speed, row),
                free_flow_speed: float_at(free_flow_speed, row),
                current_travel_time: float_at(current_travel_time, row),
                free_flow_travel_time: float_at(free_flow_travel_time, row),
                confidence: float_at(confidence, row),
                road_closure: !road_closure.is_null(row) && road_closure.value(row),
                coordinate_count: if coordinate_count.is_null(row) {
                    0
                } else {
                    coordinate_count.value(row)
                },
                coordinates: coordinates_at(coordinates, row)?,
            });
        }
    }

    Ok(records)
}

pub fn decode_weather(data: Vec<u8>) -> Result<Vec<WeatherRecord>> {
    let mut records = Vec::new();

    for batch in read_batches(data)? {
        let latitude = column::<Float64Array>(&batch, "latitude")?;
        let longitude = column::<Float64Array>(&batch, "longitude")?;
        let timestamp = column::<StringArray>(&batch, "timestamp_utc")?;
        let temperature = column::<Float64Array>(&batch, "temperature_celsius")?;
        let feels_like = column::<Float64Array>(&batch, "feels_like_celsius")?;
        let pressure = column::<Float64Array>(&batch, "pressure_hpa")?;
        let humidity = column::<Float64Array>(&batch, "humidity_percent")?;
        let wind_speed = column::<Float64Array>(&batch, "wind_speed_mps")?;
        let wind_deg = column::<Float64Array>(&batch, "wind_deg")?;
        let description = column::<StringArray>(&batch, "weather_description")?;
        let icon = column::<StringArray>(&batch, "weather_icon")?;
        let cloudiness = column::<Float64Array>(&batch, "cloudiness_percent")?;
        let city = column::<StringArray>(&batch, "city_name")?;

        for row in 0..batch.num_rows() {
            records.push(WeatherRecord {
                latitude: latitude.value(row),
                longitude: longitude.value(row),
                timestamp_utc: timestamp.value(row).to_string(),
                temperature_celsius: float_at(temperature, row),
                feels_like_celsius: float_at(feels_like, row),
                pressure_hpa: float_at(pressure, row),
                humidity_percent: float_at(humidity, row),
                wind_speed_mps: float_at(wind_speed, row),
                wind_deg: float_at(wind_deg, row),
                weather_description: text_at(description, row),
                weather_icon: text_at(icon, row),
                cloudiness_percent: float_at(cloudiness, row),
                city_name: text_at(city, row),
            });
        }
    }

    Ok(records)
}
