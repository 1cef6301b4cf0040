//! Arrow views of the job's tables: typed trips in, enriched rows out, and
//! console display of any DataFrame.

use std::sync::Arc;

use datafusion::arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, Int32Array, StringArray,
    TimestampMicrosecondArray,
};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use datafusion::arrow::error::ArrowError;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::arrow::util::pretty::pretty_format_batches;
use datafusion::error::Result as DataFusionResult;
use datafusion::prelude::DataFrame;

use crate::enrich::{EnrichedRow, ENRICHED_COLUMNS};
use crate::trip::{TripRecord, TRIP_COLUMNS};

fn trip_column_type(name: &str) -> DataType {
    match name {
        "tpep_pickup_datetime" | "tpep_dropoff_datetime" => {
            DataType::Timestamp(TimeUnit::Microsecond, None)
        }
        "vendor_id" | "passenger_count" | "ratecode_id" | "pulocation_id" | "dolocation_id"
        | "payment_type" => DataType::Int32,
        "store_and_fwd_flag" => DataType::Utf8,
        _ => DataType::Float64,
    }
}

pub fn trips_schema() -> SchemaRef {
    Arc::new(Schema::new(
        TRIP_COLUMNS
            .iter()
            .map(|name| Field::new(*name, trip_column_type(name), true))
            .collect::<Vec<_>>(),
    ))
}

fn ints(trips: &[TripRecord], value: impl Fn(&TripRecord) -> Option<i32>) -> ArrayRef {
    Arc::new(trips.iter().map(value).collect::<Int32Array>())
}

fn floats(trips: &[TripRecord], value: impl Fn(&TripRecord) -> Option<f64>) -> ArrayRef {
    Arc::new(trips.iter().map(value).collect::<Float64Array>())
}

fn timestamps(
    trips: &[TripRecord],
    value: impl Fn(&TripRecord) -> Option<chrono::NaiveDateTime>,
) -> ArrayRef {
    Arc::new(
        trips
            .iter()
            .map(|t| value(t).map(|ts| ts.and_utc().timestamp_micros()))
            .collect::<TimestampMicrosecondArray>(),
    )
}

/// Loads parsed trips into one batch laid out like [`trips_schema`].
pub fn trips_to_batch(trips: &[TripRecord]) -> Result<RecordBatch, ArrowError> {
    let columns: Vec<ArrayRef> = vec![
        ints(trips, |t| t.vendor_id),
        timestamps(trips, |t| t.pickup_datetime),
        timestamps(trips, |t| t.dropoff_datetime),
        ints(trips, |t| t.passenger_count),
        floats(trips, |t| t.trip_distance),
        ints(trips, |t| t.ratecode_id),
        Arc::new(
            trips
                .iter()
                .map(|t| t.store_and_fwd_flag.as_deref())
                .collect::<StringArray>(),
        ),
        ints(trips, |t| t.pulocation_id),
        ints(trips, |t| t.dolocation_id),
        ints(trips, |t| t.payment_type),
        floats(trips, |t| t.fare_amount),
        floats(trips, |t| t.extra),
        floats(trips, |t| t.mta_tax),
        floats(trips, |t| t.tip_amount),
        floats(trips, |t| t.tolls_amount),
        floats(trips, |t| t.improvement_surcharge),
        floats(trips, |t| t.total_amount),
        floats(trips, |t| t.congestion_surcharge),
    ];
    RecordBatch::try_new(trips_schema(), columns)
}

/// Shape of the enriched datamart as written by the sinks.
pub fn enriched_schema() -> SchemaRef {
    Arc::new(Schema::new(
        ENRICHED_COLUMNS
            .iter()
            .map(|name| {
                let data_type = match *name {
                    "dt" => DataType::Date32,
                    "vendor_id" | "payment_type" | "ratecode_id" => DataType::Int32,
                    "sum_amount" | "avg_tips" => DataType::Float64,
                    _ => DataType::Utf8,
                };
                Field::new(*name, data_type, true)
            })
            .collect::<Vec<_>>(),
    ))
}

/// Looks up `name` in `batch` as a concrete array type.
pub fn column<'a, A: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a A, ArrowError> {
    batch
        .column_by_name(name)
        .and_then(|array| array.as_any().downcast_ref::<A>())
        .ok_or_else(|| {
            ArrowError::SchemaError(format!(
                "column {name} is missing or is not {}",
                std::any::type_name::<A>()
            ))
        })
}

fn nullable<T>(array: &impl Array, i: usize, value: impl FnOnce() -> T) -> Option<T> {
    array.is_valid(i).then(value)
}

/// Reads collected enriched batches back into typed rows, keeping their order.
pub fn enriched_rows(batches: &[RecordBatch]) -> Result<Vec<EnrichedRow>, ArrowError> {
    let mut rows = Vec::new();
    for batch in batches {
        let dt = column::<Date32Array>(batch, "dt")?;
        let vendor_id = column::<Int32Array>(batch, "vendor_id")?;
        let payment_type = column::<Int32Array>(batch, "payment_type")?;
        let ratecode_id = column::<Int32Array>(batch, "ratecode_id")?;
        let sum_amount = column::<Float64Array>(batch, "sum_amount")?;
        let avg_tips = column::<Float64Array>(batch, "avg_tips")?;
        let rate_name = column::<StringArray>(batch, "rate_name")?;
        let vendor_name = column::<StringArray>(batch, "vendor_name")?;
        let payment_name = column::<StringArray>(batch, "payment_name")?;

        for i in 0..batch.num_rows() {
            rows.push(EnrichedRow {
                dt: nullable(dt, i, || dt.value_as_date(i)).flatten(),
                vendor_id: vendor_id.value(i),
                payment_type: payment_type.value(i),
                ratecode_id: ratecode_id.value(i),
                sum_amount: nullable(sum_amount, i, || sum_amount.value(i)),
                avg_tips: nullable(avg_tips, i, || avg_tips.value(i)),
                rate_name: rate_name.value(i).to_string(),
                vendor_name: vendor_name.value(i).to_string(),
                payment_name: payment_name.value(i).to_string(),
            });
        }
    }
    Ok(rows)
}

/// Renders the first `limit` rows of `df` as an ASCII table.
pub async fn render(df: DataFrame, limit: usize) -> DataFusionResult<String> {
    let batches = df.limit(0, Some(limit))?.collect().await?;
    Ok(pretty_format_batches(&batches)?.to_string())
}

/// Prints the first `limit` rows of `df` to stdout under `title`.
pub async fn show(title: &str, df: DataFrame, limit: usize) -> DataFusionResult<()> {
    if limit == 0 {
        return Ok(());
    }
    let formatted = render(df, limit).await?;
    println!("\n--- {} (first {} rows) ---", title, limit);
    println!("{}", formatted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use datafusion::prelude::SessionContext;

    fn trip(vendor: Option<i32>, pickup: &str, total: f64) -> TripRecord {
        TripRecord {
            vendor_id: vendor,
            pickup_datetime: NaiveDateTime::parse_from_str(pickup, "%Y-%m-%d %H:%M:%S").ok(),
            store_and_fwd_flag: Some("N".to_string()),
            total_amount: Some(total),
            ..Default::default()
        }
    }

    #[test]
    fn test_trips_batch_shape() {
        let batch = trips_to_batch(&[
            trip(Some(1), "2024-01-01 10:00:00", 10.0),
            trip(None, "1970-01-01 00:00:01", 5.0),
        ])
        .unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), TRIP_COLUMNS.len());
        assert!(column::<Int32Array>(&batch, "vendor_id").unwrap().is_null(1));
        let pickup = column::<TimestampMicrosecondArray>(&batch, "tpep_pickup_datetime").unwrap();
        assert_eq!(pickup.value(1), 1_000_000);
        assert!(column::<Float64Array>(&batch, "tip_amount").unwrap().is_null(0));
        assert!(column::<Int32Array>(&batch, "total_amount").is_err());
    }

    #[test]
    fn test_enriched_rows_reads_nulls() {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(vec![Some(19_723), None])),
            Arc::new(Int32Array::from(vec![1, 2])),
            Arc::new(Int32Array::from(vec![2, 1])),
            Arc::new(Int32Array::from(vec![1, 6])),
            Arc::new(Float64Array::from(vec![Some(30.0), None])),
            Arc::new(Float64Array::from(vec![None, Some(0.5)])),
            Arc::new(StringArray::from(vec!["Standard rate", "Group ride"])),
            Arc::new(StringArray::from(vec![
                "Creative Mobile Technologies, LLC",
                "VeriFone Inc",
            ])),
            Arc::new(StringArray::from(vec!["Cash", "Credit card"])),
        ];
        let batch = RecordBatch::try_new(enriched_schema(), columns).unwrap();

        let rows = enriched_rows(&[batch]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].dt, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(rows[0].sum_amount, Some(30.0));
        assert_eq!(rows[0].avg_tips, None);
        assert_eq!(rows[1].dt, None);
        assert_eq!(rows[1].payment_name, "Credit card");
    }

    #[tokio::test]
    async fn test_render_limits_rows() {
        let ctx = SessionContext::new();
        let df = ctx
            .read_batch(
                trips_to_batch(&[
                    trip(Some(1), "2024-01-02 10:00:00", 12.5),
                    trip(Some(2), "2024-01-01 10:00:00", 3.0),
                ])
                .unwrap(),
            )
            .unwrap()
            .select_columns(&["vendor_id", "total_amount"])
            .unwrap();

        let text = render(df, 1).await.unwrap();
        assert!(text.contains("total_amount"));
        assert!(text.contains("12.5"));
        assert!(!text.contains("3.0"));
    }
}
