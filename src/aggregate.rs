//! Daily datamart aggregation over the trips table.

use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::functions_aggregate::expr_fn::{avg, sum};
use datafusion::logical_expr::{cast, SortExpr};
use datafusion::prelude::*;
use tracing::info;

use crate::error::AggregateError;

/// Name the trips batch is registered under in the session.
pub const TRIPS_TABLE: &str = "trips";

/// Columns of the datamart, in output order.
pub const DATAMART_COLUMNS: [&str; 6] = [
    "dt",
    "vendor_id",
    "payment_type",
    "ratecode_id",
    "sum_amount",
    "avg_tips",
];

/// Date descending with null dates last, then vendor ascending. Payment type
/// and rate code (ascending, nulls first) break the remaining ties.
pub fn datamart_order() -> Vec<SortExpr> {
    vec![
        col("dt").sort(false, false),
        col("vendor_id").sort(true, true),
        col("payment_type").sort(true, true),
        col("ratecode_id").sort(true, true),
    ]
}

/// Groups trips by (vendor, payment type, rate code, pickup date) and returns
/// the cached datamart in [`datamart_order`].
///
/// Trips without a vendor id are filtered out first. `sum_amount` and
/// `avg_tips` follow SQL `SUM`/`AVG`: nulls are skipped and an all-null group
/// yields null.
pub async fn datamart(
    ctx: &SessionContext,
    trips: RecordBatch,
) -> Result<DataFrame, AggregateError> {
    ctx.register_batch(TRIPS_TABLE, trips)?;
    let trips = ctx.table(TRIPS_TABLE).await?;

    // dt = to_date(tpep_pickup_datetime)
    let dt = cast(col("tpep_pickup_datetime"), DataType::Date32).alias("dt");

    let datamart = trips
        .filter(col("vendor_id").is_not_null())?
        .aggregate(
            vec![col("vendor_id"), col("payment_type"), col("ratecode_id"), dt],
            vec![
                sum(col("total_amount")).alias("sum_amount"),
                avg(col("tip_amount")).alias("avg_tips"),
            ],
        )?
        .select_columns(&DATAMART_COLUMNS)?
        .sort(datamart_order())?
        .cache()
        .await?;

    check_finite(&datamart).await?;

    let groups = datamart.clone().count().await?;
    info!(groups, "Aggregation complete");
    Ok(datamart)
}

/// Fails when a group's statistics overflowed `f64`.
async fn check_finite(datamart: &DataFrame) -> Result<(), AggregateError> {
    for column in ["sum_amount", "avg_tips"] {
        let infinite = col(column)
            .eq(lit(f64::INFINITY))
            .or(col(column).eq(lit(f64::NEG_INFINITY)));
        let groups = datamart.clone().filter(infinite)?.count().await?;
        if groups > 0 {
            return Err(AggregateError::NonFinite { column, groups });
        }
    }
    Ok(())
}
