//! Inner joins of the datamart against the dimension tables.

use chrono::NaiveDate;
use datafusion::common::JoinType;
use datafusion::prelude::*;
use tracing::{info, warn};

use crate::aggregate::datamart_order;
use crate::dimension::{Dimension, Dimensions};
use crate::error::EnrichError;

/// Columns of the enriched datamart, in output order.
pub const ENRICHED_COLUMNS: [&str; 9] = [
    "dt",
    "vendor_id",
    "payment_type",
    "ratecode_id",
    "sum_amount",
    "avg_tips",
    "rate_name",
    "vendor_name",
    "payment_name",
];

/// A datamart row with its codes resolved to display names.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub dt: Option<NaiveDate>,
    pub vendor_id: i32,
    pub payment_type: i32,
    pub ratecode_id: i32,
    pub sum_amount: Option<f64>,
    pub avg_tips: Option<f64>,
    pub rate_name: String,
    pub vendor_name: String,
    pub payment_name: String,
}

/// Rows removed by each join. A row is charged to the first join it fails,
/// joins run vendor, then payment, then rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinDrops {
    pub vendor: usize,
    pub payment: usize,
    pub rate: usize,
}

impl JoinDrops {
    pub fn total(&self) -> usize {
        self.vendor + self.payment + self.rate
    }
}

#[derive(Debug, Clone)]
pub struct Enriched {
    /// [`ENRICHED_COLUMNS`] in datamart order.
    pub frame: DataFrame,
    pub dropped: JoinDrops,
}

async fn join_dimension(
    ctx: &SessionContext,
    frame: DataFrame,
    dimension: &Dimension,
    fact_column: &str,
) -> Result<DataFrame, EnrichError> {
    let batch = dimension.to_batch().map_err(|source| EnrichError::Table {
        dimension: dimension.name(),
        source,
    })?;
    let table = dimension.table_name();
    ctx.register_batch(&table, batch)?;

    let key = dimension.key_column();
    Ok(frame.join(
        ctx.table(table.as_str()).await?,
        JoinType::Inner,
        &[fact_column],
        &[key.as_str()],
        None,
    )?)
}

/// Joins the datamart with the vendor, payment and rate tables.
///
/// Rows whose codes are null or missing from a table fall out of the inner
/// join. The loss per join is the row count before minus the row count after;
/// it is logged and returned alongside the frame.
pub async fn enrich(
    ctx: &SessionContext,
    datamart: DataFrame,
    dims: &Dimensions,
) -> Result<Enriched, EnrichError> {
    let mut dropped = JoinDrops::default();
    let mut frame = datamart;
    let mut rows = frame.clone().count().await?;

    for (dimension, fact_column, drops) in [
        (&dims.vendor, "vendor_id", &mut dropped.vendor),
        (&dims.payment, "payment_type", &mut dropped.payment),
        (&dims.rate, "ratecode_id", &mut dropped.rate),
    ] {
        frame = join_dimension(ctx, frame, dimension, fact_column).await?;
        let joined = frame.clone().count().await?;
        *drops = rows.saturating_sub(joined);
        rows = joined;
    }

    // Hash joins do not keep the input order.
    let frame = frame
        .select_columns(&ENRICHED_COLUMNS)?
        .sort(datamart_order())?;

    if dropped.total() > 0 {
        warn!(
            vendor = dropped.vendor,
            payment = dropped.payment,
            rate = dropped.rate,
            "Aggregate rows without a matching dimension entry were dropped"
        );
    }
    info!(rows, dropped = dropped.total(), "Enrichment complete");

    Ok(Enriched { frame, dropped })
}
