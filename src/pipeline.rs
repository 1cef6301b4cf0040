//! The datamart job: ingest, aggregate, enrich, then write both sinks.

use std::path::PathBuf;

use datafusion::prelude::SessionContext;
use tracing::{info, warn};

use crate::aggregate;
use crate::config::PipelineConfig;
use crate::dimension::Dimensions;
use crate::enrich::{enrich, JoinDrops};
use crate::error::{AggregateError, EnrichError, IngestError, PipelineError};
use crate::ingest::{ingest, IngestReport};
use crate::sink::{write_csv_dir, TableSink};
use crate::table;

/// What a run read, produced and wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ingest: IngestReport,
    pub aggregate_rows: usize,
    pub join_drops: JoinDrops,
    pub enriched_rows: usize,
    pub output_file: PathBuf,
    /// `None` when no table sink was given.
    pub table_rows_appended: Option<usize>,
}

/// Runs the job once. `table_sink` receives the enriched rows after the file
/// sink has been written; pass `None` to skip the database.
#[tracing::instrument(skip_all, fields(input_dir = %config.input_dir.display()))]
pub async fn run(
    config: &PipelineConfig,
    table_sink: Option<&dyn TableSink>,
) -> Result<RunSummary, PipelineError> {
    let ctx = SessionContext::new();
    let dimensions = Dimensions::builtin()?;

    let ingested = ingest(&config.input_dir)?;
    let trips = table::trips_to_batch(&ingested.trips).map_err(IngestError::Table)?;

    // Cached once; displayed and joined from the same rows.
    let datamart = aggregate::datamart(&ctx, trips).await?;
    let aggregate_rows = datamart
        .clone()
        .count()
        .await
        .map_err(AggregateError::from)?;
    table::show("datamart", datamart.clone(), config.show_rows)
        .await
        .map_err(|source| PipelineError::Display {
            title: "datamart",
            source,
        })?;

    let enriched = enrich(&ctx, datamart, &dimensions).await?;
    table::show("enriched datamart", enriched.frame.clone(), config.show_rows)
        .await
        .map_err(|source| PipelineError::Display {
            title: "enriched datamart",
            source,
        })?;

    let batches = enriched.frame.collect().await.map_err(EnrichError::from)?;
    let output_file = write_csv_dir(&config.output_dir, table::enriched_schema(), &batches)?;
    let rows = table::enriched_rows(&batches)?;

    let table_rows_appended = match table_sink {
        Some(sink) => {
            warn!(
                sink = %sink.target(),
                rows = rows.len(),
                "Appending to the database table; rows from earlier runs are not replaced"
            );
            Some(sink.append(&rows).await?)
        }
        None => {
            info!("Database sink disabled");
            None
        }
    };

    let summary = RunSummary {
        ingest: ingested.report,
        aggregate_rows,
        join_drops: enriched.dropped,
        enriched_rows: rows.len(),
        output_file,
        table_rows_appended,
    };
    info!(?summary, "Run complete");
    Ok(summary)
}
