use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use taxi_datamart::config::{DatabaseConfig, PipelineConfig, DEFAULT_MYSQL_PORT};
use taxi_datamart::pipeline;
use taxi_datamart::sink::{MySqlSink, TableSink};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "taxi_datamart",
    about = "Daily NYC taxi datamart: trip CSVs -> vendor/payment/rate aggregates -> CSV + MySQL"
)]
struct Args {
    /// Folder containing the trip CSV files (every *.csv is read)
    #[arg(long, env = "TAXI_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Folder the enriched datamart is written to (replaced on every run)
    #[arg(long, env = "TAXI_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// Rows printed for each intermediate table (0 = none)
    #[arg(long, env = "TAXI_SHOW_ROWS", default_value_t = 100)]
    show_rows: usize,

    #[arg(long, env = "MYSQL_HOST")]
    mysql_host: Option<String>,

    #[arg(long, env = "MYSQL_PORT", default_value_t = DEFAULT_MYSQL_PORT)]
    mysql_port: u16,

    #[arg(long, env = "MYSQL_DATABASE")]
    mysql_database: Option<String>,

    /// Table the datamart is appended to, inside --mysql-database
    #[arg(long, env = "MYSQL_TABLE")]
    mysql_table: Option<String>,

    #[arg(long, env = "MYSQL_USER")]
    mysql_user: Option<String>,

    #[arg(long, env = "MYSQL_PASSWORD", hide_env_values = true)]
    mysql_password: Option<String>,

    /// Require TLS for the database connection
    #[arg(long, env = "MYSQL_SSL", default_value_t = false)]
    mysql_ssl: bool,

    /// Only write the CSV output, never touch the database
    #[arg(long, default_value_t = false)]
    skip_database: bool,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let database = if self.skip_database {
            None
        } else {
            Some(DatabaseConfig::from_parts(
                self.mysql_host,
                self.mysql_port,
                self.mysql_database,
                self.mysql_table,
                self.mysql_user,
                self.mysql_password,
                self.mysql_ssl,
            )?)
        };

        Ok(PipelineConfig {
            input_dir: self.data_dir,
            output_dir: self.output_dir,
            show_rows: self.show_rows,
            database,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    taxi_datamart::logging::init()?;

    let config = Args::parse().into_config()?;
    info!(
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        database = ?config.database.as_ref().map(|db| db.target()),
        "Starting datamart run"
    );

    let sink = config.database.clone().map(MySqlSink::new);
    let summary = pipeline::run(&config, sink.as_ref().map(|s| s as &dyn TableSink))
        .await
        .context("datamart run failed")?;

    println!(
        "\nRead {} rows from {} files, wrote {} datamart rows to {}{}",
        summary.ingest.rows_read,
        summary.ingest.files,
        summary.enriched_rows,
        summary.output_file.display(),
        match summary.table_rows_appended {
            Some(n) => format!(" and appended {} rows to the database", n),
            None => String::new(),
        }
    );
    Ok(())
}
