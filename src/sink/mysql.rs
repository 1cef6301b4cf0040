//! Appends the datamart to a MySQL table.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Params, Pool, SslOpts, TxOpts, Value};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::enrich::{EnrichedRow, ENRICHED_COLUMNS};
use crate::error::SinkError;
use crate::sink::TableSink;

pub struct MySqlSink {
    config: DatabaseConfig,
}

impl MySqlSink {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn opts(&self) -> Opts {
        OptsBuilder::default()
            .ip_or_hostname(self.config.host.clone())
            .tcp_port(self.config.port)
            .db_name(Some(self.config.database.clone()))
            .user(Some(self.config.user.clone()))
            .pass(Some(self.config.password.clone()))
            .ssl_opts(self.config.ssl.then(SslOpts::default))
            .into()
    }

    async fn write(&self, pool: &Pool, rows: &[EnrichedRow]) -> Result<usize, SinkError> {
        let table = self.config.qualified_table();

        let mut conn = pool.get_conn().await.map_err(|source| SinkError::Connect {
            target: self.config.target(),
            source,
        })?;

        conn.query_drop(create_table_sql(&table))
            .await
            .map_err(|source| SinkError::CreateTable {
                table: table.clone(),
                source,
            })?;

        let insert_error = |source: mysql_async::Error| SinkError::Insert {
            table: table.clone(),
            source,
        };
        let params: Vec<Params> = rows.iter().map(row_params).collect();
        let mut tx = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(insert_error)?;
        tx.exec_batch(insert_sql(&table), params)
            .await
            .map_err(insert_error)?;
        tx.commit().await.map_err(insert_error)?;

        Ok(rows.len())
    }
}

#[async_trait]
impl TableSink for MySqlSink {
    fn target(&self) -> String {
        format!("{} table {}", self.config.target(), self.config.qualified_table())
    }

    #[tracing::instrument(skip_all, fields(db = %self.config.target(), rows = rows.len()))]
    async fn append(&self, rows: &[EnrichedRow]) -> Result<usize, SinkError> {
        let pool = Pool::new(self.opts());
        let written = self.write(&pool, rows).await;
        if let Err(e) = pool.disconnect().await {
            warn!(error = %e, "Closing the database pool failed");
        }
        let written = written?;
        info!(rows = written, "Database sink appended");
        Ok(written)
    }
}

/// DDL for the datamart table, used when the table does not exist yet.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         dt DATE NULL, \
         vendor_id INT NOT NULL, \
         payment_type INT NOT NULL, \
         ratecode_id INT NOT NULL, \
         sum_amount DOUBLE NULL, \
         avg_tips DOUBLE NULL, \
         rate_name VARCHAR(64) NOT NULL, \
         vendor_name VARCHAR(64) NOT NULL, \
         payment_name VARCHAR(64) NOT NULL)"
    )
}

pub fn insert_sql(table: &str) -> String {
    let placeholders = vec!["?"; ENRICHED_COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        ENRICHED_COLUMNS.join(", ")
    )
}

/// Positional parameters in [`ENRICHED_COLUMNS`] order. Dates go over the wire as
/// `YYYY-MM-DD` text.
pub fn row_params(row: &EnrichedRow) -> Params {
    Params::Positional(vec![
        Value::from(row.dt.map(|d| d.format("%Y-%m-%d").to_string())),
        Value::from(row.vendor_id),
        Value::from(row.payment_type),
        Value::from(row.ratecode_id),
        Value::from(row.sum_amount),
        Value::from(row.avg_tips),
        Value::from(row.rate_name.as_str()),
        Value::from(row.vendor_name.as_str()),
        Value::from(row.payment_name.as_str()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_insert_sql_lists_every_column() {
        assert_eq!(
            insert_sql("`taxi`.`datamart`"),
            "INSERT INTO `taxi`.`datamart` (dt, vendor_id, payment_type, ratecode_id, sum_amount, avg_tips, rate_name, vendor_name, payment_name) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_create_table_sql_has_no_unique_key() {
        let ddl = create_table_sql("`taxi`.`datamart`");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS `taxi`.`datamart` ("));
        for column in ENRICHED_COLUMNS {
            assert!(ddl.contains(column), "missing {column}");
        }
        assert!(!ddl.contains("PRIMARY KEY"));
        assert!(!ddl.contains("UNIQUE"));
    }

    #[test]
    fn test_row_params_order_and_nulls() {
        let Params::Positional(values) = row_params(&row()) else {
            panic!("expected positional params");
        };
        assert_eq!(values.len(), ENRICHED_COLUMNS.len());
        assert_eq!(values[0], Value::from("2024-01-01"));
        assert_eq!(values[1], Value::from(1i32));
        assert_eq!(values[4], Value::from(30.0f64));
        assert_eq!(values[5], Value::NULL);
        assert_eq!(values[8], Value::from("Cash"));
    }

    fn config(host: &str, port: u16) -> DatabaseConfig {
        DatabaseConfig {
            host: host.to_string(),
            port,
            database: "taxi".to_string(),
            table: "datamart".to_string(),
            user: "etl".to_string(),
            password: "secret".to_string(),
            ssl: false,
        }
    }

    fn row() -> EnrichedRow {
        EnrichedRow {
            dt: NaiveDate::from_ymd_opt(2024, 1, 1),
            vendor_id: 1,
            payment_type: 2,
            ratecode_id: 1,
            sum_amount: Some(30.0),
            avg_tips: None,
            rate_name: "Standard rate".to_string(),
            vendor_name: "Creative Mobile Technologies, LLC".to_string(),
            payment_name: "Cash".to_string(),
        }
    }

    #[test]
    fn test_target_hides_password() {
        let sink = MySqlSink::new(config("db.internal", 3306));
        let target = sink.target();
        assert!(target.contains("db.internal:3306"));
        assert!(target.contains("`taxi`.`datamart`"));
        assert!(!target.contains("secret"));
    }

    #[test]
    fn test_ssl_flag_sets_tls_options() {
        let plain = MySqlSink::new(config("db.internal", 3306));
        assert!(plain.opts().ssl_opts().is_none());

        let tls = MySqlSink::new(DatabaseConfig {
            ssl: true,
            ..config("db.internal", 3306)
        });
        assert!(tls.opts().ssl_opts().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_connect_error() {
        crate::logging::init_for_tests();
        let sink = MySqlSink::new(config("127.0.0.1", 1));

        let err = sink.append(&[row()]).await.unwrap_err();
        assert!(matches!(err, SinkError::Connect { .. }), "{err:?}");
        assert!(!err.to_string().contains("secret"));
    }
}
