use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::store::StateStore;
use crate::types::AlertState;

/// Row type of the `alert_state` table (see migrations/0001_alert_state.sql).
#[derive(Debug, sqlx::FromRow)]
struct AlertStateRow {
    threshold: f64,
    interval_minutes: i64,
    contract_end_cycle: Option<i64>,
    has_pending_alert: bool,
    last_observed_cycle: Option<i64>,
    last_observed_price: Option<f64>,
    last_alerted_price: Option<f64>,
}

/// One row per subject in a local SQLite database.
pub struct SqliteStore {
    pool: SqlitePool,
    defaults: AlertState,
}

impl SqliteStore {
    pub async fn open(path: &str, defaults: AlertState) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::from_pool(pool, defaults).await
    }

    /// Wrap an existing pool, applying migrations first.
    pub async fn from_pool(pool: SqlitePool, defaults: AlertState) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool, defaults })
    }

    fn state_from_row(&self, row: AlertStateRow) -> AlertState {
        AlertState {
            threshold: row.threshold,
            interval_minutes: u32::try_from(row.interval_minutes)
                .unwrap_or(self.defaults.interval_minutes),
            contract_end_cycle: row.contract_end_cycle,
            has_pending_alert: row.has_pending_alert,
            last_observed_cycle: row.last_observed_cycle,
            last_observed_price: row.last_observed_price,
            last_alerted_price: row.last_alerted_price,
        }
    }
}

impl StateStore for SqliteStore {
    async fn load(&self, subject: &str) -> Result<AlertState, StoreError> {
        let row = sqlx::query_as::<_, AlertStateRow>(
            r#"
            SELECT threshold, interval_minutes, contract_end_cycle, has_pending_alert,
                   last_observed_cycle, last_observed_price, last_alerted_price
            FROM alert_state
            WHERE subject = ?
            "#,
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => self.state_from_row(row),
            None => self.defaults.clone(),
        })
    }

    async fn save(&self, subject: &str, state: &AlertState) -> Result<(), StoreError> {
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        sqlx::query(
            r#"
            INSERT INTO alert_state (
                subject, threshold, interval_minutes, contract_end_cycle, has_pending_alert,
                last_observed_cycle, last_observed_price, last_alerted_price, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(subject) DO UPDATE SET
                threshold = excluded.threshold,
                interval_minutes = excluded.interval_minutes,
                contract_end_cycle = excluded.contract_end_cycle,
                has_pending_alert = excluded.has_pending_alert,
                last_observed_cycle = excluded.last_observed_cycle,
                last_observed_price = excluded.last_observed_price,
                last_alerted_price = excluded.last_alerted_price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(subject)
        .bind(state.threshold)
        .bind(i64::from(state.interval_minutes))
        .bind(state.contract_end_cycle)
        .bind(state.has_pending_alert)
        .bind(state.last_observed_cycle)
        .bind(state.last_observed_price)
        .bind(state.last_alerted_price)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
