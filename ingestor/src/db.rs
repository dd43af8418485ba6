use crate::config::Config;
use crate::errors::Result;
use crate::model::{DeviceId, NewStatus, StatusReading};
use crate::store::DeviceStore;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub async fn make_pool(config: &Config) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.storage_timeout)
        .connect_with(config.connect_options.clone())
        .await?;
    info!("Database connection established");

    if config.run_migrations {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations completed");
    }

    Ok(pool)
}

/// Postgres backed store over the `devices` and `status` tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DeviceStore for PgStore {
    async fn device_matches(&self, device_id: DeviceId, device_key: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT device_id FROM devices WHERE device_id = $1 AND device_key = $2")
                .bind(device_id.get())
                .bind(device_key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    async fn insert_status(&self, status: &NewStatus) -> Result<StatusReading> {
        let query = r#"
            INSERT INTO status (device_id, uptime, temperature_c)
            VALUES ($1, $2, $3)
            RETURNING status_id, device_id, uptime, temperature_c, created_at
            "#;

        let reading = sqlx::query_as::<_, StatusReading>(query)
            .bind(status.device_id.get())
            .bind(status.uptime)
            .bind(status.temperature_c)
            .fetch_one(&self.pool)
            .await?;

        Ok(reading)
    }

    async fn list_statuses(&self, device_id: DeviceId) -> Result<Vec<StatusReading>> {
        let query = r#"
            SELECT status_id, device_id, uptime, temperature_c, created_at
            FROM status
            WHERE device_id = $1
            ORDER BY created_at ASC, status_id ASC
            "#;

        let readings = sqlx::query_as::<_, StatusReading>(query)
            .bind(device_id.get())
            .fetch_all(&self.pool)
            .await?;

        Ok(readings)
    }
}
