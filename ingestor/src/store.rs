use crate::errors::{Error, Result};
use crate::model::{Device, DeviceId, NewStatus, StatusReading};
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Storage backend holding the device registry and the status history.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Looks the device up by id and key together. Returns true only when a
    /// row matches both.
    async fn device_matches(&self, device_id: DeviceId, device_key: &str) -> Result<bool>;

    /// Inserts one reading and returns it as stored.
    async fn insert_status(&self, status: &NewStatus) -> Result<StatusReading>;

    /// All readings of one device in creation order.
    async fn list_statuses(&self, device_id: DeviceId) -> Result<Vec<StatusReading>>;
}

/// Runs one storage call under a time bound; expiry is an `Error::Timeout`.
pub async fn bounded<T, F>(timeout: Duration, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, op)
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

#[derive(Default)]
struct Tables {
    devices: Vec<Device>,
    statuses: Vec<StatusReading>,
}

/// In-process backend standing in for Postgres in tests.
///
/// Enforces the same referential rule as the schema: a reading must point at
/// a registered device.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    operations: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device and returns its assigned id.
    pub async fn add_device(&self, name: &str, device_key: &str) -> DeviceId {
        let mut tables = self.tables.write().await;
        let device_id = DeviceId::after(tables.devices.len());
        tables.devices.push(Device {
            device_id: device_id.get(),
            device_key: device_key.to_string(),
            name: name.to_string(),
            description: None,
            location: None,
        });
        device_id
    }

    /// Number of storage calls served so far.
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn status_count(&self) -> usize {
        self.tables.read().await.statuses.len()
    }

    fn begin(&self) -> Result<()> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn device_matches(&self, device_id: DeviceId, device_key: &str) -> Result<bool> {
        self.begin()?;
        let tables = self.tables.read().await;
        Ok(tables
            .devices
            .iter()
            .any(|d| d.device_id == device_id.get() && d.device_key == device_key))
    }

    async fn insert_status(&self, status: &NewStatus) -> Result<StatusReading> {
        self.begin()?;
        let mut tables = self.tables.write().await;
        if !tables
            .devices
            .iter()
            .any(|d| d.device_id == status.device_id.get())
        {
            return Err(Error::Database(sqlx::Error::Protocol(format!(
                "status references unknown device {}",
                status.device_id
            ))));
        }

        let reading = StatusReading {
            status_id: tables.statuses.len() as i64 + 1,
            device_id: status.device_id.get(),
            uptime: status.uptime,
            temperature_c: status.temperature_c,
            created_at: Utc::now(),
        };
        tables.statuses.push(reading.clone());
        Ok(reading)
    }

    async fn list_statuses(&self, device_id: DeviceId) -> Result<Vec<StatusReading>> {
        self.begin()?;
        let tables = self.tables.read().await;
        Ok(tables
            .statuses
            .iter()
            .filter(|s| s.device_id == device_id.get())
            .cloned()
            .collect())
    }
}
