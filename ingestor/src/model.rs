use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a registered device. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(i64);

impl DeviceId {
    pub fn new(id: i64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    /// Parses an identifier as it arrives in a header or body field.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<i64>().ok().and_then(Self::new)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Next id of a 1-based sequence whose current length is `count`.
    pub(crate) fn after(count: usize) -> Self {
        Self(count as i64 + 1)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered device. Provisioned out of band, never mutated here.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Device {
    pub device_id: i64,
    #[serde(skip_serializing)]
    pub device_key: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// One stored telemetry sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusReading {
    pub status_id: i64,
    pub device_id: i64,
    pub uptime: i64,
    pub temperature_c: i32,
    pub created_at: DateTime<Utc>,
}

/// A validated sample ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewStatus {
    pub device_id: DeviceId,
    pub uptime: i64,
    pub temperature_c: i32,
}

/// CREATE request body as sent by devices.
///
/// Fields stay loosely typed so that a malformed body can still yield a
/// device id for authentication before the payload itself is judged.
#[derive(Debug, Default, Deserialize)]
pub struct StatusPayload {
    #[serde(rename = "deviceID")]
    pub device_id: Option<serde_json::Value>,
    pub uptime: Option<serde_json::Value>,
    pub temperature: Option<serde_json::Value>,
}

impl StatusPayload {
    /// The `deviceID` field rendered as text, accepting numbers and strings.
    pub fn device_id_text(&self) -> Option<String> {
        match self.device_id.as_ref()? {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Response body shared by every reply of the status endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<StatusReading>>,
}

impl StatusResponse {
    pub fn message(status: &str) -> Self {
        Self {
            status: status.to_string(),
            data: None,
        }
    }

    pub fn with_data(data: Vec<StatusReading>) -> Self {
        Self {
            status: "OK".to_string(),
            data: Some(data),
        }
    }
}
