use crate::model::{DeviceId, NewStatus, StatusPayload};
use serde_json::Value;
use thiserror::Error;

/// Why a CREATE body was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("body is not a JSON object")]
    Malformed,
    #[error("missing field {0}")]
    Missing(&'static str),
    #[error("field {0} is not an integer")]
    NotAnInteger(&'static str),
    #[error("field {0} is negative")]
    Negative(&'static str),
}

/// Turns a CREATE body into a reading for an authenticated device.
///
/// Temperature is taken as-is; only its type is checked.
pub fn validate(device_id: DeviceId, payload: &StatusPayload) -> Result<NewStatus, PayloadError> {
    let uptime = integer_field(payload.uptime.as_ref(), "uptime")?;
    if uptime < 0 {
        return Err(PayloadError::Negative("uptime"));
    }

    let temperature = integer_field(payload.temperature.as_ref(), "temperature")?;
    let temperature_c =
        i32::try_from(temperature).map_err(|_| PayloadError::NotAnInteger("temperature"))?;

    Ok(NewStatus {
        device_id,
        uptime,
        temperature_c,
    })
}

fn integer_field(value: Option<&Value>, field: &'static str) -> Result<i64, PayloadError> {
    match value {
        None | Some(Value::Null) => Err(PayloadError::Missing(field)),
        Some(v) => v.as_i64().ok_or(PayloadError::NotAnInteger(field)),
    }
}
