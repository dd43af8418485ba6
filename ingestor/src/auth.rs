use crate::errors::Result;
use crate::model::DeviceId;
use crate::store::{bounded, DeviceStore};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of checking a device's credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Id or key was not presented at all.
    NoAction,
    Denied,
    Authorized(DeviceId),
}

/// Checks a presented (id, key) pair against the device registry.
///
/// Absent or blank credentials never reach storage. An id that is not a
/// positive integer cannot match any row and is denied without a lookup.
/// The key is compared by plain equality inside the store query.
pub async fn authenticate(
    store: &dyn DeviceStore,
    device_id: Option<&str>,
    device_key: Option<&str>,
    timeout: Duration,
) -> Result<AuthOutcome> {
    let (raw_id, key) = match (non_blank(device_id), non_blank(device_key)) {
        (Some(raw_id), Some(key)) => (raw_id, key),
        _ => return Ok(AuthOutcome::NoAction),
    };

    let Some(id) = DeviceId::parse(raw_id) else {
        warn!(device_id = raw_id, "Rejected malformed device id");
        return Ok(AuthOutcome::Denied);
    };

    if bounded(timeout, store.device_matches(id, key)).await? {
        debug!(device_id = %id, "Device authenticated");
        Ok(AuthOutcome::Authorized(id))
    } else {
        warn!(device_id = %id, "Invalid device credentials");
        Ok(AuthOutcome::Denied)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
