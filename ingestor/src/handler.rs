use crate::auth::{authenticate, AuthOutcome};
use crate::errors::Result;
use crate::metrics::{AUTH_DENIED_TOTAL, NO_ACTION_TOTAL, STATUS_CREATED_TOTAL, STATUS_QUERIES_TOTAL};
use crate::model::{DeviceId, StatusPayload, StatusReading};
use crate::store::{bounded, DeviceStore};
use crate::validate::{validate, PayloadError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the caller asked for, derived from the request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create,
    Retrieve,
    Other(String),
}

impl Operation {
    pub fn from_method(method: &str) -> Self {
        match method {
            "POST" => Operation::Create,
            "GET" => Operation::Retrieve,
            other => Operation::Other(other.to_string()),
        }
    }
}

/// One inbound status request, already split out of its transport.
#[derive(Debug, Clone)]
pub struct StatusRequest {
    pub operation: Operation,
    pub device_id_header: Option<String>,
    pub device_key_header: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusReply {
    NoAction,
    Created(StatusReading),
    Readings(Vec<StatusReading>),
    Unauthorized,
    MethodNotAllowed,
    InvalidPayload(PayloadError),
}

/// Shared state every request is handled against.
#[derive(Clone)]
pub struct StatusService {
    store: Arc<dyn DeviceStore>,
    timeout: Duration,
}

impl StatusService {
    pub fn new(store: Arc<dyn DeviceStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Authenticates the request, then stores or lists readings for the
    /// device. Nothing is written unless authentication succeeded first.
    pub async fn handle(&self, request: StatusRequest) -> Result<StatusReply> {
        let payload = match request.operation {
            Operation::Create => parse_payload(&request.body),
            _ => None,
        };

        let device_id = payload
            .as_ref()
            .and_then(StatusPayload::device_id_text)
            .or(request.device_id_header);

        let outcome = authenticate(
            self.store.as_ref(),
            device_id.as_deref(),
            request.device_key_header.as_deref(),
            self.timeout,
        )
        .await?;

        let device_id = match outcome {
            AuthOutcome::NoAction => {
                debug!("Request without credentials");
                NO_ACTION_TOTAL.inc();
                return Ok(StatusReply::NoAction);
            }
            AuthOutcome::Denied => {
                AUTH_DENIED_TOTAL.inc();
                return Ok(StatusReply::Unauthorized);
            }
            AuthOutcome::Authorized(device_id) => device_id,
        };

        match request.operation {
            Operation::Create => self.create(device_id, payload).await,
            Operation::Retrieve => self.retrieve(device_id).await,
            Operation::Other(method) => {
                debug!(device_id = %device_id, method = %method, "Unsupported method");
                Ok(StatusReply::MethodNotAllowed)
            }
        }
    }

    async fn create(
        &self,
        device_id: DeviceId,
        payload: Option<StatusPayload>,
    ) -> Result<StatusReply> {
        let payload = match payload {
            Some(payload) => payload,
            None => {
                warn!(device_id = %device_id, "Status body is not a JSON object");
                return Ok(StatusReply::InvalidPayload(PayloadError::Malformed));
            }
        };

        let status = match validate(device_id, &payload) {
            Ok(status) => status,
            Err(e) => {
                warn!(device_id = %device_id, "Rejected status: {}", e);
                return Ok(StatusReply::InvalidPayload(e));
            }
        };

        let reading = bounded(self.timeout, self.store.insert_status(&status)).await?;
        STATUS_CREATED_TOTAL.inc();
        info!(
            device_id = %device_id,
            status_id = reading.status_id,
            "Stored status reading"
        );
        Ok(StatusReply::Created(reading))
    }

    async fn retrieve(&self, device_id: DeviceId) -> Result<StatusReply> {
        let readings = bounded(self.timeout, self.store.list_statuses(device_id)).await?;
        STATUS_QUERIES_TOTAL.inc();
        debug!(device_id = %device_id, count = readings.len(), "Listed status readings");
        Ok(StatusReply::Readings(readings))
    }
}

/// Only a JSON object counts as a CREATE body.
fn parse_payload(body: &[u8]) -> Option<StatusPayload> {
    match serde_json::from_slice::<serde_json::Value>(body).ok()? {
        value @ serde_json::Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }
}
