use crate::errors::Error;
use crate::handler::{Operation, StatusReply, StatusRequest, StatusService};
use crate::metrics::{self, REQUEST_LATENCY_SECONDS, STORAGE_FAILURES_TOTAL};
use crate::model::StatusResponse;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tokio::time::Instant;
use tracing::error;

pub const DEVICE_ID_HEADER: &str = "x-device-id";
pub const DEVICE_KEY_HEADER: &str = "x-device-key";

#[derive(Clone)]
struct AppState {
    service: StatusService,
}

pub fn create_router(service: StatusService) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/", any(status))
        .route("/status", any(status))
        .route("/health", get(|| async { "ok" }))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn status(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusReply, AppError> {
    let start = Instant::now();
    let request = StatusRequest {
        operation: Operation::from_method(method.as_str()),
        device_id_header: header_text(&headers, DEVICE_ID_HEADER),
        device_key_header: header_text(&headers, DEVICE_KEY_HEADER),
        body: body.to_vec(),
    };

    let reply = state.service.handle(request).await;
    REQUEST_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
    Ok(reply?)
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

impl IntoResponse for StatusReply {
    fn into_response(self) -> Response {
        let (code, body) = match self {
            StatusReply::NoAction => (StatusCode::OK, StatusResponse::message("No action")),
            StatusReply::Created(_) => (StatusCode::OK, StatusResponse::message("OK")),
            StatusReply::Readings(readings) => (StatusCode::OK, StatusResponse::with_data(readings)),
            StatusReply::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                StatusResponse::message("invalid authorization or device"),
            ),
            StatusReply::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                StatusResponse::message("method not allowed"),
            ),
            StatusReply::InvalidPayload(_) => (
                StatusCode::BAD_REQUEST,
                StatusResponse::message("invalid payload"),
            ),
        };
        (code, Json(body)).into_response()
    }
}

/// Storage faults surfaced to the caller without internal detail.
struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Status request failed: {}", self.0);
        STORAGE_FAILURES_TOTAL.inc();

        let (code, message) = if self.0.is_transient() {
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        };
        (code, Json(StatusResponse::message(message))).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
