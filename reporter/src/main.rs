mod telemetry;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use telemetry::StatusReport;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Reports this device's uptime and temperature to the status ingestor.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Status endpoint, e.g. http://ingestor:8080/status
    #[arg(long, env = "STATUS_URL")]
    url: String,

    #[arg(long, env = "DEVICE_ID")]
    device_id: i64,

    #[arg(long, env = "DEVICE_KEY", hide_env_values = true)]
    device_key: String,

    #[arg(long, env = "UPTIME_FILE", default_value = "/proc/uptime")]
    uptime_file: PathBuf,

    #[arg(
        long,
        env = "TEMPERATURE_FILE",
        default_value = "/sys/class/thermal/thermal_zone0/temp"
    )]
    temperature_file: PathBuf,

    /// Keep reporting every N seconds instead of sending once
    #[arg(long, env = "REPORT_EVERY")]
    every: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, env = "REPORT_TIMEOUT", default_value_t = 10)]
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct ReplyBody {
    status: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .context("building HTTP client")?;

    let Some(every) = args.every else {
        return report_once(&client, &args).await;
    };

    info!("Reporting to {} every {}s", args.url, every);
    let mut ticker = tokio::time::interval(Duration::from_secs(every.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = report_once(&client, &args).await {
                    error!("Report failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                return Ok(());
            }
        }
    }
}

async fn report_once(client: &reqwest::Client, args: &Args) -> Result<()> {
    let report = StatusReport::read(args.device_id, &args.uptime_file, &args.temperature_file)?;

    let response = client
        .post(&args.url)
        .header("X-Device-Key", &args.device_key)
        .json(&report)
        .send()
        .await
        .with_context(|| format!("sending report to {}", args.url))?;

    let code = response.status();
    let reply: ReplyBody = response
        .json()
        .await
        .with_context(|| format!("reading reply (HTTP {})", code))?;

    if !code.is_success() || reply.status != "OK" {
        bail!("ingestor answered HTTP {}: {}", code, reply.status);
    }

    info!(
        uptime = report.uptime,
        temperature = report.temperature,
        "Status reported"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Answers like the ingestor: OK for key "abc" with the expected body,
    /// "No action" for key "no-device", 401 otherwise.
    async fn fake_status(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let key = headers
            .get("x-device-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let well_formed = body["deviceID"] == 7 && body["uptime"] == 100 && body["temperature"] == 20;

        match key {
            "abc" if well_formed => (StatusCode::OK, Json(json!({"status": "OK"}))),
            "no-device" => (StatusCode::OK, Json(json!({"status": "No action"}))),
            _ => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"status": "invalid authorization or device"})),
            ),
        }
    }

    struct Sensors {
        uptime: NamedTempFile,
        temperature: NamedTempFile,
    }

    fn sensors() -> Sensors {
        let mut uptime = NamedTempFile::new().unwrap();
        writeln!(uptime, "100.42 380.10").unwrap();
        let mut temperature = NamedTempFile::new().unwrap();
        writeln!(temperature, "20750").unwrap();
        Sensors { uptime, temperature }
    }

    async fn start_server() -> String {
        let app = Router::new().route("/status", post(fake_status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/status", addr)
    }

    fn args(url: &str, key: &str, sensors: &Sensors) -> Args {
        Args {
            url: url.to_string(),
            device_id: 7,
            device_key: key.to_string(),
            uptime_file: sensors.uptime.path().to_path_buf(),
            temperature_file: sensors.temperature.path().to_path_buf(),
            every: None,
            timeout: 5,
        }
    }

    #[tokio::test]
    async fn test_accepted_report() {
        let url = start_server().await;
        let sensors = sensors();

        let result = report_once(&reqwest::Client::new(), &args(&url, "abc", &sensors)).await;

        assert!(result.is_ok(), "{:?}", result);
    }

    #[tokio::test]
    async fn test_unauthorized_reply_is_an_error() {
        let url = start_server().await;
        let sensors = sensors();

        let err = report_once(&reqwest::Client::new(), &args(&url, "wrong", &sensors))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("401"), "{}", err);
    }

    #[tokio::test]
    async fn test_no_action_reply_is_an_error() {
        let url = start_server().await;
        let sensors = sensors();

        let err = report_once(&reqwest::Client::new(), &args(&url, "no-device", &sensors))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("No action"), "{}", err);
    }

    #[tokio::test]
    async fn test_unreachable_ingestor_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/status", listener.local_addr().unwrap());
        drop(listener);
        let sensors = sensors();

        let result = report_once(&reqwest::Client::new(), &args(&url, "abc", &sensors)).await;

        assert!(result.is_err());
    }
}
