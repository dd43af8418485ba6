use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Body of one status report, in the ingestor's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(rename = "deviceID")]
    pub device_id: i64,
    pub uptime: i64,
    pub temperature: i64,
}

impl StatusReport {
    /// Samples both sensor files.
    pub fn read(device_id: i64, uptime_file: &Path, temperature_file: &Path) -> Result<Self> {
        let uptime = std::fs::read_to_string(uptime_file)
            .with_context(|| format!("reading {}", uptime_file.display()))?;
        let temperature = std::fs::read_to_string(temperature_file)
            .with_context(|| format!("reading {}", temperature_file.display()))?;

        Ok(Self {
            device_id,
            uptime: parse_uptime(&uptime)?,
            temperature: parse_temperature(&temperature)?,
        })
    }
}

/// Whole seconds from a `/proc/uptime` style line ("12345.67 54321.00").
pub fn parse_uptime(contents: &str) -> Result<i64> {
    let first = contents
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("uptime file is empty"))?;
    let seconds = first.split('.').next().unwrap_or(first);
    seconds
        .parse()
        .with_context(|| format!("invalid uptime value {:?}", first))
}

/// Whole degrees Celsius from a thermal zone reading in millidegrees.
pub fn parse_temperature(contents: &str) -> Result<i64> {
    let raw = contents.trim();
    let millidegrees: i64 = raw
        .parse()
        .with_context(|| format!("invalid temperature value {:?}", raw))?;
    Ok(millidegrees / 1000)
}
