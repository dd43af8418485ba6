use crate::errors::{Error, Result};
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings for the ingestor, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub connect_options: PgConnectOptions,
    pub http_addr: String,
    pub max_connections: u32,
    pub storage_timeout: Duration,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connect_options = match lookup("DATABASE_URL") {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .map_err(|e| Error::Config(format!("DATABASE_URL is invalid: {}", e)))?,
            None => connect_options_from_parts(&lookup)?,
        };

        let http_addr = lookup("HTTP_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?;
        if max_connections == 0 {
            return Err(Error::Config("DB_MAX_CONNECTIONS must be at least 1".to_string()));
        }
        let timeout_ms: u64 = parse_or(&lookup, "STORAGE_TIMEOUT_MS", 5000)?;
        let run_migrations: bool = parse_or(&lookup, "RUN_MIGRATIONS", true)?;

        Ok(Self {
            connect_options,
            http_addr,
            max_connections,
            storage_timeout: Duration::from_millis(timeout_ms),
            run_migrations,
        })
    }

    /// Database location without credentials, for logging.
    pub fn database_host(&self) -> String {
        format!(
            "{}:{}/{}",
            self.connect_options.get_host(),
            self.connect_options.get_port(),
            self.connect_options.get_database().unwrap_or("-")
        )
    }
}

/// Connection settings from `DB_*` variables. The password comes from
/// `DB_PASSWORD_FILE` when set, else `DB_PASSWORD`, and is passed through
/// verbatim.
fn connect_options_from_parts<F>(lookup: &F) -> Result<PgConnectOptions>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port: u16 = parse_or(lookup, "DB_PORT", 5432)?;
    let name = lookup("DB_NAME").unwrap_or_else(|| "iot".to_string());
    let user = lookup("DB_USER").unwrap_or_else(|| "iot".to_string());
    let password = match lookup("DB_PASSWORD_FILE") {
        Some(path) => fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("cannot read DB_PASSWORD_FILE {}: {}", path, e)))?
            .trim_end()
            .to_string(),
        None => lookup("DB_PASSWORD").unwrap_or_default(),
    };

    let options = PgConnectOptions::new_without_pgpass()
        .host(&host)
        .port(port)
        .database(&name)
        .username(&user);

    Ok(if password.is_empty() {
        options
    } else {
        options.password(&password)
    })
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, raw))),
        None => Ok(default),
    }
}
