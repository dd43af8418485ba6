//! Device status ingestion service.
//!
//! Devices authenticate with an (id, key) pair and either report one status
//! reading (`POST`) or fetch their full history (`GET`).

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handler;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod store;
pub mod validate;

pub use config::Config;
pub use errors::{Error, Result};
pub use handler::{StatusReply, StatusRequest, StatusService};
pub use store::{DeviceStore, MemoryStore};
