pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod models;
pub mod server;
pub mod service;

pub use config::AppConfig;
pub use crate::core::{Event, EventHub, ExecutionReport};
pub use error::{Result, SyncError};
pub use models::{Device, FileRecord, SyncDirection, SyncPlan};
pub use service::SyncService;
