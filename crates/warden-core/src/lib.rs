pub mod auth;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod security;
pub mod testing;

pub use cleanup::{CleanupJob, CleanupReport, CleanupScheduler, TableOutcome, TableReport};
pub use config::Config;
pub use engine::{RefreshedSession, SessionStart, Warden};
pub use error::WardenError;
pub use security::ClientInfo;
pub use testing::{TestWarden, memory_db};
