pub mod config;
pub mod summary;
pub mod telemetry;
