//! Infrastructure adapters: persistence, HTTP surface, media storage and telemetry.

pub mod assets;
pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod uploads;
