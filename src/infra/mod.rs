//! Postgres persistence, telemetry bootstrap and their error type.

pub mod db;
pub mod error;
pub mod telemetry;
