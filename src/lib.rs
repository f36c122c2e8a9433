//! SafetySight backend: HIRAC register storage, dashboard risk aggregation
//! and the hazard-description assist, served over HTTP.

pub mod assist;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod risk;
pub mod routes;
pub mod telemetry;
