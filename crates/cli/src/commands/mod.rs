//! Subcommand implementations

pub mod controller;
pub mod episode;
pub mod telemetry;
