//! ReadNoEvil command line tooling
//!
//! Exposes modules for integration testing

pub mod cli;
pub mod config;
pub mod metrics;
pub mod scenario;

pub use config::{AppConfig, LoadedConfig};
pub use scenario::{Scenario, Simulation, SimulationReport, Step};
