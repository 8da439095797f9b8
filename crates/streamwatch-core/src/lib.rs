//! Core streamwatch library (config, status providers, poller).

pub mod config;
pub mod logging;
pub mod poller;
pub mod provider;
