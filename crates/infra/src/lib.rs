//! Infrastructure layer: repositories, subscribers, services, config and wiring.

pub mod bootstrap;
pub mod config;
pub mod feed;
pub mod read_model;
pub mod repositories;
pub mod services;
pub mod subscribers;

#[cfg(test)]
mod integration_tests;

pub use bootstrap::Application;
pub use config::{AppConfig, ConfigError};
