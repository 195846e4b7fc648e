//! Command-line front end

pub mod commands;
pub mod config;
pub mod prompt;

pub use commands::*;
pub use config::{ConfigError, Environment, OperatorConfig};
pub use prompt::{confirm, confirm_stdio};
