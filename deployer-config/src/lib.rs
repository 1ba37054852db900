//! Configuration management for the deployer services.
//!
//! Provides environment detection, configuration loading from YAML files and
//! environment variables, and the configuration types shared between the API
//! binary and its tests.

mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
