use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Base configuration file loaded for all environments.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between the prefix and the first key segment.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested keys in environment variables.
///
/// Example: `APP_APPLICATION__PORT=8080` sets `application.port`.
const ENV_SEPARATOR: &str = "__";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to detect the running environment: {0}")]
    Environment(#[source] std::io::Error),

    #[error("failed to build or deserialize the configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Loads configuration from the `configuration` directory in the current
/// working directory.
///
/// Sources are layered in this order, later ones overriding earlier ones:
/// 1. `configuration/base.yaml`
/// 2. `configuration/{environment}.yaml`
/// 3. environment variables prefixed with `APP_`, nested with `__`
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), &environment)
}

/// Loads configuration from an explicit directory for a given environment.
pub fn load_config_from<T>(
    configuration_directory: &Path,
    environment: &Environment,
) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let environment_file: PathBuf = configuration_directory.join(format!("{environment}.yaml"));

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join(BASE_CONFIG_FILE),
        ))
        // The environment file is optional so that a single base file is
        // enough for local runs.
        .add_source(config::File::from(environment_file).required(false))
        .add_source(environment_source)
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}
