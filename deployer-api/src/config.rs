use deployer_config::shared::{ApplicationSettings, KubernetesConfig, SentryConfig};
use serde::Deserialize;

/// Complete configuration of the deployer API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Application server settings.
    pub application: ApplicationSettings,
    /// Cluster related settings.
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    /// Optional Sentry configuration for error tracking.
    pub sentry: Option<SentryConfig>,
}
