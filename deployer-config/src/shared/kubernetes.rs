use serde::{Deserialize, Serialize};

/// Settings describing how the API talks to the cluster.
///
/// The client itself is always built from the ambient configuration
/// (in-cluster service account or local kubeconfig), so these settings only
/// describe the cluster for logging and error reporting purposes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// Optional name of the cluster, attached to every production log line.
    #[serde(default)]
    pub cluster_name: Option<String>,
}
