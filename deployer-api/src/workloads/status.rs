use k8s_openapi::api::core::v1::{ContainerState, ContainerStatus, Pod};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::k8s::{K8sClient, K8sError};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Namespace is required!")]
    InvalidRequest,

    #[error("Failed to list the pods of namespace {namespace}: {source}")]
    StatusQuery {
        namespace: String,
        #[source]
        source: K8sError,
    },
}

/// Lifecycle of a single container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ContainerLifecycle {
    Running,
    Waiting,
    Terminated,
    Unknown,
}

impl ContainerLifecycle {
    /// Classifies a container state.
    ///
    /// A state should only ever carry one of running, waiting or terminated.
    /// If several are set anyway, running wins over waiting which wins over
    /// terminated.
    pub fn from_state(state: Option<&ContainerState>) -> ContainerLifecycle {
        let Some(state) = state else {
            return ContainerLifecycle::Unknown;
        };

        if state.running.is_some() {
            ContainerLifecycle::Running
        } else if state.waiting.is_some() {
            ContainerLifecycle::Waiting
        } else if state.terminated.is_some() {
            ContainerLifecycle::Terminated
        } else {
            ContainerLifecycle::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContainerStatusSnapshot {
    #[schema(example = "my-app")]
    pub name: String,
    #[schema(example = "registry/team/my-app:v2")]
    pub image: String,
    pub state: ContainerLifecycle,
}

impl From<&ContainerStatus> for ContainerStatusSnapshot {
    fn from(status: &ContainerStatus) -> Self {
        ContainerStatusSnapshot {
            name: status.name.clone(),
            image: status.image.clone(),
            state: ContainerLifecycle::from_state(status.state.as_ref()),
        }
    }
}

/// Point in time view of a pod and its containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PodStatusSnapshot {
    #[schema(example = "my-app-6d4cf56db6-x2x7v")]
    pub pod_name: String,
    /// Pod phase as reported by Kubernetes, e.g. `Pending` or `Running`.
    #[schema(example = "Running")]
    pub phase: Option<String>,
    pub containers: Vec<ContainerStatusSnapshot>,
}

impl From<&Pod> for PodStatusSnapshot {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();

        PodStatusSnapshot {
            pod_name: pod.metadata.name.clone().unwrap_or_default(),
            phase: status.and_then(|status| status.phase.clone()),
            containers: status
                .and_then(|status| status.container_statuses.as_ref())
                .map(|statuses| statuses.iter().map(Into::into).collect())
                .unwrap_or_default(),
        }
    }
}

/// Lists the pods of `namespace` with the lifecycle of each of their
/// containers, in the order the API server returns them.
pub async fn project_pod_statuses(
    client: &dyn K8sClient,
    namespace: &str,
) -> Result<Vec<PodStatusSnapshot>, StatusError> {
    if namespace.is_empty() {
        return Err(StatusError::InvalidRequest);
    }

    let pods = client
        .list_pods(namespace)
        .await
        .map_err(|source| StatusError::StatusQuery {
            namespace: namespace.to_owned(),
            source,
        })?;

    Ok(pods.iter().map(Into::into).collect())
}
