use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::k8s::{K8sClient, K8sError};
use crate::workloads::name::{WorkloadName, derive_workload_name};
use crate::workloads::ports::{PortAllocationError, allocate_node_port, node_ports_in_use};

/// Port the deployed container listens on, also used as the service port.
pub const CONTAINER_PORT: i32 = 8000;

/// Replicas of a newly created workload.
const INITIAL_REPLICAS: i32 = 1;

/// Label key selecting the pods of a workload.
const APP_LABEL: &str = "app";

/// Service type exposing workloads outside the cluster.
const NODE_PORT_SERVICE_TYPE: &str = "NodePort";

/// How many times a node port is allocated again after the API server
/// reported it as taken by a concurrently created service.
pub const MAX_NODE_PORT_ALLOCATION_ATTEMPTS: usize = 5;

/// What a deploy did to the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeployAction {
    Created,
    Updated,
}

impl DeployAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployAction::Created => "created",
            DeployAction::Updated => "updated",
        }
    }
}

/// Result of a successful deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub name: WorkloadName,
    pub action: DeployAction,
    /// Node port the workload is reachable at, `None` if it could not be
    /// read back after the deploy.
    pub node_port: Option<i32>,
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Namespace and image are required!")]
    InvalidRequest,

    #[error("Deployment update failed for {name} in namespace {namespace}: {source}")]
    DeploymentUpdate {
        namespace: String,
        name: WorkloadName,
        #[source]
        source: K8sError,
    },

    #[error("Deployment creation failed for {name} in namespace {namespace}: {source}")]
    DeploymentCreation {
        namespace: String,
        name: WorkloadName,
        #[source]
        source: K8sError,
    },

    #[error("Deployment {name} in namespace {namespace} has no container to update")]
    MissingContainer {
        namespace: String,
        name: WorkloadName,
    },

    #[error("Deployment {name} in namespace {namespace} disappeared while it was being deployed")]
    DeploymentVanished {
        namespace: String,
        name: WorkloadName,
    },

    /// The deployment exists but its service could not be created. Deploying
    /// again retries the service creation.
    #[error("Service creation failed for {name} in namespace {namespace}: {source}")]
    EndpointCreation {
        namespace: String,
        name: WorkloadName,
        #[source]
        source: K8sError,
    },

    #[error(
        "Service creation failed for {name} in namespace {namespace}: node ports kept being claimed concurrently after {attempts} attempts"
    )]
    NodePortContention {
        namespace: String,
        name: WorkloadName,
        attempts: usize,
    },

    #[error(transparent)]
    PortAllocation(#[from] PortAllocationError),
}

impl DeployError {
    /// Short label of the error used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::InvalidRequest => "invalid_request",
            DeployError::DeploymentUpdate { .. } => "deployment_update",
            DeployError::DeploymentCreation { .. } => "deployment_creation",
            DeployError::MissingContainer { .. } => "missing_container",
            DeployError::DeploymentVanished { .. } => "deployment_vanished",
            DeployError::EndpointCreation { .. } => "endpoint_creation",
            DeployError::NodePortContention { .. } => "node_port_contention",
            DeployError::PortAllocation(_) => "port_allocation",
        }
    }
}

/// Creates or updates the workload of an image and exposes it on a node
/// port.
///
/// The reconciler holds no state: every decision is taken on what the API
/// server returns during the call.
pub struct WorkloadReconciler<'a> {
    client: &'a dyn K8sClient,
}

impl<'a> WorkloadReconciler<'a> {
    pub fn new(client: &'a dyn K8sClient) -> Self {
        Self { client }
    }

    /// Deploys `image` into `namespace`.
    ///
    /// A missing workload is created together with a `NodePort` service on
    /// the lowest free node port. An existing workload only gets its image
    /// replaced and keeps its service and node port. If the service of an
    /// existing workload is missing, for instance because its creation failed
    /// on a previous deploy, it is created.
    pub async fn reconcile(
        &self,
        namespace: &str,
        image: &str,
    ) -> Result<DeployOutcome, DeployError> {
        if namespace.is_empty() || image.is_empty() {
            return Err(DeployError::InvalidRequest);
        }

        let name = derive_workload_name(image);
        if name.is_empty() {
            return Err(DeployError::InvalidRequest);
        }

        let action = match self.client.get_deployment(namespace, name.as_str()).await {
            Ok(Some(deployment)) => {
                self.update_image(namespace, &name, deployment, image)
                    .await?;
                DeployAction::Updated
            }
            Ok(None) => self.create_deployment(namespace, &name, image).await?,
            Err(source) => {
                return Err(DeployError::DeploymentUpdate {
                    namespace: namespace.to_owned(),
                    name,
                    source,
                });
            }
        };

        match action {
            DeployAction::Created => self.create_service(namespace, &name).await?,
            DeployAction::Updated => self.ensure_service(namespace, &name).await?,
        }

        let node_port = self.bound_node_port(namespace, &name).await;

        info!(
            namespace,
            name = name.as_str(),
            action = action.as_str(),
            node_port,
            "workload deployed"
        );
        metrics::counter!("deployer_deployments_total", "action" => action.as_str()).increment(1);

        Ok(DeployOutcome {
            name,
            action,
            node_port,
        })
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        name: &WorkloadName,
        image: &str,
    ) -> Result<DeployAction, DeployError> {
        let deployment = build_deployment(name, image);

        match self.client.create_deployment(namespace, &deployment).await {
            Ok(()) => Ok(DeployAction::Created),
            // A concurrent deploy of the same image created it between our
            // read and our create, so this deploy becomes an update.
            Err(error) if error.is_already_exists() => {
                info!(
                    namespace,
                    name = name.as_str(),
                    "deployment was created concurrently, updating it instead"
                );

                let deployment = self
                    .client
                    .get_deployment(namespace, name.as_str())
                    .await
                    .map_err(|source| DeployError::DeploymentUpdate {
                        namespace: namespace.to_owned(),
                        name: name.clone(),
                        source,
                    })?
                    .ok_or_else(|| DeployError::DeploymentVanished {
                        namespace: namespace.to_owned(),
                        name: name.clone(),
                    })?;
                self.update_image(namespace, name, deployment, image)
                    .await?;

                Ok(DeployAction::Updated)
            }
            Err(source) => Err(DeployError::DeploymentCreation {
                namespace: namespace.to_owned(),
                name: name.clone(),
                source,
            }),
        }
    }

    async fn update_image(
        &self,
        namespace: &str,
        name: &WorkloadName,
        mut deployment: Deployment,
        image: &str,
    ) -> Result<(), DeployError> {
        let container = deployment
            .spec
            .as_mut()
            .and_then(|spec| spec.template.spec.as_mut())
            .and_then(|pod_spec| workload_container(&mut pod_spec.containers, name))
            .ok_or_else(|| DeployError::MissingContainer {
                namespace: namespace.to_owned(),
                name: name.clone(),
            })?;
        container.image = Some(image.to_owned());

        self.client
            .replace_deployment(namespace, name.as_str(), &deployment)
            .await
            .map_err(|source| DeployError::DeploymentUpdate {
                namespace: namespace.to_owned(),
                name: name.clone(),
                source,
            })
    }

    /// Creates the service of an existing workload if it is missing.
    ///
    /// An existing service is never modified, its node port stays bound to
    /// the workload. The image is already replaced at this point, so a failed
    /// lookup only skips the check.
    async fn ensure_service(&self, namespace: &str, name: &WorkloadName) -> Result<(), DeployError> {
        let service_name = name.service_name();

        match self.client.get_service(namespace, &service_name).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                warn!(
                    namespace,
                    name = name.as_str(),
                    "service of existing workload is missing, creating it"
                );
                self.create_service(namespace, name).await
            }
            Err(error) => {
                warn!(
                    namespace,
                    name = name.as_str(),
                    %error,
                    "failed to check the service of the updated workload"
                );
                Ok(())
            }
        }
    }

    /// Creates the `NodePort` service of a workload on the lowest free node
    /// port.
    ///
    /// The set of ports in use is read again on every attempt. If another
    /// service claims the chosen port before ours is created, the API server
    /// rejects ours and a new port is allocated.
    async fn create_service(&self, namespace: &str, name: &WorkloadName) -> Result<(), DeployError> {
        let endpoint_error = |source: K8sError| DeployError::EndpointCreation {
            namespace: namespace.to_owned(),
            name: name.clone(),
            source,
        };

        for attempt in 1..=MAX_NODE_PORT_ALLOCATION_ATTEMPTS {
            let services = self
                .client
                .list_all_services()
                .await
                .map_err(endpoint_error)?;
            let node_port = allocate_node_port(&node_ports_in_use(&services))?;

            let service = build_service(name, node_port);
            match self.client.create_service(namespace, &service).await {
                Ok(()) => {
                    metrics::counter!("deployer_node_port_allocations_total").increment(1);
                    info!(namespace, name = name.as_str(), node_port, "service created");

                    return Ok(());
                }
                // Someone else exposed the workload in the meantime, its node
                // port is the one to keep.
                Err(error) if error.is_already_exists() => {
                    info!(
                        namespace,
                        name = name.as_str(),
                        "service was created concurrently, keeping it"
                    );

                    return Ok(());
                }
                Err(error) if error.is_node_port_allocated() => {
                    warn!(
                        namespace,
                        name = name.as_str(),
                        node_port,
                        attempt,
                        "node port was claimed concurrently, allocating another one"
                    );
                }
                Err(source) => return Err(endpoint_error(source)),
            }
        }

        Err(DeployError::NodePortContention {
            namespace: namespace.to_owned(),
            name: name.clone(),
            attempts: MAX_NODE_PORT_ALLOCATION_ATTEMPTS,
        })
    }

    /// Reads the node port of the workload's service.
    ///
    /// The deploy already succeeded at this point, so failures only result in
    /// `None`.
    async fn bound_node_port(&self, namespace: &str, name: &WorkloadName) -> Option<i32> {
        match self.client.get_service(namespace, &name.service_name()).await {
            Ok(service) => service
                .and_then(|service| service.spec)
                .and_then(|spec| spec.ports)
                .and_then(|ports| ports.first().and_then(|port| port.node_port)),
            Err(error) => {
                warn!(
                    namespace,
                    name = name.as_str(),
                    %error,
                    "failed to read back the node port of the workload"
                );
                None
            }
        }
    }
}

/// Picks the container named after the workload, or the first one for
/// deployments created by other tools.
fn workload_container<'c>(
    containers: &'c mut [Container],
    name: &WorkloadName,
) -> Option<&'c mut Container> {
    let index = containers
        .iter()
        .position(|container| container.name == name.as_str())
        .unwrap_or(0);

    containers.get_mut(index)
}

fn app_labels(name: &WorkloadName) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_owned(), name.to_string())])
}

/// Builds the deployment of a new workload: one replica of `image`
/// listening on [`CONTAINER_PORT`].
pub fn build_deployment(name: &WorkloadName, image: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(INITIAL_REPLICAS),
            selector: LabelSelector {
                match_labels: Some(app_labels(name)),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_labels(name)),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.to_string(),
                        image: Some(image.to_owned()),
                        ports: Some(vec![ContainerPort {
                            container_port: CONTAINER_PORT,
                            ..ContainerPort::default()
                        }]),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// Builds the `NodePort` service exposing [`CONTAINER_PORT`] of a workload
/// on `node_port`.
pub fn build_service(name: &WorkloadName, node_port: i32) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.service_name()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(NODE_PORT_SERVICE_TYPE.to_owned()),
            selector: Some(app_labels(name)),
            ports: Some(vec![ServicePort {
                port: CONTAINER_PORT,
                target_port: Some(IntOrString::Int(CONTAINER_PORT)),
                node_port: Some(node_port),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}
