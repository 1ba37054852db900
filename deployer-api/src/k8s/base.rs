use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use thiserror::Error;

/// Status code returned by the API server on name or version conflicts.
const CONFLICT_CODE: u16 = 409;

/// Status code returned by the API server for invalid objects.
const UNPROCESSABLE_ENTITY_CODE: u16 = 422;

/// Reason reported when an object with the same name already exists.
pub const ALREADY_EXISTS_REASON: &str = "AlreadyExists";

/// Reason reported when an object fails validation.
pub const INVALID_REASON: &str = "Invalid";

/// Message fragment the API server uses when a requested node port is
/// already claimed by another service.
pub const NODE_PORT_ALLOCATED_MESSAGE: &str = "provided port is already allocated";

/// Errors emitted by the Kubernetes integration.
#[derive(Debug, Error)]
pub enum K8sError {
    /// The API server rejected the request with a status response.
    ///
    /// The message is the human readable one from the response body.
    #[error("{message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },
    /// Any other error from the [`kube`] client, e.g. transport failures.
    #[error("An error occurred with kube when dealing with K8s: {0}")]
    Kube(#[source] kube::Error),
}

impl K8sError {
    /// Builds an [`K8sError::Api`] error.
    pub fn api(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        K8sError::Api {
            code,
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status code reported by the API server, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            K8sError::Api { code, .. } => Some(*code),
            K8sError::Kube(_) => None,
        }
    }

    /// Returns `true` when a create was rejected because an object with the
    /// same name exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            K8sError::Api { code, reason, .. }
                if *code == CONFLICT_CODE && reason == ALREADY_EXISTS_REASON
        )
    }

    /// Returns `true` when a service was rejected because its node port is
    /// taken by another service.
    pub fn is_node_port_allocated(&self) -> bool {
        matches!(
            self,
            K8sError::Api { code, message, .. }
                if *code == UNPROCESSABLE_ENTITY_CODE
                    && message.contains(NODE_PORT_ALLOCATED_MESSAGE)
        )
    }
}

impl From<kube::Error> for K8sError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) => K8sError::Api {
                code: response.code,
                reason: response.reason,
                message: response.message,
            },
            error => K8sError::Kube(error),
        }
    }
}

/// Client interface describing the Kubernetes operations used by the API.
///
/// Every call goes to the API server. Implementations must not cache
/// objects, since other actors can change the cluster at any time.
#[async_trait]
pub trait K8sClient: Send + Sync {
    /// Returns the names of all namespaces in the cluster.
    async fn list_namespaces(&self) -> Result<Vec<String>, K8sError>;

    async fn create_namespace(&self, name: &str) -> Result<(), K8sError>;

    /// Deletes a namespace. The API server removes every object inside it.
    async fn delete_namespace(&self, name: &str) -> Result<(), K8sError>;

    /// Reads a [`Deployment`], returning `None` if it does not exist.
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, K8sError>;

    /// Creates a [`Deployment`].
    ///
    /// Fails with an already exists error if the name is taken.
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), K8sError>;

    /// Replaces a [`Deployment`] with the given object.
    ///
    /// The object's resource version is sent along, so a concurrent
    /// modification since it was read results in a conflict.
    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<(), K8sError>;

    /// Reads a [`Service`], returning `None` if it does not exist.
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, K8sError>;

    /// Creates a [`Service`].
    ///
    /// The API server rejects node ports that are already claimed by another
    /// service, see [`K8sError::is_node_port_allocated`].
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), K8sError>;

    /// Lists the services of every namespace.
    async fn list_all_services(&self) -> Result<Vec<Service>, K8sError>;

    /// Lists the pods of a namespace in the order returned by the API server.
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, K8sError>;
}
