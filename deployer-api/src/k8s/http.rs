use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

use crate::k8s::{K8sClient, K8sError};

/// [`K8sClient`] implementation talking to the API server through [`kube`].
#[derive(Clone)]
pub struct HttpK8sClient {
    client: Client,
}

impl HttpK8sClient {
    /// Creates a client from the ambient configuration.
    ///
    /// Inside a pod this uses the mounted service account, elsewhere the
    /// local kubeconfig.
    pub async fn new() -> Result<HttpK8sClient, K8sError> {
        let client = Client::try_default().await?;

        Ok(HttpK8sClient { client })
    }

    fn namespaces_api(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn deployments_api(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services_api(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl K8sClient for HttpK8sClient {
    async fn list_namespaces(&self) -> Result<Vec<String>, K8sError> {
        let namespaces = self.namespaces_api().list(&ListParams::default()).await?;

        Ok(namespaces
            .items
            .into_iter()
            .filter_map(|namespace| namespace.metadata.name)
            .collect())
    }

    async fn create_namespace(&self, name: &str) -> Result<(), K8sError> {
        debug!(namespace = name, "creating namespace");

        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        self.namespaces_api()
            .create(&PostParams::default(), &namespace)
            .await?;

        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
        debug!(namespace = name, "deleting namespace");

        // Deletion is asynchronous on the server, the namespace goes through
        // the `Terminating` phase before disappearing.
        self.namespaces_api()
            .delete(name, &DeleteParams::default())
            .await?;

        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, K8sError> {
        Ok(self.deployments_api(namespace).get_opt(name).await?)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), K8sError> {
        debug!(
            namespace,
            name = deployment.metadata.name.as_deref(),
            "creating deployment"
        );

        self.deployments_api(namespace)
            .create(&PostParams::default(), deployment)
            .await?;

        Ok(())
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<(), K8sError> {
        debug!(namespace, name, "replacing deployment");

        self.deployments_api(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await?;

        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, K8sError> {
        Ok(self.services_api(namespace).get_opt(name).await?)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), K8sError> {
        debug!(
            namespace,
            name = service.metadata.name.as_deref(),
            "creating service"
        );

        self.services_api(namespace)
            .create(&PostParams::default(), service)
            .await?;

        Ok(())
    }

    async fn list_all_services(&self) -> Result<Vec<Service>, K8sError> {
        let services: Api<Service> = Api::all(self.client.clone());
        let services = services.list(&ListParams::default()).await?;

        Ok(services.items)
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, K8sError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = pods.list(&ListParams::default()).await?;

        Ok(pods.items)
    }
}
