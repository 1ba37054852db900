#![allow(dead_code)]

use deployer_api::k8s::K8sClient;
use deployer_api::routes::deployments::DeployRequest;
use deployer_api::routes::namespaces::CreateNamespaceRequest;
use deployer_api::{config::ApiConfig, startup::run};
use deployer_config::{Environment, load_config};
use std::io;
use std::net::TcpListener;
use std::sync::Arc;

use crate::support::k8s_client::MockK8sClient;

pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub k8s_client: Arc<MockK8sClient>,
    server_handle: tokio::task::JoinHandle<io::Result<()>>,
}

impl TestApp {
    pub async fn create_namespace(&self, namespace: &CreateNamespaceRequest) -> reqwest::Response {
        self.api_client
            .post(format!("{}/v1/namespaces", &self.address))
            .json(namespace)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn read_all_namespaces(&self) -> reqwest::Response {
        self.api_client
            .get(format!("{}/v1/namespaces", &self.address))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn delete_namespace(&self, namespace: &str) -> reqwest::Response {
        self.api_client
            .delete(format!("{}/v1/namespaces/{namespace}", &self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn deploy(&self, deployment: &DeployRequest) -> reqwest::Response {
        self.api_client
            .post(format!("{}/v1/deployments", &self.address))
            .json(deployment)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn read_status(&self, namespace: Option<&str>) -> reqwest::Response {
        let mut request = self
            .api_client
            .get(format!("{}/v1/status", &self.address));
        if let Some(namespace) = namespace {
            request = request.query(&[("namespace", namespace)]);
        }

        request
            .send()
            .await
            .expect("failed to execute request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_test_app_with(MockK8sClient::new()).await
}

/// Starts the API against the given in-memory cluster.
pub async fn spawn_test_app_with(k8s_client: MockK8sClient) -> TestApp {
    // We set the environment to dev.
    Environment::Dev.set();

    let base_address = "127.0.0.1";
    let listener =
        TcpListener::bind(format!("{base_address}:0")).expect("failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let config = load_config::<ApiConfig>().expect("Failed to read configuration");

    let k8s_client = Arc::new(k8s_client);

    let server = run(config, listener, k8s_client.clone() as Arc<dyn K8sClient>)
        .await
        .expect("failed to bind address");

    let server_handle = tokio::spawn(server);

    TestApp {
        address: format!("http://{base_address}:{port}"),
        api_client: reqwest::Client::new(),
        k8s_client,
        server_handle,
    }
}
