#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use deployer_api::k8s::{
    ALREADY_EXISTS_REASON, INVALID_REASON, K8sClient, K8sError, NODE_PORT_ALLOCATED_MESSAGE,
};
use deployer_api::workloads::ports::node_ports_in_use;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Namespace holding the services created by simulated concurrent callers.
pub const OTHER_CALLERS_NAMESPACE: &str = "other-callers";

type ObjectKey = (String, String);

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_owned(), name.to_owned())
}

fn not_found(kind: &str, name: &str) -> K8sError {
    K8sError::api(404, "NotFound", format!("{kind} \"{name}\" not found"))
}

fn already_exists(kind: &str, name: &str) -> K8sError {
    K8sError::api(
        409,
        ALREADY_EXISTS_REASON,
        format!("{kind} \"{name}\" already exists"),
    )
}

fn node_port_allocated(name: &str, node_port: i32) -> K8sError {
    K8sError::api(
        422,
        INVALID_REASON,
        format!(
            "Service \"{name}\" is invalid: spec.ports[0].nodePort: Invalid value: {node_port}: {NODE_PORT_ALLOCATED_MESSAGE}"
        ),
    )
}

fn internal_error(message: &str) -> K8sError {
    K8sError::api(500, "InternalError", message)
}

fn first_node_port(service: &Service) -> Option<i32> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .and_then(|port| port.node_port)
}

/// Builds a `NodePort` service claiming `node_port`.
pub fn node_port_service(name: &str, node_port: i32) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_owned()),
            ports: Some(vec![ServicePort {
                port: 80,
                node_port: Some(node_port),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

#[derive(Default)]
struct ClusterState {
    namespaces: BTreeSet<String>,
    deployments: BTreeMap<ObjectKey, Deployment>,
    services: BTreeMap<ObjectKey, Service>,
    pods: BTreeMap<String, Vec<Pod>>,
    next_resource_version: u64,
}

impl ClusterState {
    fn require_namespace(&self, namespace: &str) -> Result<(), K8sError> {
        if self.namespaces.contains(namespace) {
            Ok(())
        } else {
            Err(not_found("namespaces", namespace))
        }
    }

    fn stamp(&mut self, metadata: &mut ObjectMeta, namespace: &str) {
        self.next_resource_version += 1;
        metadata.namespace = Some(namespace.to_owned());
        metadata.resource_version = Some(self.next_resource_version.to_string());
    }

    fn all_services(&self) -> Vec<Service> {
        self.services.values().cloned().collect()
    }
}

#[derive(Default)]
struct Faults {
    deployment_reads: Option<(u16, String)>,
    service_creations: bool,
    service_reads: bool,
    service_reads_after_creation: bool,
    pod_listings: bool,
    concurrent_deployment_creations: usize,
    concurrent_node_port_claims: usize,
}

/// In-memory cluster implementing [`K8sClient`].
///
/// Enforces the API server rules the deployer relies on: unique object
/// names, unique node ports across all namespaces and objects only living in
/// existing namespaces. Faults and concurrent callers can be simulated.
pub struct MockK8sClient {
    state: Mutex<ClusterState>,
    faults: Mutex<Faults>,
    calls: AtomicUsize,
}

impl MockK8sClient {
    /// Creates a cluster containing only the `default` namespace.
    pub fn new() -> Self {
        let state = ClusterState {
            namespaces: BTreeSet::from(["default".to_owned()]),
            ..ClusterState::default()
        };

        Self {
            state: Mutex::new(state),
            faults: Mutex::new(Faults::default()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_namespace(self, namespace: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .namespaces
            .insert(namespace.to_owned());
        self
    }

    /// Number of [`K8sClient`] calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.state.lock().unwrap().namespaces.contains(namespace)
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .get(&key(namespace, name))
            .cloned()
    }

    /// Image of the first container of a deployment.
    pub fn deployment_image(&self, namespace: &str, name: &str) -> Option<String> {
        self.deployment(namespace, name)?
            .spec?
            .template
            .spec?
            .containers
            .first()?
            .image
            .clone()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.state
            .lock()
            .unwrap()
            .services
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn service_node_port(&self, namespace: &str, name: &str) -> Option<i32> {
        first_node_port(&self.service(namespace, name)?)
    }

    pub fn service_count(&self) -> usize {
        self.state.lock().unwrap().services.len()
    }

    /// Stores a service without any validation, e.g. one created by another
    /// tool.
    pub fn insert_service(&self, namespace: &str, service: Service) {
        let name = service.metadata.name.clone().unwrap_or_default();
        self.state
            .lock()
            .unwrap()
            .services
            .insert(key(namespace, &name), service);
    }

    pub fn remove_service(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .services
            .remove(&key(namespace, name));
    }

    pub fn set_pods(&self, namespace: &str, pods: Vec<Pod>) {
        self.state
            .lock()
            .unwrap()
            .pods
            .insert(namespace.to_owned(), pods);
    }

    /// Makes every deployment read fail with the given status code.
    pub fn fail_deployment_reads(&self, code: u16, message: &str) {
        self.faults.lock().unwrap().deployment_reads = Some((code, message.to_owned()));
    }

    pub fn fail_service_creations(&self) {
        self.faults.lock().unwrap().service_creations = true;
    }

    pub fn fail_service_reads(&self) {
        self.faults.lock().unwrap().service_reads = true;
    }

    /// Makes service reads fail once a service has been created.
    pub fn fail_service_reads_after_creation(&self) {
        self.faults.lock().unwrap().service_reads_after_creation = true;
    }

    pub fn fail_pod_listings(&self) {
        self.faults.lock().unwrap().pod_listings = true;
    }

    /// Makes the next deployment creation lose against a concurrent caller
    /// which creates the same deployment first.
    pub fn simulate_concurrent_deployment_creation(&self) {
        self.faults.lock().unwrap().concurrent_deployment_creations += 1;
    }

    /// Makes the next `times` service creations lose their node port against
    /// a concurrent caller which claims it first.
    pub fn simulate_concurrent_node_port_claims(&self, times: usize) {
        self.faults.lock().unwrap().concurrent_node_port_claims = times;
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn insert_deployment(
        state: &mut ClusterState,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), K8sError> {
        state.require_namespace(namespace)?;

        let name = deployment.metadata.name.clone().unwrap_or_default();
        if state.deployments.contains_key(&key(namespace, &name)) {
            return Err(already_exists("deployments.apps", &name));
        }

        let mut deployment = deployment.clone();
        state.stamp(&mut deployment.metadata, namespace);
        state.deployments.insert(key(namespace, &name), deployment);

        Ok(())
    }
}

#[async_trait]
impl K8sClient for MockK8sClient {
    async fn list_namespaces(&self) -> Result<Vec<String>, K8sError> {
        self.record_call();

        Ok(self.state.lock().unwrap().namespaces.iter().cloned().collect())
    }

    async fn create_namespace(&self, name: &str) -> Result<(), K8sError> {
        self.record_call();

        let mut state = self.state.lock().unwrap();
        if !state.namespaces.insert(name.to_owned()) {
            return Err(already_exists("namespaces", name));
        }

        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
        self.record_call();

        let mut state = self.state.lock().unwrap();
        if !state.namespaces.remove(name) {
            return Err(not_found("namespaces", name));
        }
        state.deployments.retain(|(namespace, _), _| namespace != name);
        state.services.retain(|(namespace, _), _| namespace != name);
        state.pods.remove(name);

        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, K8sError> {
        self.record_call();

        if let Some((code, message)) = &self.faults.lock().unwrap().deployment_reads {
            return Err(K8sError::api(*code, "Failure", message.as_str()));
        }

        Ok(self.deployment(namespace, name))
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), K8sError> {
        self.record_call();

        let mut state = self.state.lock().unwrap();

        let mut faults = self.faults.lock().unwrap();
        if faults.concurrent_deployment_creations > 0 {
            faults.concurrent_deployment_creations -= 1;
            Self::insert_deployment(&mut state, namespace, deployment)?;
        }

        Self::insert_deployment(&mut state, namespace, deployment)
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<(), K8sError> {
        self.record_call();

        let mut state = self.state.lock().unwrap();
        let Some(current) = state.deployments.get(&key(namespace, name)) else {
            return Err(not_found("deployments.apps", name));
        };

        if deployment.metadata.resource_version != current.metadata.resource_version {
            return Err(K8sError::api(
                409,
                "Conflict",
                format!(
                    "Operation cannot be fulfilled on deployments.apps \"{name}\": the object has been modified"
                ),
            ));
        }

        let mut deployment = deployment.clone();
        state.stamp(&mut deployment.metadata, namespace);
        state.deployments.insert(key(namespace, name), deployment);

        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, K8sError> {
        self.record_call();

        if self.faults.lock().unwrap().service_reads {
            return Err(internal_error("etcdserver: request timed out"));
        }

        Ok(self.service(namespace, name))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), K8sError> {
        self.record_call();

        let mut state = self.state.lock().unwrap();
        state.require_namespace(namespace)?;

        let name = service.metadata.name.clone().unwrap_or_default();
        if state.services.contains_key(&key(namespace, &name)) {
            return Err(already_exists("services", &name));
        }

        let mut faults = self.faults.lock().unwrap();
        if faults.service_creations {
            return Err(internal_error("failed to allocate a serviceIP"));
        }

        let node_port = first_node_port(service);
        if let Some(node_port) = node_port
            && faults.concurrent_node_port_claims > 0
        {
            faults.concurrent_node_port_claims -= 1;
            let intruder = format!("intruder-{node_port}");
            state.services.insert(
                key(OTHER_CALLERS_NAMESPACE, &intruder),
                node_port_service(&intruder, node_port),
            );
        }

        if let Some(node_port) = node_port
            && node_ports_in_use(&state.all_services()).contains(&node_port)
        {
            return Err(node_port_allocated(&name, node_port));
        }

        let mut service = service.clone();
        state.stamp(&mut service.metadata, namespace);
        state.services.insert(key(namespace, &name), service);

        if faults.service_reads_after_creation {
            faults.service_reads = true;
        }

        Ok(())
    }

    async fn list_all_services(&self) -> Result<Vec<Service>, K8sError> {
        self.record_call();

        Ok(self.state.lock().unwrap().all_services())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, K8sError> {
        self.record_call();

        if self.faults.lock().unwrap().pod_listings {
            return Err(K8sError::api(
                403,
                "Forbidden",
                format!("pods is forbidden: cannot list resource \"pods\" in namespace \"{namespace}\""),
            ));
        }

        let state = self.state.lock().unwrap();
        state.require_namespace(namespace)?;

        Ok(state.pods.get(namespace).cloned().unwrap_or_default())
    }
}
