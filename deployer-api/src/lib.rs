//! Deployer API service.
//!
//! Provides a REST API to create, list and delete namespaces of a Kubernetes
//! cluster, to deploy container images into them behind a `NodePort` service
//! and to check the status of their pods.

pub mod config;
pub mod k8s;
pub mod routes;
pub mod span_builder;
pub mod startup;
pub mod workloads;
