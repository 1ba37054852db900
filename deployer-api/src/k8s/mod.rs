//! Kubernetes integration for the deployer API.
//!
//! Route handlers and the workload reconciler depend on the [`K8sClient`]
//! trait only. The default implementation, [`http::HttpK8sClient`], is backed
//! by the [`kube`] crate and uses the ambient configuration (in-cluster
//! service account or local `~/.kube/config`). Tests plug in an in-memory
//! implementation instead.
//!
//! See [`base`] for the error type and the client trait.

mod base;
pub mod http;

pub use base::*;
