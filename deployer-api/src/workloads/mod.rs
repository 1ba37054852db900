//! Workload management: naming, node port allocation, the create-or-update
//! reconciler and the pod status projection.

pub mod name;
pub mod ports;
pub mod reconciler;
pub mod status;
