use k8s_openapi::api::core::v1::Service;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Node ports handed out to workload services, the Kubernetes default
/// service node port range.
pub const NODE_PORT_RANGE: RangeInclusive<i32> = 30000..=32767;

/// Service types for which the API server allocates node ports.
const NODE_PORT_SERVICE_TYPES: [&str; 2] = ["NodePort", "LoadBalancer"];

#[derive(Debug, Error)]
pub enum PortAllocationError {
    #[error("No available NodePort in the range {}-{}", NODE_PORT_RANGE.start(), NODE_PORT_RANGE.end())]
    Exhausted,
}

/// Returns the lowest port of [`NODE_PORT_RANGE`] that is not in `in_use`.
///
/// Nothing is reserved: the result is only safe to use if no other service
/// claims the port before ours is created, which the API server enforces.
pub fn allocate_node_port(in_use: &HashSet<i32>) -> Result<i32, PortAllocationError> {
    NODE_PORT_RANGE
        .into_iter()
        .find(|port| !in_use.contains(port))
        .ok_or(PortAllocationError::Exhausted)
}

/// Collects every node port claimed by the given services.
pub fn node_ports_in_use(services: &[Service]) -> HashSet<i32> {
    services
        .iter()
        .filter_map(|service| service.spec.as_ref())
        .filter(|spec| {
            spec.type_
                .as_deref()
                .is_some_and(|type_| NODE_PORT_SERVICE_TYPES.contains(&type_))
        })
        .flat_map(|spec| spec.ports.iter().flatten())
        .filter_map(|port| port.node_port)
        .collect()
}
