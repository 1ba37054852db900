use actix_web::{
    HttpResponse, Responder, ResponseError,
    http::StatusCode,
    post,
    web::{Data, Json},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use tracing_actix_web::RootSpan;
use utoipa::ToSchema;

use crate::k8s::K8sClient;
use crate::routes::{ErrorMessage, error_response};
use crate::workloads::name::image_tag;
use crate::workloads::reconciler::{DeployAction, DeployError, DeployOutcome, WorkloadReconciler};

impl ResponseError for DeployError {
    fn status_code(&self) -> StatusCode {
        match self {
            DeployError::InvalidRequest
            | DeployError::DeploymentUpdate { .. }
            | DeployError::DeploymentCreation { .. }
            | DeployError::MissingContainer { .. }
            | DeployError::DeploymentVanished { .. }
            | DeployError::EndpointCreation { .. } => StatusCode::BAD_REQUEST,
            DeployError::NodePortContention { .. } => StatusCode::CONFLICT,
            DeployError::PortAllocation(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        error_response(self.status_code(), self.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeployRequest {
    #[schema(example = "staging", required = true)]
    #[serde(default)]
    pub namespace: String,
    #[schema(example = "registry.example.com/team/my-app:v2", required = true)]
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeployResponse {
    /// Name of the deployment, derived from the image.
    #[schema(example = "my-app")]
    pub name: String,
    pub action: DeployAction,
    /// Tag of the deployed image.
    #[schema(example = "v2")]
    pub tag: String,
    /// Node port the workload is exposed at, if it could be determined.
    #[schema(example = 30000)]
    pub node_port: Option<i32>,
    #[schema(example = "App \"my-app\" created and exposed at NodePort 30000 in namespace \"staging\".")]
    pub message: String,
}

impl DeployResponse {
    fn new(outcome: DeployOutcome, namespace: &str, image: &str) -> Self {
        let name = outcome.name.into_inner();
        let action = outcome.action.as_str();
        let message = match outcome.node_port {
            Some(node_port) => format!(
                "App \"{name}\" {action} and exposed at NodePort {node_port} in namespace \"{namespace}\"."
            ),
            None => format!(
                "App \"{name}\" {action} in namespace \"{namespace}\" but its NodePort could not be determined."
            ),
        };

        DeployResponse {
            name,
            action: outcome.action,
            tag: image_tag(image).to_owned(),
            node_port: outcome.node_port,
            message,
        }
    }
}

#[utoipa::path(
    summary = "Deploy an image",
    description = "Creates the deployment of the image in the namespace and exposes it on a free node port, \
        or replaces the image of the existing deployment. The deployment is named after the image.",
    request_body = DeployRequest,
    responses(
        (status = 200, description = "Image deployed", body = DeployResponse),
        (status = 400, description = "Bad request or rejected by the cluster", body = ErrorMessage),
        (status = 409, description = "Node ports kept being claimed concurrently", body = ErrorMessage),
        (status = 503, description = "No node port available", body = ErrorMessage),
    ),
    tag = "Deployments"
)]
#[post("/deployments")]
pub async fn deploy(
    k8s_client: Data<dyn K8sClient>,
    deployment: Json<DeployRequest>,
    root_span: RootSpan,
) -> Result<impl Responder, DeployError> {
    let DeployRequest { namespace, image } = deployment.into_inner();

    root_span.record("namespace", namespace.as_str());

    let reconciler = WorkloadReconciler::new(k8s_client.get_ref());
    let outcome = reconciler
        .reconcile(&namespace, &image)
        .await
        .inspect_err(|e| {
            metrics::counter!("deployer_deploy_failures_total", "kind" => e.kind()).increment(1);
            error!(
                namespace = namespace.as_str(),
                image = image.as_str(),
                error = %e,
                "deploy failed"
            );
        })?;

    Ok(Json(DeployResponse::new(outcome, &namespace, &image)))
}
