use actix_web::{
    HttpResponse, Responder, ResponseError, get,
    http::StatusCode,
    web::{Data, Json, Query},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use tracing_actix_web::RootSpan;
use utoipa::{IntoParams, ToSchema};

use crate::k8s::K8sClient;
use crate::routes::{ErrorMessage, error_response};
use crate::workloads::status::{PodStatusSnapshot, StatusError, project_pod_statuses};

impl ResponseError for StatusError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        error_response(self.status_code(), self.to_string())
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusQuery {
    /// Namespace whose pods are listed.
    pub namespace: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadStatusResponse {
    pub pods: Vec<PodStatusSnapshot>,
}

#[utoipa::path(
    summary = "Check the pods of a namespace",
    description = "Returns every pod of the namespace with its phase and the state of each of its containers.",
    params(StatusQuery),
    responses(
        (status = 200, description = "Pod statuses", body = ReadStatusResponse),
        (status = 400, description = "Missing namespace or failed listing", body = ErrorMessage),
    ),
    tag = "Status"
)]
#[get("/status")]
pub async fn read_status(
    k8s_client: Data<dyn K8sClient>,
    query: Query<StatusQuery>,
    root_span: RootSpan,
) -> Result<impl Responder, StatusError> {
    let namespace = query.into_inner().namespace.unwrap_or_default();

    root_span.record("namespace", namespace.as_str());

    let pods = project_pod_statuses(k8s_client.get_ref(), &namespace)
        .await
        .inspect_err(|e| {
            error!(namespace = namespace.as_str(), error = %e, "error reading pod statuses");
        })?;

    Ok(Json(ReadStatusResponse { pods }))
}
