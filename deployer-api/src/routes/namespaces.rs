use actix_web::{
    HttpResponse, Responder, ResponseError, delete, get,
    http::StatusCode,
    post,
    web::{Data, Json, Path},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use tracing_actix_web::RootSpan;
use utoipa::ToSchema;

use crate::k8s::{K8sClient, K8sError};
use crate::routes::{ErrorMessage, MessageResponse, error_response};

#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("Invalid namespace name!")]
    InvalidRequest,

    #[error("{0}")]
    Creation(#[source] K8sError),

    #[error("{0}")]
    Deletion(#[source] K8sError),

    #[error("{0}")]
    Listing(#[source] K8sError),
}

impl ResponseError for NamespaceError {
    fn status_code(&self) -> StatusCode {
        match self {
            NamespaceError::InvalidRequest | NamespaceError::Creation(_) => {
                StatusCode::BAD_REQUEST
            }
            NamespaceError::Deletion(_) => StatusCode::NOT_FOUND,
            NamespaceError::Listing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        error_response(self.status_code(), self.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateNamespaceRequest {
    #[schema(example = "staging", required = true)]
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadNamespacesResponse {
    #[schema(example = json!(["default", "staging"]))]
    pub namespaces: Vec<String>,
}

#[utoipa::path(
    summary = "Create a namespace",
    request_body = CreateNamespaceRequest,
    responses(
        (status = 200, description = "Namespace created", body = MessageResponse),
        (status = 400, description = "Bad request", body = ErrorMessage),
    ),
    tag = "Namespaces"
)]
#[post("/namespaces")]
pub async fn create_namespace(
    k8s_client: Data<dyn K8sClient>,
    namespace: Json<CreateNamespaceRequest>,
    root_span: RootSpan,
) -> Result<impl Responder, NamespaceError> {
    let name = namespace.into_inner().name;
    if name.is_empty() {
        return Err(NamespaceError::InvalidRequest);
    }

    root_span.record("namespace", name.as_str());

    k8s_client.create_namespace(&name).await.map_err(|e| {
        error!(namespace = name.as_str(), error = %e, "error creating namespace");
        NamespaceError::Creation(e)
    })?;

    Ok(Json(MessageResponse {
        message: format!("Namespace \"{name}\" created successfully!"),
    }))
}

#[utoipa::path(
    summary = "List namespaces",
    responses(
        (status = 200, description = "Names of all namespaces", body = ReadNamespacesResponse),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Namespaces"
)]
#[get("/namespaces")]
pub async fn read_all_namespaces(
    k8s_client: Data<dyn K8sClient>,
) -> Result<impl Responder, NamespaceError> {
    let namespaces = k8s_client.list_namespaces().await.map_err(|e| {
        error!(error = %e, "error fetching namespaces");
        NamespaceError::Listing(e)
    })?;

    Ok(Json(ReadNamespacesResponse { namespaces }))
}

#[utoipa::path(
    summary = "Delete a namespace",
    description = "Deletes the namespace together with every workload and service inside it.",
    params(
        ("namespace" = String, Path, description = "Name of the namespace"),
    ),
    responses(
        (status = 200, description = "Namespace deleted", body = MessageResponse),
        (status = 404, description = "Namespace not found", body = ErrorMessage),
    ),
    tag = "Namespaces"
)]
#[delete("/namespaces/{namespace}")]
pub async fn delete_namespace(
    k8s_client: Data<dyn K8sClient>,
    namespace: Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, NamespaceError> {
    let name = namespace.into_inner();

    root_span.record("namespace", name.as_str());

    k8s_client.delete_namespace(&name).await.map_err(|e| {
        error!(namespace = name.as_str(), error = %e, "error deleting namespace");
        NamespaceError::Deletion(e)
    })?;

    Ok(Json(MessageResponse {
        message: format!("Namespace \"{name}\" destroyed successfully!"),
    }))
}
