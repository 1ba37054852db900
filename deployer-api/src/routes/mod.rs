use actix_web::{
    HttpResponse,
    http::{StatusCode, header::ContentType},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod deployments;
pub mod health_check;
pub mod metrics;
pub mod namespaces;
pub mod status;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorMessage {
    #[schema(example = "an error occurred in the api")]
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Namespace \"staging\" created successfully!")]
    pub message: String,
}

/// Builds a JSON error response with an [`ErrorMessage`] body.
fn error_response(status_code: StatusCode, error: String) -> HttpResponse {
    let error_message = ErrorMessage { error };
    let body = serde_json::to_string(&error_message).expect("failed to serialize error message");
    HttpResponse::build(status_code)
        .insert_header(ContentType::json())
        .body(body)
}
