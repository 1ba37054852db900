use actix_web::{HttpResponse, Responder, get};

/// Liveness probe. It does not reach out to the cluster, so a failing API
/// server does not get the deployer restarted.
#[utoipa::path(
    summary = "API health status",
    description = "Returns 'ok' when the API is up. The cluster is not contacted.",
    responses(
        (status = 200, description = "Health check passed; returns 'ok'.", body = String),
    ),
    tag = "Health",
)]
#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("ok")
}
