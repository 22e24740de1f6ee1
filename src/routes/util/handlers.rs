use actix_web::{HttpResponse, Responder};

#[utoipa::path(
    get,
    path = "/api/util/health_check",
    tag = "Health Check",
    responses(
        (status=200, description= "Server is running"),
    )
)]
#[tracing::instrument(name = "health check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("Running Server")
}
