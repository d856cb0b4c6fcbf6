use actix_web::HttpResponse;

/// Liveness probe. It touches neither the stores nor the email provider.
#[tracing::instrument(name = "Health check")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
