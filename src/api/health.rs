use crate::db;
use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;

/// Liveness plus a round trip to the database
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database reachable", body = Object, example = json!({
            "status": "ok"
        })),
        (status = 503, description = "Database unreachable")
    ),
    tag = "Health"
)]
#[get("/health")]
pub async fn health(pool: web::Data<MySqlPool>) -> impl Responder {
    match db::ping(pool.get_ref()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok" })),
        Err(e) => {
            error!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({ "status": "unavailable" }))
        }
    }
}
