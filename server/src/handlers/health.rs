use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use crate::{db::Storage, error::Result};

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub storage: String,
}

#[get("/health")]
pub async fn health_check(storage: web::Data<dyn Storage>) -> Result<HttpResponse> {
    let response = match storage.ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthCheckResponse {
            status: "healthy".to_string(),
            storage: "up".to_string(),
        }),
        Err(err) => {
            log::warn!("Health check failed: {}", err);
            HttpResponse::ServiceUnavailable().json(HealthCheckResponse {
                status: "degraded".to_string(),
                storage: "down".to_string(),
            })
        }
    };

    Ok(response)
}
