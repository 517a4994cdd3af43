use actix_web::{post, web, HttpRequest, HttpResponse};

use crate::{config::Config, errors::ApiError, service, PGPool};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Takes the raw body; the signature covers the exact bytes sent.
#[post("/payments")]
pub async fn payments(
    req: HttpRequest,
    body: web::Bytes,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let signature = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    service::payments::handle_webhook(&body, signature, &config, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(payments);
}
