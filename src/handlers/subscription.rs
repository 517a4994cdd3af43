use actix_web::{post, web, HttpRequest, HttpResponse};

use crate::{
    config::Config,
    dto::{CheckoutRequest, PortalRequest, RedirectResponse},
    errors::ApiError,
    service::{self, auth::require_user, payments::PaymentClient},
    PGPool,
};

#[post("/checkout")]
pub async fn checkout(
    req: HttpRequest,
    dto: web::Json<CheckoutRequest>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
    client: web::Data<PaymentClient>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let url = service::payments::start_checkout(dto.into_inner(), &user, &client, &config, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(RedirectResponse { url }))
}

#[post("/portal")]
pub async fn portal(
    req: HttpRequest,
    dto: web::Json<PortalRequest>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
    client: web::Data<PaymentClient>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let url = service::payments::billing_portal(dto.into_inner(), &user, &client, &config, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(RedirectResponse { url }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(checkout).service(portal);
}
