use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::{
    config::Config,
    dto::{NewBookingDto, UpdateBookingStatusDto},
    errors::ApiError,
    service::{
        self,
        auth::{current_user, require_user},
    },
    PGPool,
};

/// Open to anonymous guests; a signed-in customer is linked to the booking.
#[post("")]
pub async fn create(
    req: HttpRequest,
    dto: web::Json<NewBookingDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&req);
    let booking = service::booking::create(
        user.as_ref(),
        dto.into_inner(),
        config.free_monthly_booking_limit,
        pool_state.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Created().json(booking))
}

#[get("")]
pub async fn list_mine(req: HttpRequest, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let bookings = service::booking::list_mine(&user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

#[get("/{id}")]
pub async fn get_by_id(req: HttpRequest, id: web::Path<Uuid>, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let booking = service::booking::get(id.into_inner(), &user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(booking))
}

#[patch("/{id}/status")]
pub async fn update_status(
    req: HttpRequest,
    id: web::Path<Uuid>,
    dto: web::Json<UpdateBookingStatusDto>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let booking = service::booking::update_status(id.into_inner(), dto.status, &user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(booking))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create)
        .service(list_mine)
        .service(get_by_id)
        .service(update_status);
}
