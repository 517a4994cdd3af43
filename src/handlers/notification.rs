use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::{
    dto::{CountResponse, NotificationQuery},
    errors::ApiError,
    service::{self, auth::require_user},
    PGPool,
};

#[get("")]
pub async fn list(
    req: HttpRequest,
    query: web::Query<NotificationQuery>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let notifications = service::notification::list(user.user_id, query.unread, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[patch("/{id}/read")]
pub async fn mark_read(req: HttpRequest, id: web::Path<Uuid>, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    service::notification::mark_read(id.into_inner(), user.user_id, pool_state.get_ref()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/read-all")]
pub async fn mark_all_read(req: HttpRequest, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let affected = service::notification::mark_all_read(user.user_id, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(CountResponse { affected }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list).service(mark_read).service(mark_all_read);
}
