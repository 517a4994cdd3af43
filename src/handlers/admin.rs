use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::{
    dto::{CountResponse, SetUserActiveDto},
    errors::ApiError,
    service::{self, auth::require_admin},
    PGPool,
};

#[get("/stats")]
pub async fn stats(req: HttpRequest, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let stats = service::stats::platform(pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/users")]
pub async fn users(req: HttpRequest, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let users = service::user::get_all(pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[patch("/users/{id}/active")]
pub async fn set_user_active(
    req: HttpRequest,
    id: web::Path<Uuid>,
    dto: web::Json<SetUserActiveDto>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    let user = service::user::set_active(id.into_inner(), dto.active, &admin, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[post("/subscriptions/reset-usage")]
pub async fn reset_usage(req: HttpRequest, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let affected = service::subscription::rollover_ended_periods(pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(CountResponse { affected }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(stats)
        .service(users)
        .service(set_user_active)
        .service(reset_usage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Role, service::auth::UserAuthData};
    use actix_web::{dev::Service, http::StatusCode, test, App, HttpMessage};
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PGPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/venue_booking_test")
            .unwrap()
    }

    #[actix_rt::test]
    async fn anonymous_callers_are_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .service(web::scope("/api/admin").configure(init_routes)),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/admin/stats").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn non_admins_are_forbidden() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .wrap_fn(|req, srv| {
                    req.extensions_mut().insert(UserAuthData {
                        user_id: Uuid::new_v4(),
                        session_id: Uuid::new_v4(),
                        role: Role::VenueOwner,
                    });
                    srv.call(req)
                })
                .service(web::scope("/api/admin").configure(init_routes)),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/admin/subscriptions/reset-usage")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
