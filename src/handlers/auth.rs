use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    get, post, web, HttpRequest, HttpResponse,
};

use crate::{
    config::Config,
    dto::{AuthResponse, LoginRequest, RegisterRequest},
    errors::ApiError,
    service::{self, auth::session},
    PGPool, AUTH_COOKIE, SESSION_TTL_DAYS,
};

fn auth_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, token)
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(SESSION_TTL_DAYS))
        .secure(secure)
        .finish()
}

#[post("/register")]
pub async fn register(dto: web::Json<RegisterRequest>, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let conn: &PGPool = pool_state.get_ref();
    let user = service::auth::register(dto.into_inner(), conn).await?;
    Ok(HttpResponse::Created().json(user))
}

#[post("/login")]
pub async fn login(
    dto: web::Json<LoginRequest>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let conn: &PGPool = pool_state.get_ref();
    let (token, user) = service::auth::login(dto.into_inner(), &config.jwt_secret, conn).await?;
    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(token.clone(), config.is_production()))
        .json(AuthResponse { token, user }))
}

#[post("/logout")]
pub async fn logout(req: HttpRequest, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let user = service::auth::require_user(&req)?;
    session::close(user.session_id, pool_state.get_ref()).await?;
    let mut cookie = Cookie::build(AUTH_COOKIE, "").path("/").finish();
    cookie.make_removal();
    Ok(HttpResponse::NoContent().cookie(cookie).finish())
}

#[get("/me")]
pub async fn me(req: HttpRequest, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let user = service::auth::require_user(&req)?;
    let me = service::auth::me(&user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(me))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register)
        .service(login)
        .service(logout)
        .service(me);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PGPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/venue_booking_test")
            .unwrap()
    }

    #[test]
    fn cookie_attributes() {
        let cookie = auth_cookie("abc".to_string(), true);
        assert_eq!(cookie.name(), AUTH_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }

    #[actix_rt::test]
    async fn me_requires_a_session() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .service(web::scope("/api/auth").configure(init_routes)),
        )
        .await;
        let res = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/api/auth/me").to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn register_rejects_short_password_before_touching_the_database() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .service(web::scope("/api/auth").configure(init_routes)),
        )
        .await;
        let req = actix_test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(serde_json::json!({
                "email": "ana@example.com",
                "name": "Ana",
                "pwd": "short",
                "pwd_confirm": "short"
            }))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
