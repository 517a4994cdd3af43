use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    HttpMessage, HttpRequest,
};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use log::{debug, info};
use uuid::Uuid;

use crate::{
    db,
    dto::{LoginRequest, RegisterRequest},
    errors::ApiError,
    models::{Role, Session, User},
    service::{crypto, mailer},
    PGPool, SESSION_TTL_DAYS,
};

/// The signed-in caller, placed in request extensions by [`AuthMiddleware`].
#[derive(Debug, Clone)]
pub struct UserAuthData {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
}

pub fn current_user(req: &HttpRequest) -> Option<UserAuthData> {
    req.extensions().get::<UserAuthData>().cloned()
}

pub fn require_user(req: &HttpRequest) -> Result<UserAuthData, ApiError> {
    current_user(req).ok_or(ApiError::Unauthorized)
}

pub fn require_admin(req: &HttpRequest) -> Result<UserAuthData, ApiError> {
    let user = require_user(req)?;
    if user.role == Role::Admin {
        Ok(user)
    } else {
        Err(ApiError::forbidden("admin access required"))
    }
}

/// Resolves the session token (cookie or bearer header) on every request.
/// Requests without a valid session pass through anonymously; handlers decide
/// whether they need a user.
pub struct AuthMiddleware {
    pub db_pool: PGPool,
    pub jwt_secret: String,
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            db_pool: self.db_pool.clone(),
            jwt_secret: self.jwt_secret.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    db_pool: PGPool,
    jwt_secret: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let pool = self.db_pool.clone();
        let secret = self.jwt_secret.clone();
        Box::pin(async move {
            if let Some(token) = jwt::parse_request(req.request()) {
                if let Some(user) = session::authenticate(&token, &secret, &pool).await? {
                    req.extensions_mut().insert(user);
                }
            }
            service.call(req).await
        })
    }
}

pub mod jwt {
    use actix_web::HttpRequest;
    use jsonwebtoken::{decode, encode, errors::Error, Algorithm, DecodingKey, EncodingKey, Header, Validation};

    use crate::{dto::Claims, AUTH_COOKIE};

    pub fn create(claims: &Claims, secret: &str) -> Result<String, Error> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Verifies the signature only. Expiry is judged by the caller against
    /// both the claim and the stored session, so that an expired session can
    /// still be found and removed.
    pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation).map(|data| data.claims)
    }

    /// The `auth-token` cookie wins over an `Authorization: Bearer` header.
    pub fn parse_request(req: &HttpRequest) -> Option<String> {
        if let Some(cookie) = req.cookie(AUTH_COOKIE) {
            if !cookie.value().is_empty() {
                return Some(cookie.value().to_string());
            }
        }
        req.headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

pub mod session {
    use super::*;
    use crate::dto::Claims;

    /// Creates the session row and the signed token that refers to it. Only
    /// a digest of the token is stored.
    pub async fn open(user: &User, secret: &str, pool: &PGPool) -> Result<String, ApiError> {
        let now = Utc::now();
        let expires_at = now + Duration::days(SESSION_TTL_DAYS);
        let session_id = Uuid::new_v4();
        let claims = Claims {
            sub: user.id,
            sid: session_id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
        };
        let token = jwt::create(&claims, secret)?;
        let session = Session {
            id: session_id,
            user_id: user.id,
            token_hash: crypto::get_sha3_256_hash(&token),
            expires_at,
            created_at: now,
        };
        db::session::create(&session, pool).await?;
        Ok(token)
    }

    /// Signature, stored session and expiry must all check out. An expired
    /// session is deleted here; there is no background sweep.
    pub async fn authenticate(token: &str, secret: &str, pool: &PGPool) -> Result<Option<UserAuthData>, ApiError> {
        let claims = match jwt::decode_claims(token, secret) {
            Ok(claims) => claims,
            Err(err) => {
                debug!("rejected session token: {:?}", err);
                return Ok(None);
            }
        };
        let Some(session) = db::session::get_by_id(claims.sid, pool).await? else {
            return Ok(None);
        };
        if session.user_id != claims.sub || session.token_hash != crypto::get_sha3_256_hash(token) {
            return Ok(None);
        }
        let now = Utc::now();
        if session.expires_at <= now || (claims.exp as i64) <= now.timestamp() {
            db::session::delete(session.id, pool).await?;
            debug!("expired session {} removed", session.id);
            return Ok(None);
        }
        let user = db::user::get_by_id(session.user_id, pool).await?;
        Ok(user.filter(|u| u.active).map(|u| UserAuthData {
            user_id: u.id,
            session_id: session.id,
            role: u.role,
        }))
    }

    pub async fn close(session_id: Uuid, pool: &PGPool) -> Result<(), ApiError> {
        db::session::delete(session_id, pool).await?;
        Ok(())
    }
}

pub async fn register(dto: RegisterRequest, pool: &PGPool) -> Result<User, ApiError> {
    dto.validate()?;
    let email = dto.email.trim().to_lowercase();
    if db::user::exists(&email, pool).await? {
        return Err(ApiError::conflict("email is already registered"));
    }
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        pwd_hash: crypto::hash_password(&dto.pwd)?,
        name: dto.name.trim().to_string(),
        role: dto.role.unwrap_or(Role::Customer),
        active: true,
        created_at: now,
        updated_at: now,
    };
    db::user::create(&user, pool).await?;
    info!("registered user {} as {:?}", user.id, user.role);
    mailer::send(&mailer::welcome(&user));
    Ok(user)
}

/// Returns the session token together with the user.
pub async fn login(dto: LoginRequest, secret: &str, pool: &PGPool) -> Result<(String, User), ApiError> {
    let user = db::user::get_by_email(dto.email.trim(), pool)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !crypto::verify_password(&dto.pwd, &user.pwd_hash) {
        return Err(ApiError::InvalidCredentials);
    }
    if !user.active {
        return Err(ApiError::forbidden("account is deactivated"));
    }
    let token = session::open(&user, secret, pool).await?;
    info!("user {} logged in", user.id);
    Ok((token, user))
}

pub async fn me(user: &UserAuthData, pool: &PGPool) -> Result<User, ApiError> {
    db::user::get_by_id(user.user_id, pool)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dto::Claims, AUTH_COOKIE};
    use actix_web::{cookie::Cookie, test::TestRequest};

    const SECRET: &str = "test-secret";

    fn claims(exp: usize) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            sid: Uuid::new_v4(),
            role: Role::Customer,
            exp,
        }
    }

    #[test]
    fn token_round_trip() {
        let c = claims((Utc::now().timestamp() + 3600) as usize);
        let token = jwt::create(&c, SECRET).unwrap();
        let decoded = jwt::decode_claims(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, c.sub);
        assert_eq!(decoded.sid, c.sid);
        assert_eq!(decoded.role, Role::Customer);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = jwt::create(&claims((Utc::now().timestamp() + 3600) as usize), SECRET).unwrap();
        assert!(jwt::decode_claims(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_still_decodes_for_cleanup() {
        let token = jwt::create(&claims(1_000), SECRET).unwrap();
        assert_eq!(jwt::decode_claims(&token, SECRET).unwrap().exp, 1_000);
    }

    #[test]
    fn token_from_cookie_or_bearer() {
        let req = TestRequest::default()
            .cookie(Cookie::new(AUTH_COOKIE, "from-cookie"))
            .insert_header(("Authorization", "Bearer from-header"))
            .to_http_request();
        assert_eq!(jwt::parse_request(&req).as_deref(), Some("from-cookie"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer from-header"))
            .to_http_request();
        assert_eq!(jwt::parse_request(&req).as_deref(), Some("from-header"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert_eq!(jwt::parse_request(&req), None);
    }

    #[test]
    fn require_helpers() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(require_user(&req), Err(ApiError::Unauthorized)));

        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(UserAuthData {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role: Role::VenueOwner,
        });
        assert!(require_user(&req).is_ok());
        assert!(matches!(require_admin(&req), Err(ApiError::Forbidden(_))));
    }
}
