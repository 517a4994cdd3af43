use log::info;
use uuid::Uuid;

use crate::{db, errors::ApiError, models::User, service::auth::UserAuthData, PGPool};

pub async fn get_all(pool: &PGPool) -> Result<Vec<User>, ApiError> {
    Ok(db::user::get_all(pool).await?)
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<User, ApiError> {
    db::user::get_by_id(id, pool)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

/// Deactivation also drops every session of the user, so existing tokens
/// stop working immediately.
pub async fn set_active(id: Uuid, active: bool, admin: &UserAuthData, pool: &PGPool) -> Result<User, ApiError> {
    if id == admin.user_id && !active {
        return Err(ApiError::bad_request("admins cannot deactivate themselves"));
    }
    if db::user::set_active(id, active, pool).await? == 0 {
        return Err(ApiError::NotFound("user"));
    }
    if !active {
        let dropped = db::session::delete_for_user(id, pool).await?;
        info!("user {} deactivated by {}, {} sessions dropped", id, admin.user_id, dropped);
    } else {
        info!("user {} reactivated by {}", id, admin.user_id);
    }
    get_by_id(id, pool).await
}
