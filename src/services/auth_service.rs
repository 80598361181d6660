use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::entities::{auth_token, user};
use crate::db::services::user_service;
use crate::server::config::ServerConfig;
use crate::web::error::AppError;
use crate::web::models::user_models::{validate_password, RegisterRequest, SetPasswordRequest};
use crate::web::models::{AuthenticatedUser, Claims, LoginRequest, LoginResponse};

pub async fn register_user(
    db: &DatabaseConnection,
    req: RegisterRequest,
    hash_cost: u32,
) -> Result<user::Model, AppError> {
    let new_user = req.validate()?;
    let password_hash = hash(&new_user.password, hash_cost)
        .map_err(|e| AppError::PasswordHashingError(format!("Password hashing failed: {e}")))?;
    user_service::create_user(db, new_user, password_hash).await
}

pub async fn login_user(
    db: &DatabaseConnection,
    req: LoginRequest,
    config: &ServerConfig,
) -> Result<LoginResponse, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let user = user_service::get_user_by_email(db, req.email.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let valid_password = verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;
    if !valid_password {
        return Err(AppError::InvalidCredentials);
    }

    let auth_token = issue_token(db, &user, config).await?;
    info!(user_id = user.id, "User logged in.");
    Ok(LoginResponse { auth_token })
}

/// Drops token rows that can no longer authenticate anyone.
pub async fn purge_expired_tokens(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let result = auth_token::Entity::delete_many()
        .filter(auth_token::Column::ExpiresAt.lte(Utc::now()))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!(removed = result.rows_affected, "Purged expired auth tokens.");
    }
    Ok(result.rows_affected)
}

/// Signs a JWT for `user` and records its id so it can be revoked later.
pub async fn issue_token(
    db: &DatabaseConnection,
    user: &user::Model,
    config: &ServerConfig,
) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.token_ttl_hours);
    let jti = Uuid::new_v4().to_string();

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        jti: jti.clone(),
        exp: expires_at.timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::TokenCreationError(format!("Failed to sign token: {e}")))?;

    purge_expired_tokens(db).await?;
    auth_token::ActiveModel {
        jti: Set(jti),
        user_id: Set(user.id),
        created_at: Set(now),
        expires_at: Set(expires_at),
    }
    .insert(db)
    .await?;

    Ok(token)
}

/// Checks the signature, that the token was not revoked, and that its user still exists.
pub async fn authenticate_token(
    db: &DatabaseConnection,
    token: &str,
    jwt_secret: &str,
) -> Result<AuthenticatedUser, AppError> {
    let invalid = || AppError::Unauthorized("Invalid token.".to_string());

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = ?e, "JWT decoding error during authentication.");
        invalid()
    })?;
    let claims = token_data.claims;

    let stored = auth_token::Entity::find_by_id(claims.jti.clone())
        .one(db)
        .await?
        .ok_or_else(invalid)?;
    if stored.user_id != claims.user_id || stored.expires_at <= Utc::now() {
        return Err(invalid());
    }

    let user = user_service::get_user_by_id(db, claims.user_id)
        .await?
        .ok_or_else(invalid)?;

    Ok(AuthenticatedUser {
        id: user.id,
        email: user.email,
        is_staff: user.is_staff,
        jti: claims.jti,
    })
}

pub async fn revoke_token(db: &DatabaseConnection, auth_user: &AuthenticatedUser) -> Result<(), AppError> {
    auth_token::Entity::delete_by_id(auth_user.jti.clone())
        .exec(db)
        .await?;
    info!(user_id = auth_user.id, "User logged out.");
    Ok(())
}

pub async fn change_password(
    db: &DatabaseConnection,
    user_id: i32,
    req: SetPasswordRequest,
    hash_cost: u32,
) -> Result<(), AppError> {
    let user = user_service::get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    let valid_password = verify(&req.current_password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;
    if !valid_password {
        return Err(AppError::validation("current_password", "Wrong password."));
    }
    validate_password(&req.new_password, "new_password")?;

    let new_hash = hash(&req.new_password, hash_cost)
        .map_err(|e| AppError::PasswordHashingError(format!("Password hashing failed: {e}")))?;
    user_service::update_password_hash(db, user, new_hash).await?;
    info!(user_id, "Password changed.");
    Ok(())
}
