use axum::{
    extract::{Extension, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar, WithRejection,
};
use std::sync::Arc;

use crate::services::auth_service;
use crate::web::middleware::auth::{self, TOKEN_COOKIE};
use crate::web::models::{AuthenticatedUser, LoginRequest};
use crate::web::{AppError, AppState};

pub fn create_auth_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/token/login/", post(login_handler))
        .route(
            "/api/auth/token/logout/",
            post(logout_handler)
                .route_layer(axum_middleware::from_fn_with_state(app_state, auth::auth)),
        )
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let login_response =
        auth_service::login_user(&app_state.db_pool, payload, &app_state.config).await?;

    let auth_cookie = Cookie::build((TOKEN_COOKIE, login_response.auth_token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(auth_cookie), Json(login_response)))
}

async fn logout_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    auth_service::revoke_token(&app_state.db_pool, &auth_user).await?;
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}
