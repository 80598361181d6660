use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body as AxumBody,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::services::auth_service;
use crate::web::models::AuthenticatedUser;
use crate::web::{error::AppError, AppState};

pub const TOKEN_COOKIE: &str = "token";

/// Accepts `Authorization: Token <jwt>`, `Authorization: Bearer <jwt>` or the `token` cookie.
fn extract_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            header
                .strip_prefix("Token ")
                .or_else(|| header.strip_prefix("Bearer "))
        })
        .map(|s| s.trim().to_string())
        .or_else(|| jar.get(TOKEN_COOKIE).map(|c| c.value().to_string()))
        .filter(|token| !token.is_empty())
}

async fn resolve_user(
    state: &AppState,
    token: Option<String>,
) -> Result<Option<AuthenticatedUser>, AppError> {
    match token {
        Some(token) => {
            let user =
                auth_service::authenticate_token(&state.db_pool, &token, &state.config.jwt_secret)
                    .await?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

/// Attaches the requester when a token is present. A token that does not
/// verify is rejected outright rather than treated as anonymous.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers(), &jar);
    let user = resolve_user(&state, token).await?;
    if let Some(user) = &user {
        req.extensions_mut().insert(user.clone());
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Rejects anonymous requests with 401.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let attached = req.extensions().get::<AuthenticatedUser>().cloned();
    let user = match attached {
        Some(user) => Some(user),
        None => {
            let token = extract_token(req.headers(), &jar);
            resolve_user(&state, token).await?
        }
    };
    let user = user.ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".to_string())
    })?;

    req.extensions_mut().insert(Some(user.clone()));
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// The caller of the current request, anonymous when no token was sent.
#[derive(Debug, Clone, Default)]
pub struct Requester(pub Option<AuthenticatedUser>);

impl Requester {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<i32> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Requester(
            parts
                .extensions
                .get::<Option<AuthenticatedUser>>()
                .cloned()
                .flatten(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn token_and_bearer_schemes_are_accepted() {
        let jar = CookieJar::new();
        assert_eq!(
            extract_token(&headers("Token abc"), &jar).as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_token(&headers("Bearer xyz"), &jar).as_deref(),
            Some("xyz")
        );
        assert_eq!(extract_token(&headers("Basic Zm9v"), &jar), None);
    }

    #[test]
    fn cookie_is_the_fallback() {
        let jar = CookieJar::new().add(Cookie::new(TOKEN_COOKIE, "from-cookie"));
        assert_eq!(
            extract_token(&HeaderMap::new(), &jar).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(
            extract_token(&headers("Token from-header"), &jar).as_deref(),
            Some("from-header")
        );
    }
}
