use axum::{
    extract::{Extension, OriginalUri, Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{Query, WithRejection};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::entities::user;
use crate::db::services::{follow_service, user_service};
use crate::services::auth_service;
use crate::web::middleware::auth::{self, Requester};
use crate::web::models::recipe_models::RecipeShort;
use crate::web::models::user_models::{
    RegisterRequest, SetPasswordRequest, SubscriptionRead, UserCreated, UserRead,
};
use crate::web::models::AuthenticatedUser;
use crate::web::pagination::{Page, PageParams};
use crate::web::{AppError, AppState};

pub fn create_user_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/api/users/me/", get(me_handler))
        .route("/api/users/set_password/", post(set_password_handler))
        .route("/api/users/subscriptions/", get(subscriptions_handler))
        .route(
            "/api/users/{user_id}/subscribe/",
            post(subscribe_handler).delete(unsubscribe_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(app_state, auth::auth));

    Router::new()
        .route("/api/users/", get(list_users_handler).post(register_handler))
        .route("/api/users/{user_id}/", get(get_user_handler))
        .merge(protected)
}

/// `recipes_limit` for the subscription views. Anything that is not a
/// non-negative integer is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RecipesLimitParams {
    #[serde(default)]
    pub recipes_limit: Option<String>,
}

impl RecipesLimitParams {
    fn limit(&self) -> Option<u64> {
        self.recipes_limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
    }
}

async fn read_users(
    app_state: &AppState,
    requester: &Requester,
    users: &[user::Model],
) -> Result<Vec<UserRead>, AppError> {
    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let subscribed =
        user_service::subscribed_author_ids(&app_state.db_pool, requester.id(), &ids).await?;
    Ok(users
        .iter()
        .map(|u| UserRead::from_model(u, subscribed.contains(&u.id)))
        .collect())
}

async fn subscription_reads(
    app_state: &AppState,
    requester_id: i32,
    authors: Vec<user::Model>,
    recipes_limit: Option<u64>,
) -> Result<Vec<SubscriptionRead>, AppError> {
    let media_url = &app_state.config.media_url;
    let details = follow_service::subscription_details(
        &app_state.db_pool,
        Some(requester_id),
        authors,
        recipes_limit,
    )
    .await?;
    Ok(details
        .into_iter()
        .map(|d| SubscriptionRead {
            author: UserRead::from_model(&d.author, d.is_subscribed),
            recipes: d
                .recipes
                .iter()
                .map(|r| RecipeShort::from_model(r, media_url))
                .collect(),
            recipes_count: d.recipes_count,
        })
        .collect())
}

async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<(StatusCode, Json<UserCreated>), AppError> {
    let user = auth_service::register_user(
        &app_state.db_pool,
        payload,
        app_state.config.password_hash_cost,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn list_users_handler(
    requester: Requester,
    State(app_state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    WithRejection(Query(params), _): WithRejection<Query<PageParams>, AppError>,
) -> Result<Json<Page<UserRead>>, AppError> {
    let page = params.resolve(app_state.config.default_page_size)?;
    let (users, count) = user_service::list_users(&app_state.db_pool, page.page, page.size).await?;
    let page = page.within(count)?;
    let results = read_users(&app_state, &requester, &users).await?;
    Ok(Json(Page::new(results, count, page, &uri)))
}

async fn get_user_handler(
    requester: Requester,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(user_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<UserRead>, AppError> {
    let user = user_service::get_user_by_id(&app_state.db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
    let mut reads = read_users(&app_state, &requester, std::slice::from_ref(&user)).await?;
    reads
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

async fn me_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserRead>, AppError> {
    let user = user_service::get_user_by_id(&app_state.db_pool, auth_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
    Ok(Json(UserRead::from_model(&user, false)))
}

async fn set_password_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<SetPasswordRequest>, AppError>,
) -> Result<StatusCode, AppError> {
    auth_service::change_password(
        &app_state.db_pool,
        auth_user.id,
        payload,
        app_state.config.password_hash_cost,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn subscriptions_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    WithRejection(Query(params), _): WithRejection<Query<PageParams>, AppError>,
    WithRejection(Query(limit), _): WithRejection<Query<RecipesLimitParams>, AppError>,
) -> Result<Json<Page<SubscriptionRead>>, AppError> {
    let page = params.resolve(app_state.config.default_page_size)?;
    let (authors, count) =
        follow_service::list_subscriptions(&app_state.db_pool, auth_user.id, page.page, page.size)
            .await?;
    let page = page.within(count)?;
    let results = subscription_reads(&app_state, auth_user.id, authors, limit.limit()).await?;
    Ok(Json(Page::new(results, count, page, &uri)))
}

async fn subscribe_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(author_id), _): WithRejection<Path<i32>, AppError>,
    WithRejection(Query(limit), _): WithRejection<Query<RecipesLimitParams>, AppError>,
) -> Result<(StatusCode, Json<SubscriptionRead>), AppError> {
    let author = follow_service::subscribe(&app_state.db_pool, auth_user.id, author_id).await?;
    let read = subscription_reads(&app_state, auth_user.id, vec![author], limit.limit())
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Author not found.".to_string()))?;
    Ok((StatusCode::CREATED, Json(read)))
}

async fn unsubscribe_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(author_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<StatusCode, AppError> {
    follow_service::unsubscribe(&app_state.db_pool, auth_user.id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::RecipesLimitParams;

    #[test]
    fn recipes_limit_ignores_garbage() {
        let limit = |raw: &str| {
            RecipesLimitParams {
                recipes_limit: Some(raw.to_string()),
            }
            .limit()
        };
        assert_eq!(limit("3"), Some(3));
        assert_eq!(limit("-1"), None);
        assert_eq!(limit("many"), None);
        assert_eq!(RecipesLimitParams::default().limit(), None);
    }
}
