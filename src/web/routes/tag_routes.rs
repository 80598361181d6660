use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;

use crate::db::services::catalog_service;
use crate::web::models::catalog_models::{CreateTagRequest, TagRead};
use crate::web::permissions::{self, IsAdminOrReadOnly};
use crate::web::{AppError, AppState};

pub fn create_tag_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tags/", get(list_tags_handler).post(create_tag_handler))
        .route("/api/tags/{tag_id}/", get(get_tag_handler))
        .route_layer(axum_middleware::from_fn(
            permissions::guard::<IsAdminOrReadOnly>,
        ))
}

async fn list_tags_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<TagRead>>, AppError> {
    let tags = catalog_service::list_tags(&app_state.db_pool).await?;
    Ok(Json(tags.into_iter().map(TagRead::from).collect()))
}

async fn get_tag_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(tag_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<TagRead>, AppError> {
    let tag = catalog_service::get_tag(&app_state.db_pool, tag_id).await?;
    Ok(Json(tag.into()))
}

async fn create_tag_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateTagRequest>, AppError>,
) -> Result<(StatusCode, Json<TagRead>), AppError> {
    let tag = catalog_service::create_tag(&app_state.db_pool, payload.validate()?).await?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}
