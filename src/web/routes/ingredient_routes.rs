use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use axum_extra::extract::{Query, WithRejection};
use std::sync::Arc;

use crate::db::services::catalog_service;
use crate::web::filters::IngredientFilterParams;
use crate::web::models::catalog_models::{CreateIngredientRequest, IngredientRead};
use crate::web::permissions::{self, IsAdminOrReadOnly};
use crate::web::{AppError, AppState};

pub fn create_ingredient_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/ingredients/",
            get(list_ingredients_handler).post(create_ingredient_handler),
        )
        .route("/api/ingredients/{ingredient_id}/", get(get_ingredient_handler))
        .route_layer(axum_middleware::from_fn(
            permissions::guard::<IsAdminOrReadOnly>,
        ))
}

async fn list_ingredients_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Query(params), _): WithRejection<Query<IngredientFilterParams>, AppError>,
) -> Result<Json<Vec<IngredientRead>>, AppError> {
    let ingredients =
        catalog_service::list_ingredients(&app_state.db_pool, params.name.as_deref()).await?;
    Ok(Json(
        ingredients.into_iter().map(IngredientRead::from).collect(),
    ))
}

async fn get_ingredient_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(ingredient_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<IngredientRead>, AppError> {
    let ingredient = catalog_service::get_ingredient(&app_state.db_pool, ingredient_id).await?;
    Ok(Json(ingredient.into()))
}

async fn create_ingredient_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateIngredientRequest>, AppError>,
) -> Result<(StatusCode, Json<IngredientRead>), AppError> {
    let ingredient =
        catalog_service::create_ingredient(&app_state.db_pool, payload.validate()?).await?;
    Ok((StatusCode::CREATED, Json(ingredient.into())))
}
