use axum::{
    extract::{Extension, OriginalUri, Path, State},
    http::{header, Method, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{Query, WithRejection};
use std::sync::Arc;
use tracing::warn;

use crate::db::entities::{cart, favorite};
use crate::db::services::bookmark_service::{self, BookmarkTable};
use crate::db::services::{recipe_service, shopping_list_service};
use crate::services::image_service;
use crate::web::filters::{self, RecipeFilterParams};
use crate::web::middleware::auth::{self, Requester};
use crate::web::models::recipe_models::{RecipeRead, RecipeShort, RecipeWriteRequest};
use crate::web::models::AuthenticatedUser;
use crate::web::pagination::{Page, PageParams};
use crate::web::permissions::{self, RecipePolicy, RECIPE_POLICY};
use crate::web::{AppError, AppState};

const SHOPPING_LIST_FILENAME: &str = "shoppinglist.html";

pub fn create_recipe_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route(
            "/api/recipes/download_shopping_cart/",
            get(download_shopping_cart_handler),
        )
        .route(
            "/api/recipes/{recipe_id}/favorite/",
            post(add_bookmark_handler::<favorite::Entity>)
                .delete(remove_bookmark_handler::<favorite::Entity>),
        )
        .route(
            "/api/recipes/{recipe_id}/shopping_cart/",
            post(add_bookmark_handler::<cart::Entity>)
                .delete(remove_bookmark_handler::<cart::Entity>),
        )
        .route_layer(axum_middleware::from_fn_with_state(app_state, auth::auth));

    Router::new()
        .route(
            "/api/recipes/",
            get(list_recipes_handler).post(create_recipe_handler),
        )
        .route(
            "/api/recipes/{recipe_id}/",
            get(get_recipe_handler)
                .put(update_recipe_handler)
                .patch(update_recipe_handler)
                .delete(delete_recipe_handler),
        )
        .route_layer(axum_middleware::from_fn(
            permissions::guard::<RecipePolicy>,
        ))
        .merge(protected)
}

async fn render_one(
    app_state: &AppState,
    recipe: crate::db::entities::recipe::Model,
    requester_id: Option<i32>,
) -> Result<RecipeRead, AppError> {
    let details = recipe_service::load_one(&app_state.db_pool, recipe, requester_id).await?;
    Ok(RecipeRead::from_details(details, &app_state.config.media_url))
}

async fn list_recipes_handler(
    requester: Requester,
    State(app_state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    WithRejection(Query(page_params), _): WithRejection<Query<PageParams>, AppError>,
    WithRejection(Query(filter_params), _): WithRejection<Query<RecipeFilterParams>, AppError>,
) -> Result<Json<Page<RecipeRead>>, AppError> {
    let page = page_params.resolve(app_state.config.default_page_size)?;
    let filter = filter_params.parse()?;
    let select = filters::recipe_query(&filter, requester.id());

    let (recipes, count) =
        recipe_service::list_recipes(&app_state.db_pool, select, page.page, page.size).await?;
    let page = page.within(count)?;

    let media_url = &app_state.config.media_url;
    let results = recipe_service::load_details(&app_state.db_pool, recipes, requester.id())
        .await?
        .into_iter()
        .map(|details| RecipeRead::from_details(details, media_url))
        .collect();
    Ok(Json(Page::new(results, count, page, &uri)))
}

async fn get_recipe_handler(
    requester: Requester,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<RecipeRead>, AppError> {
    let recipe = recipe_service::get_recipe(&app_state.db_pool, recipe_id).await?;
    Ok(Json(render_one(&app_state, recipe, requester.id()).await?))
}

async fn create_recipe_handler(
    requester: Requester,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<RecipeWriteRequest>, AppError>,
) -> Result<(StatusCode, Json<RecipeRead>), AppError> {
    let author_id = requester.id().ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".to_string())
    })?;

    let mut command = payload.validate(false)?;
    let data_url = command
        .image
        .take()
        .ok_or_else(|| AppError::validation("image", "This field is required."))?;
    let image = image_service::decode_data_url(&data_url)?;
    let image_path = app_state.images.save(&image).await?;

    let created =
        match recipe_service::create_recipe(&app_state.db_pool, author_id, command, image_path.clone())
            .await
        {
            Ok(created) => created,
            Err(e) => {
                app_state.images.remove(&image_path).await;
                return Err(e);
            }
        };

    let read = render_one(&app_state, created, Some(author_id)).await?;
    Ok((StatusCode::CREATED, Json(read)))
}

async fn update_recipe_handler(
    method: Method,
    requester: Requester,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<RecipeWriteRequest>, AppError>,
) -> Result<Json<RecipeRead>, AppError> {
    let existing = recipe_service::get_recipe(&app_state.db_pool, recipe_id).await?;
    permissions::check_object(&RECIPE_POLICY, &method, requester.user(), existing.author_id)?;

    let mut command = payload.validate(method == Method::PATCH)?;
    let new_image = match command.image.take() {
        Some(data_url) => Some(image_service::decode_data_url(&data_url)?),
        None => None,
    };
    let new_image_path = match &new_image {
        Some(image) => Some(app_state.images.save(image).await?),
        None => None,
    };

    let old_image_path = existing.image.clone();
    let updated = match recipe_service::update_recipe(
        &app_state.db_pool,
        existing,
        command,
        new_image_path.clone(),
    )
    .await
    {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(path) = &new_image_path {
                app_state.images.remove(path).await;
            }
            return Err(e);
        }
    };
    if new_image_path.is_some() {
        app_state.images.remove(&old_image_path).await;
    }

    Ok(Json(render_one(&app_state, updated, requester.id()).await?))
}

async fn delete_recipe_handler(
    requester: Requester,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<StatusCode, AppError> {
    let existing = recipe_service::get_recipe(&app_state.db_pool, recipe_id).await?;
    permissions::check_object(
        &RECIPE_POLICY,
        &Method::DELETE,
        requester.user(),
        existing.author_id,
    )?;

    recipe_service::delete_recipe(&app_state.db_pool, existing.id).await?;
    if requester.id() != Some(existing.author_id) {
        warn!(
            recipe_id,
            author_id = existing.author_id,
            requester_id = ?requester.id(),
            "Recipe deleted by a user other than its author."
        );
    }
    app_state.images.remove(&existing.image).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_bookmark_handler<E>(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<(StatusCode, Json<RecipeShort>), AppError>
where
    E: BookmarkTable,
    E::Model: sea_orm::IntoActiveModel<E::Row>,
{
    let recipe =
        bookmark_service::add_bookmark::<E>(&app_state.db_pool, auth_user.id, recipe_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(RecipeShort::from_model(&recipe, &app_state.config.media_url)),
    ))
}

async fn remove_bookmark_handler<E: BookmarkTable>(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<StatusCode, AppError> {
    bookmark_service::remove_bookmark::<E>(&app_state.db_pool, auth_user.id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn download_shopping_cart_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    if !shopping_list_service::has_cart_items(&app_state.db_pool, auth_user.id).await? {
        return Err(AppError::BadRequest("Shopping cart is empty.".to_string()));
    }
    let rows = shopping_list_service::cart_ingredient_rows(&app_state.db_pool, auth_user.id).await?;
    let groups = shopping_list_service::build_shopping_list(&rows);
    let html = shopping_list_service::render_shopping_list(&groups)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
            ),
        ],
        html,
    ))
}
