use axum::{http::Method, middleware as axum_middleware, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::server::config::ServerConfig;
use crate::services::image_service::ImageStore;
use crate::web::middleware::auth;
use crate::web::routes::*;

pub use error::AppError;

pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod permissions;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub images: ImageStore,
}

/// Path under which stored images are served, when `media_url` is a local path.
fn media_mount(media_url: &str) -> Option<&str> {
    let mount = media_url.trim_end_matches('/');
    (mount.starts_with('/') && mount.len() > 1).then_some(mount)
}

pub fn create_axum_router(db_pool: DatabaseConnection, config: Arc<ServerConfig>) -> Router {
    let app_state = Arc::new(AppState {
        db_pool,
        images: ImageStore::new(&config.media_dir),
        config,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let mut router = Router::new()
        .merge(auth_routes::create_auth_router(app_state.clone()))
        .merge(user_routes::create_user_router(app_state.clone()))
        .merge(tag_routes::create_tag_router())
        .merge(ingredient_routes::create_ingredient_router())
        .merge(recipe_routes::create_recipe_router(app_state.clone()));

    if let Some(mount) = media_mount(&app_state.config.media_url) {
        router = router.nest_service(mount, ServeDir::new(app_state.images.media_dir()));
    }

    router
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth::optional_auth,
        ))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::media_mount;

    #[test]
    fn media_is_mounted_only_for_local_paths() {
        assert_eq!(media_mount("/media/"), Some("/media"));
        assert_eq!(media_mount("/"), None);
        assert_eq!(media_mount("https://cdn.example.com/media/"), None);
    }
}
