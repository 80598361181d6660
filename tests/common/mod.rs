#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, IntoActiveModel,
    Set,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use foodgram_backend::db::entities::{ingredient, tag, user};
use foodgram_backend::db::schema::ensure_schema;
use foodgram_backend::server::config::ServerConfig;
use foodgram_backend::web::create_axum_router;

pub const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8/5+hHgAHggJ/PchI7wAAAABJRU5ErkJggg==";

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let mut opt = ConnectOptions::new(database_url.clone());
    opt.max_connections(4).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    ensure_schema(&db).await.unwrap();

    let config = Arc::new(ServerConfig {
        database_url,
        jwt_secret: "test-secret".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        media_dir: dir.path().join("media").display().to_string(),
        media_url: "/media/".to_string(),
        log_dir: dir.path().join("logs").display().to_string(),
        default_page_size: 6,
        token_ttl_hours: 1,
        db_max_connections: 4,
        password_hash_cost: 4,
    });

    TestApp {
        router: create_axum_router(db.clone(), config.clone()),
        db,
        config,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Registers `username` and logs in, returning the user id and token.
    pub async fn register_and_login(&self, username: &str) -> (i32, String) {
        let email = format!("{username}@example.com");
        let created = self
            .post(
                "/api/users/",
                None,
                json!({
                    "email": email,
                    "username": username,
                    "first_name": "Test",
                    "last_name": "User",
                    "password": "correct-horse"
                }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.text());
        let id = created.json()["id"].as_i64().unwrap() as i32;

        let login = self
            .post(
                "/api/auth/token/login/",
                None,
                json!({ "email": email, "password": "correct-horse" }),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.text());
        let token = login.json()["auth_token"].as_str().unwrap().to_string();
        (id, token)
    }

    pub async fn make_staff(&self, user_id: i32) {
        let model = user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .unwrap()
            .unwrap();
        let mut active = model.into_active_model();
        active.is_staff = Set(true);
        active.update(&self.db).await.unwrap();
    }

    pub async fn seed_tag(&self, name: &str, color: &str, slug: &str) -> i32 {
        tag::ActiveModel {
            name: Set(name.to_string()),
            color: Set(color.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
        .id
    }

    pub async fn seed_ingredient(&self, name: &str, unit: &str) -> i32 {
        ingredient::ActiveModel {
            name: Set(name.to_string()),
            measurement_unit: Set(unit.to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
        .id
    }

    /// Creates a recipe through the API and returns its id.
    pub async fn create_recipe(
        &self,
        token: &str,
        name: &str,
        tags: &[i32],
        ingredients: &[(i32, i32)],
    ) -> i32 {
        let response = self
            .post("/api/recipes/", Some(token), recipe_body(name, tags, ingredients))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()["id"].as_i64().unwrap() as i32
    }
}

pub fn recipe_body(name: &str, tags: &[i32], ingredients: &[(i32, i32)]) -> Value {
    json!({
        "name": name,
        "text": format!("How to cook {name}."),
        "cooking_time": 20,
        "image": PNG_DATA_URL,
        "tags": tags,
        "ingredients": ingredients
            .iter()
            .map(|(id, amount)| json!({ "id": id, "amount": amount }))
            .collect::<Vec<_>>(),
    })
}
