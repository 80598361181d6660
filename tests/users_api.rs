mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::json;

use common::spawn_app;
use foodgram_backend::db::entities::{auth_token, follow};

#[tokio::test]
async fn registration_login_and_logout() {
    let app = spawn_app().await;
    let (id, token) = app.register_and_login("anna").await;

    let duplicate = app
        .post(
            "/api/users/",
            None,
            json!({
                "email": "anna@example.com",
                "username": "someone-else",
                "first_name": "A",
                "last_name": "B",
                "password": "long-enough"
            }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert!(duplicate.json()["email"].is_array());

    let me = app.get("/api/users/me/", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["id"], id);
    assert!(me.json().get("password").is_none());

    let wrong_password = app
        .post(
            "/api/auth/token/login/",
            None,
            json!({ "email": "anna@example.com", "password": "nope-nope" }),
        )
        .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);

    let logout = app.post("/api/auth/token/logout/", Some(&token), json!({})).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    let after_logout = app.get("/api/users/me/", Some(&token)).await;
    assert_eq!(after_logout.status, StatusCode::UNAUTHORIZED);

    let anonymous_me = app.get("/api/users/me/", None).await;
    assert_eq!(anonymous_me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_purges_expired_tokens() {
    let app = spawn_app().await;
    let (id, _) = app.register_and_login("anna").await;
    let issued = Utc::now() - Duration::hours(48);
    auth_token::ActiveModel {
        jti: Set("stale-jti".to_string()),
        user_id: Set(id),
        created_at: Set(issued),
        expires_at: Set(issued + Duration::hours(1)),
    }
    .insert(&app.db)
    .await
    .unwrap();
    assert_eq!(auth_token::Entity::find().count(&app.db).await.unwrap(), 2);

    let login = app
        .post(
            "/api/auth/token/login/",
            None,
            json!({ "email": "anna@example.com", "password": "correct-horse" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);

    assert!(auth_token::Entity::find_by_id("stale-jti".to_string())
        .one(&app.db)
        .await
        .unwrap()
        .is_none());
    assert_eq!(auth_token::Entity::find().count(&app.db).await.unwrap(), 2);
}

#[tokio::test]
async fn set_password_checks_current_password() {
    let app = spawn_app().await;
    let (_, token) = app.register_and_login("anna").await;

    let wrong = app
        .post(
            "/api/users/set_password/",
            Some(&token),
            json!({ "current_password": "not-it", "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.json()["current_password"][0], "Wrong password.");

    let changed = app
        .post(
            "/api/users/set_password/",
            Some(&token),
            json!({ "current_password": "correct-horse", "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::NO_CONTENT);

    let login = app
        .post(
            "/api/auth/token/login/",
            None,
            json!({ "email": "anna@example.com", "password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn subscribe_rules() {
    let app = spawn_app().await;
    let (reader_id, reader) = app.register_and_login("reader").await;
    let (author_id, author) = app.register_and_login("author").await;

    let own = app
        .post(&format!("/api/users/{reader_id}/subscribe/"), Some(&reader), json!({}))
        .await;
    assert_eq!(own.status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/users/{author_id}/subscribe/");
    let first = app.post(&uri, Some(&reader), json!({})).await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.text());
    assert_eq!(first.json()["id"], author_id);
    assert_eq!(first.json()["is_subscribed"], true);
    assert_eq!(first.json()["recipes_count"], 0);

    let second = app.post(&uri, Some(&reader), json!({})).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(follow::Entity::find().count(&app.db).await.unwrap(), 1);

    let missing_author = app
        .post("/api/users/9999/subscribe/", Some(&reader), json!({}))
        .await;
    assert_eq!(missing_author.status, StatusCode::NOT_FOUND);

    assert_eq!(app.delete(&uri, Some(&reader)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&uri, Some(&reader)).await.status, StatusCode::NOT_FOUND);

    let not_following = app
        .delete(&format!("/api/users/{reader_id}/subscribe/"), Some(&author))
        .await;
    assert_eq!(not_following.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subscriptions_list_caps_recipes() {
    let app = spawn_app().await;
    let (_, reader) = app.register_and_login("reader").await;
    let (author_id, author) = app.register_and_login("author").await;
    let tag = app.seed_tag("Lunch", "#49B64E", "lunch").await;
    let salt = app.seed_ingredient("Salt", "g").await;
    for name in ["Soup", "Stew", "Pie"] {
        app.create_recipe(&author, name, &[tag], &[(salt, 2)]).await;
    }
    app.post(&format!("/api/users/{author_id}/subscribe/"), Some(&reader), json!({}))
        .await;

    let capped = app
        .get("/api/users/subscriptions/?recipes_limit=2", Some(&reader))
        .await;
    assert_eq!(capped.status, StatusCode::OK);
    let body = capped.json();
    assert_eq!(body["count"], 1);
    let entry = &body["results"][0];
    assert_eq!(entry["username"], "author");
    assert_eq!(entry["recipes_count"], 3);
    assert_eq!(entry["recipes"].as_array().unwrap().len(), 2);
    assert_eq!(entry["recipes"][0]["name"], "Pie");

    let ignored = app
        .get("/api/users/subscriptions/?recipes_limit=abc", Some(&reader))
        .await
        .json();
    assert_eq!(ignored["results"][0]["recipes"].as_array().unwrap().len(), 3);

    let author_view = app.get("/api/users/subscriptions/", Some(&author)).await.json();
    assert_eq!(author_view["count"], 0);
}

#[tokio::test]
async fn user_list_reports_subscription_state() {
    let app = spawn_app().await;
    let (_, reader) = app.register_and_login("reader").await;
    let (author_id, _) = app.register_and_login("author").await;
    app.post(&format!("/api/users/{author_id}/subscribe/"), Some(&reader), json!({}))
        .await;

    let anonymous = app.get(&format!("/api/users/{author_id}/"), None).await.json();
    assert_eq!(anonymous["is_subscribed"], false);
    let signed_in = app
        .get(&format!("/api/users/{author_id}/"), Some(&reader))
        .await
        .json();
    assert_eq!(signed_in["is_subscribed"], true);

    let list = app.get("/api/users/?limit=1", None).await.json();
    assert_eq!(list["count"], 2);
    assert_eq!(list["results"].as_array().unwrap().len(), 1);
    assert_eq!(list["next"], "/api/users/?limit=1&page=2");

    let missing = app.get("/api/users/9999/", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_writes_are_staff_only() {
    let app = spawn_app().await;
    let (staff_id, staff) = app.register_and_login("staff").await;
    let (_, regular) = app.register_and_login("regular").await;
    app.make_staff(staff_id).await;
    let tag = json!({ "name": "Dinner", "color": "#8775D2", "slug": "dinner" });

    let anonymous = app.post("/api/tags/", None, tag.clone()).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    let forbidden = app.post("/api/tags/", Some(&regular), tag.clone()).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let created = app.post("/api/tags/", Some(&staff), tag.clone()).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text());
    let duplicate = app.post("/api/tags/", Some(&staff), tag).await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);

    let bad_color = app
        .post(
            "/api/tags/",
            Some(&staff),
            json!({ "name": "Snack", "color": "orange", "slug": "snack" }),
        )
        .await;
    assert_eq!(bad_color.status, StatusCode::BAD_REQUEST);
    assert!(bad_color.json()["color"].is_array());

    let ingredient = app
        .post(
            "/api/ingredients/",
            Some(&staff),
            json!({ "name": "Sugar", "measurement_unit": "g" }),
        )
        .await;
    assert_eq!(ingredient.status, StatusCode::CREATED);
    let tags = app.get("/api/tags/", None).await.json();
    assert_eq!(tags.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn ingredient_search_is_prefix_and_case_insensitive() {
    let app = spawn_app().await;
    app.seed_ingredient("Salt", "g").await;
    app.seed_ingredient("salmon", "g").await;
    app.seed_ingredient("Sugar", "g").await;
    app.seed_ingredient("Rock salt", "g").await;

    let found = app.get("/api/ingredients/?name=SAL", None).await.json();
    let names: Vec<&str> = found
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Salt"));
    assert!(names.contains(&"salmon"));

    let all = app.get("/api/ingredients/", None).await.json();
    assert_eq!(all.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn ingredient_search_folds_cyrillic_case() {
    let app = spawn_app().await;
    app.seed_ingredient("Соль", "г").await;
    app.seed_ingredient("сахар", "г").await;
    app.seed_ingredient("Сок", "мл").await;
    app.seed_ingredient("Молоко", "мл").await;

    let names = |body: serde_json::Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap().to_string())
            .collect()
    };

    let lower = app.get("/api/ingredients/?name=%D1%81%D0%BE", None).await.json();
    assert_eq!(names(lower), vec!["Сок", "Соль"]);

    let upper = app.get("/api/ingredients/?name=%D0%A1%D0%90", None).await.json();
    assert_eq!(names(upper), vec!["сахар"]);
}
