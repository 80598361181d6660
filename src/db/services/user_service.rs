use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::info;

use crate::db::entities::{follow, user};
use crate::db::services::fetch_page;
use crate::web::error::AppError;
use crate::web::models::user_models::NewUser;

// --- User Service Functions ---

/// Creates a user after checking that neither the email nor the username is taken.
pub async fn create_user(
    db: &DatabaseConnection,
    new_user: NewUser,
    password_hash: String,
) -> Result<user::Model, AppError> {
    let email_taken = user::Entity::find()
        .filter(user::Column::Email.eq(&new_user.email))
        .one(db)
        .await?
        .is_some();
    if email_taken {
        return Err(AppError::conflict("email", "Such user exists."));
    }

    let username_taken = user::Entity::find()
        .filter(user::Column::Username.eq(&new_user.username))
        .one(db)
        .await?
        .is_some();
    if username_taken {
        return Err(AppError::conflict("username", "Such user exists"));
    }

    let created = user::ActiveModel {
        email: Set(new_user.email),
        username: Set(new_user.username),
        first_name: Set(new_user.first_name),
        last_name: Set(new_user.last_name),
        password_hash: Set(password_hash),
        is_staff: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = created.id, "Registered new user.");
    Ok(created)
}

/// Retrieves a user by their ID.
pub async fn get_user_by_id(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find_by_id(user_id).one(db).await
}

/// Retrieves a user by their email, which doubles as the login name.
pub async fn get_user_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
}

pub async fn list_users(
    db: &DatabaseConnection,
    page: u64,
    page_size: u64,
) -> Result<(Vec<user::Model>, u64), DbErr> {
    fetch_page(
        db,
        user::Entity::find().order_by_asc(user::Column::Id),
        page,
        page_size,
    )
    .await
}

pub async fn update_password_hash(
    db: &DatabaseConnection,
    user: user::Model,
    password_hash: String,
) -> Result<user::Model, DbErr> {
    let mut active_model = user.into_active_model();
    active_model.password_hash = Set(password_hash);
    active_model.update(db).await
}

/// Returns which of `author_ids` the requester follows. Anonymous requesters follow nobody.
pub async fn subscribed_author_ids(
    db: &DatabaseConnection,
    requester_id: Option<i32>,
    author_ids: &[i32],
) -> Result<HashSet<i32>, DbErr> {
    let Some(requester_id) = requester_id else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let ids: Vec<i32> = follow::Entity::find()
        .select_only()
        .column(follow::Column::AuthorId)
        .filter(follow::Column::UserId.eq(requester_id))
        .filter(follow::Column::AuthorId.is_in(author_ids.to_vec()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(ids.into_iter().collect())
}
