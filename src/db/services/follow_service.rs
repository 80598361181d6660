use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::info;

use crate::db::entities::{follow, recipe, user};
use crate::db::services::fetch_page;
use crate::web::error::AppError;

/// An author together with the recipes shown on the subscriptions page.
#[derive(Debug)]
pub struct SubscriptionDetails {
    pub author: user::Model,
    pub is_subscribed: bool,
    pub recipes: Vec<recipe::Model>,
    pub recipes_count: u64,
}

async fn find_author(db: &DatabaseConnection, author_id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(author_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Author not found.".to_string()))
}

async fn find_follow(
    db: &DatabaseConnection,
    user_id: i32,
    author_id: i32,
) -> Result<Option<follow::Model>, DbErr> {
    follow::Entity::find_by_id((user_id, author_id)).one(db).await
}

/// Makes `user_id` follow `author_id`. Rejects a repeated follow and following oneself.
pub async fn subscribe(
    db: &DatabaseConnection,
    user_id: i32,
    author_id: i32,
) -> Result<user::Model, AppError> {
    let author = find_author(db, author_id).await?;

    if find_follow(db, user_id, author_id).await?.is_some() {
        return Err(AppError::BadRequest(
            "You are already subscribed to this author.".to_string(),
        ));
    }
    if user_id == author_id {
        return Err(AppError::BadRequest(
            "You cannot subscribe to yourself.".to_string(),
        ));
    }

    follow::ActiveModel {
        user_id: Set(user_id),
        author_id: Set(author_id),
    }
    .insert(db)
    .await?;

    info!(user_id, author_id, "User subscribed to author.");
    Ok(author)
}

/// Removes an existing follow. Both a missing author and a missing follow are 404s.
pub async fn unsubscribe(
    db: &DatabaseConnection,
    user_id: i32,
    author_id: i32,
) -> Result<(), AppError> {
    find_author(db, author_id).await?;

    let existing = find_follow(db, user_id, author_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found.".to_string()))?;
    follow::Entity::delete_by_id((existing.user_id, existing.author_id))
        .exec(db)
        .await?;

    info!(user_id, author_id, "User unsubscribed from author.");
    Ok(())
}

/// Authors followed by `user_id`, ordered by id.
pub async fn list_subscriptions(
    db: &DatabaseConnection,
    user_id: i32,
    page: u64,
    page_size: u64,
) -> Result<(Vec<user::Model>, u64), DbErr> {
    let author_ids: Vec<i32> = follow::Entity::find()
        .select_only()
        .column(follow::Column::AuthorId)
        .filter(follow::Column::UserId.eq(user_id))
        .into_tuple()
        .all(db)
        .await?;

    fetch_page(
        db,
        user::Entity::find()
            .filter(user::Column::Id.is_in(author_ids))
            .order_by_asc(user::Column::Id),
        page,
        page_size,
    )
    .await
}

/// Loads each author's newest recipes (capped by `recipes_limit`) and recipe count.
pub async fn subscription_details(
    db: &DatabaseConnection,
    requester_id: Option<i32>,
    authors: Vec<user::Model>,
    recipes_limit: Option<u64>,
) -> Result<Vec<SubscriptionDetails>, DbErr> {
    let author_ids: Vec<i32> = authors.iter().map(|a| a.id).collect();
    let subscribed =
        crate::db::services::user_service::subscribed_author_ids(db, requester_id, &author_ids)
            .await?;

    let mut details = Vec::with_capacity(authors.len());
    for author in authors {
        let recipes_query = recipe::Entity::find()
            .filter(recipe::Column::AuthorId.eq(author.id))
            .order_by_desc(recipe::Column::Id);
        let recipes_count = recipes_query.clone().count(db).await?;
        let recipes = match recipes_limit {
            Some(limit) => recipes_query.limit(limit).all(db).await?,
            None => recipes_query.all(db).await?,
        };
        details.push(SubscriptionDetails {
            is_subscribed: subscribed.contains(&author.id),
            author,
            recipes,
            recipes_count,
        });
    }
    Ok(details)
}
