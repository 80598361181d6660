//! Recipe aggregate persistence.
//!
//! A recipe is stored across three tables: `recipes` for the scalar fields,
//! `recipe_tags` for tag links and `ingredients_in_recipe` for the quantified
//! line items. Writes always replace both link sets inside the same
//! transaction as the scalar change, so readers never see a recipe whose
//! tags or ingredients are half updated.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait,
};
use tracing::info;

use crate::db::entities::{
    cart, favorite, ingredient, ingredient_in_recipe, recipe, recipe_tag, tag, user,
};
use crate::db::services::{fetch_page, user_service};
use crate::web::error::AppError;
use crate::web::models::recipe_models::{IngredientAmount, RecipeCommand};

/// A recipe with everything its read shape needs, resolved for one requester.
#[derive(Debug, Clone)]
pub struct RecipeDetails {
    pub recipe: recipe::Model,
    pub author: user::Model,
    pub is_subscribed: bool,
    pub tags: Vec<tag::Model>,
    pub lines: Vec<(ingredient_in_recipe::Model, ingredient::Model)>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

pub async fn get_recipe(db: &DatabaseConnection, recipe_id: i32) -> Result<recipe::Model, AppError> {
    recipe::Entity::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found.".to_string()))
}

/// Runs an already filtered recipe query, newest first.
pub async fn list_recipes(
    db: &DatabaseConnection,
    select: Select<recipe::Entity>,
    page: u64,
    page_size: u64,
) -> Result<(Vec<recipe::Model>, u64), DbErr> {
    fetch_page(db, select.order_by_desc(recipe::Column::Id), page, page_size).await
}

async fn recipe_ids_in<E>(
    db: &DatabaseConnection,
    user_id: i32,
    recipe_ids: &[i32],
    user_col: E::Column,
    recipe_col: E::Column,
) -> Result<HashSet<i32>, DbErr>
where
    E: EntityTrait,
{
    let ids: Vec<i32> = E::find()
        .select_only()
        .column(recipe_col)
        .filter(user_col.eq(user_id))
        .filter(recipe_col.is_in(recipe_ids.to_vec()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Resolves authors, tags, line items and the requester's flags for `recipes`,
/// keeping the input order. Anonymous requesters see every flag as false.
pub async fn load_details(
    db: &DatabaseConnection,
    recipes: Vec<recipe::Model>,
    requester_id: Option<i32>,
) -> Result<Vec<RecipeDetails>, DbErr> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let recipe_ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<i32> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let subscribed = user_service::subscribed_author_ids(db, requester_id, &author_ids).await?;

    let mut tags_by_recipe: HashMap<i32, Vec<tag::Model>> = HashMap::new();
    let tag_links = recipe_tag::Entity::find()
        .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids.clone()))
        .find_also_related(tag::Entity)
        .order_by_asc(tag::Column::Name)
        .all(db)
        .await?;
    for (link, tag) in tag_links {
        if let Some(tag) = tag {
            tags_by_recipe.entry(link.recipe_id).or_default().push(tag);
        }
    }

    let mut lines_by_recipe: HashMap<i32, Vec<(ingredient_in_recipe::Model, ingredient::Model)>> =
        HashMap::new();
    let lines = ingredient_in_recipe::Entity::find()
        .filter(ingredient_in_recipe::Column::RecipeId.is_in(recipe_ids.clone()))
        .find_also_related(ingredient::Entity)
        .order_by_asc(ingredient_in_recipe::Column::Id)
        .all(db)
        .await?;
    for (line, ingredient) in lines {
        if let Some(ingredient) = ingredient {
            lines_by_recipe
                .entry(line.recipe_id)
                .or_default()
                .push((line, ingredient));
        }
    }

    let (favorited, in_cart) = match requester_id {
        Some(user_id) => (
            recipe_ids_in::<favorite::Entity>(
                db,
                user_id,
                &recipe_ids,
                favorite::Column::UserId,
                favorite::Column::RecipeId,
            )
            .await?,
            recipe_ids_in::<cart::Entity>(
                db,
                user_id,
                &recipe_ids,
                cart::Column::UserId,
                cart::Column::RecipeId,
            )
            .await?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    let mut details = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
            DbErr::RecordNotFound(format!("author {} of recipe {}", recipe.author_id, recipe.id))
        })?;
        details.push(RecipeDetails {
            is_subscribed: subscribed.contains(&author.id),
            author,
            tags: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
            lines: lines_by_recipe.remove(&recipe.id).unwrap_or_default(),
            is_favorited: favorited.contains(&recipe.id),
            is_in_shopping_cart: in_cart.contains(&recipe.id),
            recipe,
        });
    }
    Ok(details)
}

pub async fn load_one(
    db: &DatabaseConnection,
    recipe: recipe::Model,
    requester_id: Option<i32>,
) -> Result<RecipeDetails, AppError> {
    load_details(db, vec![recipe], requester_id)
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Recipe not found.".to_string()))
}

async fn ensure_references_exist(
    txn: &DatabaseTransaction,
    tag_ids: &[i32],
    ingredients: &[IngredientAmount],
) -> Result<(), AppError> {
    let found_tags: Vec<i32> = tag::Entity::find()
        .select_only()
        .column(tag::Column::Id)
        .filter(tag::Column::Id.is_in(tag_ids.to_vec()))
        .into_tuple()
        .all(txn)
        .await?;
    if let Some(missing) = tag_ids.iter().find(|id| !found_tags.contains(id)) {
        return Err(AppError::validation(
            "tags",
            format!("Invalid pk \"{missing}\" - object does not exist."),
        ));
    }

    let ingredient_ids: Vec<i32> = ingredients.iter().map(|i| i.ingredient_id).collect();
    let found_ingredients: Vec<i32> = ingredient::Entity::find()
        .select_only()
        .column(ingredient::Column::Id)
        .filter(ingredient::Column::Id.is_in(ingredient_ids.clone()))
        .into_tuple()
        .all(txn)
        .await?;
    if let Some(missing) = ingredient_ids
        .iter()
        .find(|id| !found_ingredients.contains(id))
    {
        return Err(AppError::validation(
            "ingredients",
            format!("Invalid pk \"{missing}\" - object does not exist."),
        ));
    }
    Ok(())
}

async fn replace_links<C>(
    conn: &C,
    recipe_id: i32,
    tag_ids: &[i32],
    ingredients: &[IngredientAmount],
) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;
    ingredient_in_recipe::Entity::delete_many()
        .filter(ingredient_in_recipe::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;

    recipe_tag::Entity::insert_many(tag_ids.iter().map(|tag_id| recipe_tag::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(*tag_id),
    }))
    .exec_without_returning(conn)
    .await?;
    ingredient_in_recipe::Entity::insert_many(ingredients.iter().map(|line| {
        ingredient_in_recipe::ActiveModel {
            recipe_id: Set(recipe_id),
            ingredient_id: Set(line.ingredient_id),
            amount: Set(line.amount),
            ..Default::default()
        }
    }))
    .exec_without_returning(conn)
    .await?;
    Ok(())
}

/// Inserts a recipe with its tags and line items in one transaction.
/// `image_path` is the already stored image, relative to the media directory.
pub async fn create_recipe(
    db: &DatabaseConnection,
    author_id: i32,
    command: RecipeCommand,
    image_path: String,
) -> Result<recipe::Model, AppError> {
    let (Some(name), Some(text), Some(cooking_time)) =
        (command.name, command.text, command.cooking_time)
    else {
        return Err(AppError::BadRequest(
            "name, text and cooking_time are required.".to_string(),
        ));
    };

    let txn = db.begin().await?;
    ensure_references_exist(&txn, &command.tags, &command.ingredients).await?;

    let created = recipe::ActiveModel {
        author_id: Set(author_id),
        name: Set(name),
        text: Set(text),
        image: Set(image_path),
        cooking_time: Set(cooking_time),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    replace_links(&txn, created.id, &command.tags, &command.ingredients).await?;
    txn.commit().await?;

    info!(recipe_id = created.id, author_id, "Created recipe.");
    Ok(created)
}

/// Applies the scalar changes present in `command` and replaces both link sets.
/// `new_image_path` replaces the stored image path when set.
pub async fn update_recipe(
    db: &DatabaseConnection,
    existing: recipe::Model,
    command: RecipeCommand,
    new_image_path: Option<String>,
) -> Result<recipe::Model, AppError> {
    let recipe_id = existing.id;
    let txn = db.begin().await?;
    ensure_references_exist(&txn, &command.tags, &command.ingredients).await?;

    let mut active = existing.clone().into_active_model();
    if let Some(name) = command.name {
        active.name = Set(name);
    }
    if let Some(text) = command.text {
        active.text = Set(text);
    }
    if let Some(cooking_time) = command.cooking_time {
        active.cooking_time = Set(cooking_time);
    }
    if let Some(image) = new_image_path {
        active.image = Set(image);
    }
    let updated = if active.is_changed() {
        active.update(&txn).await?
    } else {
        existing
    };
    replace_links(&txn, recipe_id, &command.tags, &command.ingredients).await?;
    txn.commit().await?;

    info!(recipe_id, "Updated recipe.");
    Ok(updated)
}

/// Deletes a recipe and every row that points at it.
pub async fn delete_recipe(db: &DatabaseConnection, recipe_id: i32) -> Result<(), DbErr> {
    let txn = db.begin().await?;
    cart::Entity::delete_many()
        .filter(cart::Column::RecipeId.eq(recipe_id))
        .exec(&txn)
        .await?;
    favorite::Entity::delete_many()
        .filter(favorite::Column::RecipeId.eq(recipe_id))
        .exec(&txn)
        .await?;
    ingredient_in_recipe::Entity::delete_many()
        .filter(ingredient_in_recipe::Column::RecipeId.eq(recipe_id))
        .exec(&txn)
        .await?;
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(&txn)
        .await?;
    recipe::Entity::delete_by_id(recipe_id).exec(&txn).await?;
    txn.commit().await?;

    info!(recipe_id, "Deleted recipe.");
    Ok(())
}
