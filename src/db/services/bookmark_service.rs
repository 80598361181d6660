use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use tracing::info;

use crate::db::entities::{cart, favorite, recipe};
use crate::web::error::AppError;

/// A per-user set of recipes keyed by `(user_id, recipe_id)`.
/// Favorites and the shopping cart share the same add/remove contract.
pub trait BookmarkTable: EntityTrait {
    type Row: ActiveModelTrait<Entity = Self> + Send;

    const KIND: &'static str;
    const ALREADY_ADDED: &'static str;
    const NOT_PRESENT: &'static str;

    fn user_id_column() -> Self::Column;
    fn recipe_id_column() -> Self::Column;
    fn new_row(user_id: i32, recipe_id: i32) -> Self::Row;
}

impl BookmarkTable for favorite::Entity {
    type Row = favorite::ActiveModel;
    const KIND: &'static str = "favorite";
    const ALREADY_ADDED: &'static str = "Recipe is already in favorites.";
    const NOT_PRESENT: &'static str = "Recipe is not in favorites.";

    fn user_id_column() -> Self::Column {
        favorite::Column::UserId
    }

    fn recipe_id_column() -> Self::Column {
        favorite::Column::RecipeId
    }

    fn new_row(user_id: i32, recipe_id: i32) -> Self::Row {
        favorite::ActiveModel {
            user_id: Set(user_id),
            recipe_id: Set(recipe_id),
        }
    }
}

impl BookmarkTable for cart::Entity {
    type Row = cart::ActiveModel;
    const KIND: &'static str = "shopping_cart";
    const ALREADY_ADDED: &'static str = "Recipe is already in the shopping cart.";
    const NOT_PRESENT: &'static str = "Recipe is not in the shopping cart.";

    fn user_id_column() -> Self::Column {
        cart::Column::UserId
    }

    fn recipe_id_column() -> Self::Column {
        cart::Column::RecipeId
    }

    fn new_row(user_id: i32, recipe_id: i32) -> Self::Row {
        cart::ActiveModel {
            user_id: Set(user_id),
            recipe_id: Set(recipe_id),
        }
    }
}

async fn is_present<E: BookmarkTable>(
    db: &DatabaseConnection,
    user_id: i32,
    recipe_id: i32,
) -> Result<bool, AppError> {
    Ok(E::find()
        .filter(E::user_id_column().eq(user_id))
        .filter(E::recipe_id_column().eq(recipe_id))
        .one(db)
        .await?
        .is_some())
}

/// Adds `recipe_id` to the user's set. A second add of the same pair is a 400.
pub async fn add_bookmark<E>(
    db: &DatabaseConnection,
    user_id: i32,
    recipe_id: i32,
) -> Result<recipe::Model, AppError>
where
    E: BookmarkTable,
    E::Model: IntoActiveModel<E::Row>,
{
    let recipe = recipe::Entity::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found.".to_string()))?;

    if is_present::<E>(db, user_id, recipe_id).await? {
        return Err(AppError::BadRequest(E::ALREADY_ADDED.to_string()));
    }

    E::insert(E::new_row(user_id, recipe_id))
        .exec_without_returning(db)
        .await?;
    info!(user_id, recipe_id, kind = E::KIND, "Bookmarked recipe.");
    Ok(recipe)
}

/// Removes `recipe_id` from the user's set. Removing an absent pair is a 400.
pub async fn remove_bookmark<E: BookmarkTable>(
    db: &DatabaseConnection,
    user_id: i32,
    recipe_id: i32,
) -> Result<(), AppError> {
    recipe::Entity::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found.".to_string()))?;

    if !is_present::<E>(db, user_id, recipe_id).await? {
        return Err(AppError::BadRequest(E::NOT_PRESENT.to_string()));
    }

    E::delete_many()
        .filter(E::user_id_column().eq(user_id))
        .filter(E::recipe_id_column().eq(recipe_id))
        .exec(db)
        .await?;
    info!(user_id, recipe_id, kind = E::KIND, "Removed bookmark.");
    Ok(())
}
