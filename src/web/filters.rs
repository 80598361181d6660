use sea_orm::sea_query::{Expr, Query};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};
use serde::Deserialize;

use crate::db::entities::{cart, favorite, recipe, recipe_tag, tag};
use crate::web::error::AppError;

/// Query parameters accepted by the recipe list. `tags` may repeat.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeFilterParams {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub is_favorited: Option<String>,
    #[serde(default)]
    pub is_in_shopping_cart: Option<String>,
}

/// The parsed form of [`RecipeFilterParams`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tag_slugs: Vec<String>,
    pub author_id: Option<i32>,
    pub favorited_only: bool,
    pub in_cart_only: bool,
}

fn parse_flag(field: &str, raw: Option<&str>) -> Result<bool, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(false),
        Some("1") | Some("true") | Some("True") => Ok(true),
        Some("0") | Some("false") | Some("False") => Ok(false),
        Some(_) => Err(AppError::validation(field, "Enter a valid boolean.")),
    }
}

impl RecipeFilterParams {
    pub fn parse(self) -> Result<RecipeFilter, AppError> {
        let author_id = match self.author.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                AppError::validation(
                    "author",
                    "Select a valid choice. That choice is not one of the available choices.",
                )
            })?),
        };
        Ok(RecipeFilter {
            tag_slugs: self
                .tags
                .into_iter()
                .map(|slug| slug.trim().to_string())
                .filter(|slug| !slug.is_empty())
                .collect(),
            author_id,
            favorited_only: parse_flag("is_favorited", self.is_favorited.as_deref())?,
            in_cart_only: parse_flag("is_in_shopping_cart", self.is_in_shopping_cart.as_deref())?,
        })
    }
}

impl RecipeFilter {
    /// Narrows `select`. Bookmark flags only apply to an authenticated requester.
    pub fn apply(
        &self,
        mut select: Select<recipe::Entity>,
        requester_id: Option<i32>,
    ) -> Select<recipe::Entity> {
        if !self.tag_slugs.is_empty() {
            select = select.filter(
                recipe::Column::Id.in_subquery(
                    Query::select()
                        .column((recipe_tag::Entity, recipe_tag::Column::RecipeId))
                        .from(recipe_tag::Entity)
                        .inner_join(
                            tag::Entity,
                            Expr::col((tag::Entity, tag::Column::Id))
                                .equals((recipe_tag::Entity, recipe_tag::Column::TagId)),
                        )
                        .and_where(
                            Expr::col((tag::Entity, tag::Column::Slug))
                                .is_in(self.tag_slugs.clone()),
                        )
                        .to_owned(),
                ),
            );
        }
        if let Some(author_id) = self.author_id {
            select = select.filter(recipe::Column::AuthorId.eq(author_id));
        }
        if let Some(user_id) = requester_id {
            if self.favorited_only {
                select = select.filter(
                    recipe::Column::Id.in_subquery(
                        Query::select()
                            .column(favorite::Column::RecipeId)
                            .from(favorite::Entity)
                            .and_where(favorite::Column::UserId.eq(user_id))
                            .to_owned(),
                    ),
                );
            }
            if self.in_cart_only {
                select = select.filter(
                    recipe::Column::Id.in_subquery(
                        Query::select()
                            .column(cart::Column::RecipeId)
                            .from(cart::Entity)
                            .and_where(cart::Column::UserId.eq(user_id))
                            .to_owned(),
                    ),
                );
            }
        }
        select
    }
}

/// Builds the filtered recipe query for one requester.
pub fn recipe_query(filter: &RecipeFilter, requester_id: Option<i32>) -> Select<recipe::Entity> {
    filter.apply(recipe::Entity::find(), requester_id)
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientFilterParams {
    #[serde(default)]
    pub name: Option<String>,
}
