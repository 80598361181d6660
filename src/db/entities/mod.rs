//! SeaORM entities for the recipe tables.
//!
//! Each table lives in its own module. Link tables (`recipe_tags`, `carts`,
//! `favorites`, `follows`) use composite primary keys so the database rejects
//! duplicate pairs on its own.

pub mod auth_token;
pub mod cart;
pub mod favorite;
pub mod follow;
pub mod ingredient;
pub mod ingredient_in_recipe;
pub mod recipe;
pub mod recipe_tag;
pub mod tag;
pub mod user;

pub mod prelude {
    pub use super::auth_token::Entity as AuthToken;
    pub use super::cart::Entity as Cart;
    pub use super::favorite::Entity as Favorite;
    pub use super::follow::Entity as Follow;
    pub use super::ingredient::Entity as Ingredient;
    pub use super::ingredient_in_recipe::Entity as IngredientInRecipe;
    pub use super::recipe::Entity as Recipe;
    pub use super::recipe_tag::Entity as RecipeTag;
    pub use super::tag::Entity as Tag;
    pub use super::user::Entity as User;
}
