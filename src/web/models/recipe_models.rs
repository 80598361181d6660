//! Wire shapes for recipes.
//!
//! Reads and writes are deliberately asymmetric: clients send tag ids and
//! `{id, amount}` pairs plus a base64 image, and get back nested tags,
//! ingredient line items and the author summary. `RecipeWriteRequest::validate`
//! turns the loose request into a `RecipeCommand`; `RecipeRead::from_details`
//! maps a loaded aggregate back onto the wire.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::entities::recipe;
use crate::db::services::recipe_service::RecipeDetails;
use crate::web::error::AppError;
use crate::web::models::catalog_models::TagRead;
use crate::web::models::user_models::UserRead;

const MAX_NAME_LEN: usize = 200;
const MAX_SMALL_INT: i64 = 32767;

/// One ingredient line of a recipe. `id` is the ingredient id, not the id of
/// the recipe/ingredient link row, so clients can send it straight back in a
/// write request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientLineRead {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeRead {
    pub id: i32,
    pub author: UserRead,
    pub tags: Vec<TagRead>,
    pub ingredients: Vec<IngredientLineRead>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeRead {
    pub fn from_details(details: RecipeDetails, media_url: &str) -> Self {
        let RecipeDetails {
            recipe,
            author,
            is_subscribed,
            tags,
            lines,
            is_favorited,
            is_in_shopping_cart,
        } = details;

        RecipeRead {
            id: recipe.id,
            author: UserRead::from_model(&author, is_subscribed),
            tags: tags.into_iter().map(TagRead::from).collect(),
            ingredients: lines
                .into_iter()
                .map(|(line, ingredient)| IngredientLineRead {
                    id: ingredient.id,
                    name: ingredient.name,
                    measurement_unit: ingredient.measurement_unit,
                    amount: line.amount,
                })
                .collect(),
            is_favorited,
            is_in_shopping_cart,
            name: recipe.name,
            image: format!("{media_url}{}", recipe.image),
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        }
    }
}

/// Compact recipe used by favorite/cart responses and subscription listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeShort {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeShort {
    pub fn from_model(model: &recipe::Model, media_url: &str) -> Self {
        RecipeShort {
            id: model.id,
            name: model.name.clone(),
            image: format!("{media_url}{}", model.image),
            cooking_time: model.cooking_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IngredientAmountRequest {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub amount: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeWriteRequest {
    #[serde(default)]
    pub tags: Option<Vec<i32>>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: i32,
    pub amount: i32,
}

/// A validated create/update. Scalar fields are `None` only for partial updates
/// that leave them untouched; tags and ingredients always replace the current sets.
#[derive(Debug, Clone)]
pub struct RecipeCommand {
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Vec<i32>,
    pub ingredients: Vec<IngredientAmount>,
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::validation(field, "This field is required."))
}

fn parse_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn validate_tags(tags: Option<Vec<i32>>) -> Result<Vec<i32>, AppError> {
    let tags = required("tags", tags)?;
    if tags.is_empty() {
        return Err(AppError::validation("tags", "No tags found"));
    }
    let unique: HashSet<i32> = tags.iter().copied().collect();
    if unique.len() != tags.len() {
        return Err(AppError::validation("tags", "Tag is not unique"));
    }
    Ok(tags)
}

pub fn validate_ingredients(
    ingredients: Option<Vec<IngredientAmountRequest>>,
) -> Result<Vec<IngredientAmount>, AppError> {
    let ingredients = required("ingredients", ingredients)?;
    if ingredients.is_empty() {
        return Err(AppError::validation("ingredients", "No ingredients found"));
    }

    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(ingredients.len());
    for item in ingredients {
        let ingredient_id = item
            .id
            .ok_or_else(|| AppError::validation("ingredients", "No ingredient ID found"))?;
        if !seen.insert(ingredient_id) {
            return Err(AppError::validation(
                "ingredients",
                "Ingredients cannot be repeated",
            ));
        }
        let raw_amount = item
            .amount
            .filter(|v| !v.is_null())
            .ok_or_else(|| AppError::validation("ingredients", "No ingredient quantity found"))?;
        // Amounts of exactly 1 are rejected here even though the column allows them.
        let amount = parse_amount(&raw_amount)
            .filter(|amount| *amount > 1)
            .ok_or_else(|| {
                AppError::validation("ingredients", "Qty value should be a number greater than 1")
            })?;
        if amount > MAX_SMALL_INT {
            return Err(AppError::validation(
                "ingredients",
                format!("Ensure this value is less than or equal to {MAX_SMALL_INT}."),
            ));
        }
        validated.push(IngredientAmount {
            ingredient_id,
            amount: amount as i32,
        });
    }
    Ok(validated)
}

fn validate_name(name: String) -> Result<String, AppError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name", "This field may not be blank."));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(
            "name",
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        ));
    }
    Ok(name)
}

fn validate_text(text: String) -> Result<String, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::validation("text", "This field may not be blank."));
    }
    Ok(text)
}

fn validate_cooking_time(minutes: i64) -> Result<i32, AppError> {
    if minutes < 1 {
        return Err(AppError::validation(
            "cooking_time",
            "Cooking time should be more than 0",
        ));
    }
    if minutes > MAX_SMALL_INT {
        return Err(AppError::validation(
            "cooking_time",
            format!("Ensure this value is less than or equal to {MAX_SMALL_INT}."),
        ));
    }
    Ok(minutes as i32)
}

impl RecipeWriteRequest {
    /// `partial` is set for PATCH: scalar fields and the image may then be omitted.
    pub fn validate(self, partial: bool) -> Result<RecipeCommand, AppError> {
        let tags = validate_tags(self.tags)?;
        let ingredients = validate_ingredients(self.ingredients)?;

        let (name, text, cooking_time, image) = if partial {
            (self.name, self.text, self.cooking_time, self.image)
        } else {
            (
                Some(required("name", self.name)?),
                Some(required("text", self.text)?),
                Some(required("cooking_time", self.cooking_time)?),
                Some(required("image", self.image)?),
            )
        };

        Ok(RecipeCommand {
            name: name.map(validate_name).transpose()?,
            text: text.map(validate_text).transpose()?,
            image,
            cooking_time: cooking_time.map(validate_cooking_time).transpose()?,
            tags,
            ingredients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(ingredients: Value) -> RecipeWriteRequest {
        serde_json::from_value(json!({
            "tags": [1, 2],
            "ingredients": ingredients,
            "name": "Pancakes",
            "text": "Mix and fry.",
            "image": "data:image/png;base64,iVBORw0KGgo=",
            "cooking_time": 15
        }))
        .unwrap()
    }

    fn field_of(err: AppError) -> String {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn amount_of_one_is_rejected_and_two_accepted() {
        let err = request(json!([{"id": 1, "amount": 1}]))
            .validate(false)
            .unwrap_err();
        assert_eq!(field_of(err), "ingredients");

        let command = request(json!([{"id": 1, "amount": 2}]))
            .validate(false)
            .unwrap();
        assert_eq!(
            command.ingredients,
            vec![IngredientAmount {
                ingredient_id: 1,
                amount: 2
            }]
        );
    }

    #[test]
    fn ingredient_rules() {
        for bad in [
            json!([]),
            json!([{"amount": 5}]),
            json!([{"id": 1}]),
            json!([{"id": 1, "amount": null}]),
            json!([{"id": 1, "amount": "lots"}]),
            json!([{"id": 1, "amount": 2.5}]),
            json!([{"id": 1, "amount": 5}, {"id": 1, "amount": 7}]),
            json!([{"id": 1, "amount": 40000}]),
        ] {
            let err = request(bad.clone()).validate(false).unwrap_err();
            assert_eq!(field_of(err), "ingredients", "payload {bad} should fail");
        }

        let numeric_string = request(json!([{"id": 1, "amount": "3"}]))
            .validate(false)
            .unwrap();
        assert_eq!(numeric_string.ingredients[0].amount, 3);
    }

    #[test]
    fn tag_rules() {
        let mut empty = request(json!([{"id": 1, "amount": 2}]));
        empty.tags = Some(vec![]);
        assert_eq!(field_of(empty.validate(false).unwrap_err()), "tags");

        let mut repeated = request(json!([{"id": 1, "amount": 2}]));
        repeated.tags = Some(vec![3, 3]);
        assert_eq!(field_of(repeated.validate(false).unwrap_err()), "tags");

        let mut missing = request(json!([{"id": 1, "amount": 2}]));
        missing.tags = None;
        assert_eq!(field_of(missing.validate(true).unwrap_err()), "tags");
    }

    #[test]
    fn full_write_requires_scalars_but_patch_does_not() {
        let mut no_image = request(json!([{"id": 1, "amount": 2}]));
        no_image.image = None;
        assert_eq!(field_of(no_image.validate(false).unwrap_err()), "image");

        let mut patch = request(json!([{"id": 1, "amount": 2}]));
        patch.image = None;
        patch.name = None;
        patch.cooking_time = None;
        let command = patch.validate(true).unwrap();
        assert!(command.image.is_none());
        assert!(command.name.is_none());
        assert!(command.cooking_time.is_none());
        assert_eq!(command.text.as_deref(), Some("Mix and fry."));
    }

    #[test]
    fn cooking_time_must_be_positive() {
        let mut zero = request(json!([{"id": 1, "amount": 2}]));
        zero.cooking_time = Some(0);
        assert_eq!(field_of(zero.validate(false).unwrap_err()), "cooking_time");
    }
}
