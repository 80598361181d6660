use serde::{Deserialize, Serialize};

use crate::db::entities::{ingredient, tag};
use crate::web::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagRead {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<tag::Model> for TagRead {
    fn from(model: tag::Model) -> Self {
        TagRead {
            id: model.id,
            name: model.name,
            color: model.color,
            slug: model.slug,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientRead {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl From<ingredient::Model> for IngredientRead {
    fn from(model: ingredient::Model) -> Self {
        IngredientRead {
            id: model.id,
            name: model.name,
            measurement_unit: model.measurement_unit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub slug: String,
}

impl CreateTagRequest {
    pub fn validate(self) -> Result<Self, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name", "This field may not be blank."));
        }
        if name.chars().count() > 50 {
            return Err(AppError::validation(
                "name",
                "Ensure this field has no more than 50 characters.",
            ));
        }
        if !tag::COLOR_PATTERN.is_match(&self.color) {
            return Err(AppError::validation(
                "color",
                "Enter the value in the correct format",
            ));
        }
        if self.slug.chars().count() > 200 || !tag::SLUG_PATTERN.is_match(&self.slug) {
            return Err(AppError::validation(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            ));
        }
        Ok(CreateTagRequest { name, ..self })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateIngredientRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub measurement_unit: String,
}

impl CreateIngredientRequest {
    pub fn validate(self) -> Result<Self, AppError> {
        let name = self.name.trim().to_string();
        let measurement_unit = self.measurement_unit.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name", "This field may not be blank."));
        }
        if name.chars().count() > 200 {
            return Err(AppError::validation(
                "name",
                "Ensure this field has no more than 200 characters.",
            ));
        }
        if measurement_unit.is_empty() {
            return Err(AppError::validation(
                "measurement_unit",
                "This field may not be blank.",
            ));
        }
        if measurement_unit.chars().count() > 50 {
            return Err(AppError::validation(
                "measurement_unit",
                "Ensure this field has no more than 50 characters.",
            ));
        }
        Ok(CreateIngredientRequest {
            name,
            measurement_unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_request(color: &str, slug: &str) -> CreateTagRequest {
        CreateTagRequest {
            name: "Breakfast".to_string(),
            color: color.to_string(),
            slug: slug.to_string(),
        }
    }

    #[test]
    fn tag_read_mirrors_the_model() {
        let model = tag::Model {
            id: 3,
            name: "Breakfast".to_string(),
            color: "#E26C2D".to_string(),
            slug: "breakfast".to_string(),
        };
        let read = TagRead::from(model);
        let copy = read.clone();
        assert_eq!(copy, read);
        assert_eq!(copy.slug, "breakfast");
    }

    #[test]
    fn tag_color_must_be_hex() {
        assert!(tag_request("#E26C2D", "breakfast").validate().is_ok());
        assert!(tag_request("#abc", "breakfast").validate().is_ok());
        assert!(tag_request("E26C2D", "breakfast").validate().is_err());
        assert!(tag_request("#E26C2", "breakfast").validate().is_err());
        assert!(tag_request("#GGGGGG", "breakfast").validate().is_err());
    }

    #[test]
    fn tag_slug_is_checked() {
        assert!(tag_request("#fff", "lunch-2_x").validate().is_ok());
        assert!(tag_request("#fff", "with space").validate().is_err());
        assert!(tag_request("#fff", "").validate().is_err());
    }

    #[test]
    fn ingredient_fields_are_trimmed_and_required() {
        let ok = CreateIngredientRequest {
            name: "  salt ".to_string(),
            measurement_unit: "g".to_string(),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.name, "salt");

        let blank_unit = CreateIngredientRequest {
            name: "salt".to_string(),
            measurement_unit: " ".to_string(),
        };
        assert!(blank_unit.validate().is_err());
    }
}
