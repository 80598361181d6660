use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::entities::user;
use crate::web::error::AppError;
use crate::web::models::recipe_models::RecipeShort;

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));

const MAX_FIELD_LEN: usize = 200;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// A registration request that passed field validation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    let value = value
        .map(|v| v.trim().to_string())
        .ok_or_else(|| AppError::validation(field, "This field is required."))?;
    if value.is_empty() {
        return Err(AppError::validation(field, "This field may not be blank."));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(AppError::validation(
            field,
            format!("Ensure this field has no more than {MAX_FIELD_LEN} characters."),
        ));
    }
    Ok(value)
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewUser, AppError> {
        let email = required("email", self.email)?;
        if !looks_like_email(&email) {
            return Err(AppError::validation("email", "Enter a valid email address."));
        }
        let username = required("username", self.username)?;
        if !USERNAME_PATTERN.is_match(&username) {
            return Err(AppError::validation(
                "username",
                "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
            ));
        }
        let first_name = required("first_name", self.first_name)?;
        let last_name = required("last_name", self.last_name)?;
        let password = self
            .password
            .ok_or_else(|| AppError::validation("password", "This field is required."))?;
        validate_password(&password, "password")?;

        Ok(NewUser {
            email,
            username,
            first_name,
            last_name,
            password,
        })
    }
}

pub fn validate_password(password: &str, field: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            field,
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    if password.chars().count() > MAX_FIELD_LEN {
        return Err(AppError::validation(
            field,
            format!("Ensure this field has no more than {MAX_FIELD_LEN} characters."),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub current_password: String,
}

/// Response to a successful registration; never carries the password.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCreated {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<user::Model> for UserCreated {
    fn from(model: user::Model) -> Self {
        UserCreated {
            email: model.email,
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRead {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserRead {
    pub fn from_model(model: &user::Model, is_subscribed: bool) -> Self {
        UserRead {
            email: model.email.clone(),
            id: model.id,
            username: model.username.clone(),
            first_name: model.first_name.clone(),
            last_name: model.last_name.clone(),
            is_subscribed,
        }
    }
}

/// An author as seen from the subscriptions endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionRead {
    #[serde(flatten)]
    pub author: UserRead,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            email: Some("cook@example.com".to_string()),
            username: Some("cook".to_string()),
            first_name: Some("Anna".to_string()),
            last_name: Some("Smith".to_string()),
            password: Some("s3cret-pass".to_string()),
        }
    }

    #[test]
    fn accepts_complete_registration() {
        let user = request().validate().unwrap();
        assert_eq!(user.email, "cook@example.com");
        assert_eq!(user.username, "cook");
    }

    #[test]
    fn rejects_missing_or_blank_fields() {
        let mut missing_email = request();
        missing_email.email = None;
        assert!(matches!(
            missing_email.validate(),
            Err(AppError::Validation { ref field, .. }) if field == "email"
        ));

        let mut blank_name = request();
        blank_name.first_name = Some("   ".to_string());
        assert!(matches!(
            blank_name.validate(),
            Err(AppError::Validation { ref field, .. }) if field == "first_name"
        ));
    }

    #[test]
    fn rejects_bad_email_username_and_short_password() {
        let mut bad_email = request();
        bad_email.email = Some("not-an-email".to_string());
        assert!(bad_email.validate().is_err());

        let mut bad_username = request();
        bad_username.username = Some("has space".to_string());
        assert!(bad_username.validate().is_err());

        let mut short_password = request();
        short_password.password = Some("short".to_string());
        assert!(matches!(
            short_password.validate(),
            Err(AppError::Validation { ref field, .. }) if field == "password"
        ));
    }

    #[test]
    fn subscription_shape_is_flat() {
        let read = SubscriptionRead {
            author: UserRead {
                email: "a@b.c".to_string(),
                id: 3,
                username: "a".to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                is_subscribed: true,
            },
            recipes: vec![],
            recipes_count: 0,
        };
        let value = serde_json::to_value(&read).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["is_subscribed"], true);
        assert_eq!(value["recipes_count"], 0);
    }
}
