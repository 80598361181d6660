use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use tracing::info;

use crate::db::entities::{ingredient, tag};
use crate::web::error::AppError;
use crate::web::models::catalog_models::{CreateIngredientRequest, CreateTagRequest};

// --- Tags ---

pub async fn list_tags(db: &DatabaseConnection) -> Result<Vec<tag::Model>, DbErr> {
    tag::Entity::find()
        .order_by_asc(tag::Column::Name)
        .all(db)
        .await
}

pub async fn get_tag(db: &DatabaseConnection, tag_id: i32) -> Result<tag::Model, AppError> {
    tag::Entity::find_by_id(tag_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Tag not found.".to_string()))
}

/// Creates a tag. Name, color and slug must each be unused.
pub async fn create_tag(
    db: &DatabaseConnection,
    req: CreateTagRequest,
) -> Result<tag::Model, AppError> {
    let clashes = tag::Entity::find()
        .filter(
            Condition::any()
                .add(tag::Column::Name.eq(&req.name))
                .add(tag::Column::Color.eq(&req.color))
                .add(tag::Column::Slug.eq(&req.slug)),
        )
        .all(db)
        .await?;
    if let Some(existing) = clashes.first() {
        let field = if existing.name == req.name {
            "name"
        } else if existing.color == req.color {
            "color"
        } else {
            "slug"
        };
        return Err(AppError::conflict(
            field,
            format!("Tag with this {field} already exists."),
        ));
    }

    let created = tag::ActiveModel {
        name: Set(req.name),
        color: Set(req.color),
        slug: Set(req.slug),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(tag_id = created.id, slug = %created.slug, "Created tag.");
    Ok(created)
}

// --- Ingredients ---

/// Escapes `%`, `_` and `\` so user input is matched literally inside LIKE.
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Casings of `prefix` matched verbatim alongside `lower(name)`. SQLite only
/// folds ASCII in `lower()`, so Cyrillic names need the common casings spelled out.
fn prefix_casings(prefix: &str) -> Vec<String> {
    let lower = prefix.to_lowercase();
    let mut chars = lower.chars();
    let capitalized = chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect::<String>())
        .unwrap_or_default();

    let mut casings = Vec::with_capacity(4);
    for candidate in [lower.clone(), prefix.to_string(), capitalized, prefix.to_uppercase()] {
        if !casings.contains(&candidate) {
            casings.push(candidate);
        }
    }
    casings
}

/// Lists ingredients ordered by name, optionally restricted to a case-insensitive name prefix.
pub async fn list_ingredients(
    db: &DatabaseConnection,
    name_prefix: Option<&str>,
) -> Result<Vec<ingredient::Model>, DbErr> {
    let mut query = ingredient::Entity::find();
    if let Some(prefix) = name_prefix.map(str::trim).filter(|p| !p.is_empty()) {
        let lowered = format!("{}%", escape_like(&prefix.to_lowercase()));
        let mut condition = Condition::any().add(
            Expr::expr(Func::lower(Expr::col(ingredient::Column::Name)))
                .like(LikeExpr::new(lowered).escape('\\')),
        );
        for casing in prefix_casings(prefix) {
            let pattern = format!("{}%", escape_like(&casing));
            condition = condition.add(
                Expr::col(ingredient::Column::Name).like(LikeExpr::new(pattern).escape('\\')),
            );
        }
        query = query.filter(condition);
    }
    query
        .order_by_asc(ingredient::Column::Name)
        .order_by_asc(ingredient::Column::Id)
        .all(db)
        .await
}

pub async fn get_ingredient(
    db: &DatabaseConnection,
    ingredient_id: i32,
) -> Result<ingredient::Model, AppError> {
    ingredient::Entity::find_by_id(ingredient_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ingredient not found.".to_string()))
}

async fn find_ingredient<C>(
    db: &C,
    name: &str,
    measurement_unit: &str,
) -> Result<Option<ingredient::Model>, DbErr>
where
    C: sea_orm::ConnectionTrait,
{
    ingredient::Entity::find()
        .filter(ingredient::Column::Name.eq(name))
        .filter(ingredient::Column::MeasurementUnit.eq(measurement_unit))
        .one(db)
        .await
}

/// Creates an ingredient; the `(name, measurement_unit)` pair must be new.
pub async fn create_ingredient(
    db: &DatabaseConnection,
    req: CreateIngredientRequest,
) -> Result<ingredient::Model, AppError> {
    if find_ingredient(db, &req.name, &req.measurement_unit)
        .await?
        .is_some()
    {
        return Err(AppError::conflict(
            "name",
            "Ingredient with this name and measurement unit already exists.",
        ));
    }

    let created = ingredient::ActiveModel {
        name: Set(req.name),
        measurement_unit: Set(req.measurement_unit),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(created)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Bulk-loads `(name, measurement_unit)` rows in a single transaction.
/// Pairs that already exist, in the database or earlier in `rows`, are skipped.
pub async fn import_ingredients(
    db: &DatabaseConnection,
    rows: Vec<(String, String)>,
) -> Result<ImportSummary, DbErr> {
    let txn = db.begin().await?;
    let mut summary = ImportSummary::default();

    for (name, measurement_unit) in rows {
        if find_ingredient(&txn, &name, &measurement_unit)
            .await?
            .is_some()
        {
            summary.skipped += 1;
            continue;
        }
        ingredient::ActiveModel {
            name: Set(name),
            measurement_unit: Set(measurement_unit),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        summary.inserted += 1;
    }

    txn.commit().await?;
    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Ingredient import finished."
    );
    Ok(summary)
}
