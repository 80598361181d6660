use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::{Expr, JoinType};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use tera::{Context, Tera};

use crate::db::entities::{cart, ingredient, ingredient_in_recipe, recipe};
use crate::web::error::AppError;

const SHOPPING_LIST_TEMPLATE: &str = "{% for group in groups %}<h3>{{ group.recipe }}</h3><ul>\
{% for line in group.lines %}<li>{{ line.name }} ({{ line.measurement_unit }}) - {{ line.amount }}</li>\
{% endfor %}</ul>{% endfor %}<p>{{ footnote }}</p>";

const SHOPPING_LIST_FOOTNOTE: &str = "Amounts are totals for the whole cart. \
Each ingredient is listed once, under the first recipe that uses it.";

/// Per-recipe subtotal of one ingredient across the requester's cart.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct CartIngredientRow {
    pub recipe_name: String,
    pub ingredient_name: String,
    pub measurement_unit: String,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListGroup {
    pub recipe: String,
    pub lines: Vec<ShoppingListLine>,
}

pub async fn has_cart_items(db: &DatabaseConnection, user_id: i32) -> Result<bool, DbErr> {
    let count = cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Sums line-item amounts per (recipe, ingredient, unit) over the user's cart,
/// ordered by recipe name and then ingredient name.
pub async fn cart_ingredient_rows(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<CartIngredientRow>, DbErr> {
    ingredient_in_recipe::Entity::find()
        .select_only()
        .column_as(recipe::Column::Name, "recipe_name")
        .column_as(ingredient::Column::Name, "ingredient_name")
        .column_as(ingredient::Column::MeasurementUnit, "measurement_unit")
        .column_as(
            Expr::col((
                ingredient_in_recipe::Entity,
                ingredient_in_recipe::Column::Amount,
            ))
            .sum(),
            "total",
        )
        .join(
            JoinType::InnerJoin,
            ingredient_in_recipe::Relation::Ingredient.def(),
        )
        .join(
            JoinType::InnerJoin,
            ingredient_in_recipe::Relation::Recipe.def(),
        )
        .join(JoinType::InnerJoin, recipe::Relation::Cart.def())
        .filter(cart::Column::UserId.eq(user_id))
        .group_by(recipe::Column::Name)
        .group_by(ingredient::Column::Name)
        .group_by(ingredient::Column::MeasurementUnit)
        .order_by_asc(recipe::Column::Name)
        .order_by_asc(ingredient::Column::Name)
        .into_model::<CartIngredientRow>()
        .all(db)
        .await
}

/// Turns per-recipe subtotals into the printable list.
///
/// Every (ingredient, unit) pair is totalled across the whole cart and listed
/// once, under the alphabetically first recipe that uses it. Recipes left
/// without lines are omitted. `rows` must be ordered by recipe name.
pub fn build_shopping_list(rows: &[CartIngredientRow]) -> Vec<ShoppingListGroup> {
    let mut totals: HashMap<(&str, &str), i64> = HashMap::new();
    for row in rows {
        *totals
            .entry((row.ingredient_name.as_str(), row.measurement_unit.as_str()))
            .or_default() += row.total;
    }

    let mut listed: HashSet<(&str, &str)> = HashSet::new();
    let mut groups: Vec<ShoppingListGroup> = Vec::new();
    for row in rows {
        let key = (row.ingredient_name.as_str(), row.measurement_unit.as_str());
        if !listed.insert(key) {
            continue;
        }
        let line = ShoppingListLine {
            name: row.ingredient_name.clone(),
            measurement_unit: row.measurement_unit.clone(),
            amount: totals.get(&key).copied().unwrap_or(row.total),
        };
        match groups.last_mut() {
            Some(group) if group.recipe == row.recipe_name => group.lines.push(line),
            _ => groups.push(ShoppingListGroup {
                recipe: row.recipe_name.clone(),
                lines: vec![line],
            }),
        }
    }
    groups
}

/// Renders the groups as an HTML fragment. Names are HTML-escaped.
pub fn render_shopping_list(groups: &[ShoppingListGroup]) -> Result<String, AppError> {
    let mut context = Context::new();
    context.insert("groups", groups);
    context.insert("footnote", SHOPPING_LIST_FOOTNOTE);
    Tera::one_off(SHOPPING_LIST_TEMPLATE, &context, true).map_err(|e| {
        AppError::InternalServerError(format!("Failed to render shopping list: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(recipe: &str, name: &str, unit: &str, total: i64) -> CartIngredientRow {
        CartIngredientRow {
            recipe_name: recipe.to_string(),
            ingredient_name: name.to_string(),
            measurement_unit: unit.to_string(),
            total,
        }
    }

    #[test]
    fn shared_ingredient_is_totalled_once() {
        let rows = vec![
            row("Omelette", "Egg", "pcs", 3),
            row("Omelette", "Salt", "g", 5),
            row("Soup", "Salt", "g", 3),
            row("Soup", "Water", "ml", 500),
        ];
        let groups = build_shopping_list(&rows);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].recipe, "Omelette");
        assert_eq!(
            groups[0].lines[1],
            ShoppingListLine {
                name: "Salt".to_string(),
                measurement_unit: "g".to_string(),
                amount: 8,
            }
        );
        assert_eq!(groups[1].recipe, "Soup");
        assert_eq!(groups[1].lines.len(), 1);
        assert_eq!(groups[1].lines[0].name, "Water");

        let html = render_shopping_list(&groups).unwrap();
        assert_eq!(html.matches("Salt (g) - 8").count(), 1);
        assert!(html.starts_with("<h3>Omelette</h3><ul><li>Egg (pcs) - 3</li>"));
        assert!(html.ends_with(&format!("<p>{SHOPPING_LIST_FOOTNOTE}</p>")));
    }

    #[test]
    fn same_name_with_other_unit_is_separate() {
        let rows = vec![row("A", "Sugar", "g", 10), row("B", "Sugar", "tbsp", 2)];
        let groups = build_shopping_list(&rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].lines[0].amount, 2);
    }

    #[test]
    fn names_are_escaped() {
        let groups = build_shopping_list(&[row("<b>Pie</b>", "Flour & oats", "g", 100)]);
        let html = render_shopping_list(&groups).unwrap();
        assert!(html.contains("&lt;b&gt;Pie&lt;&#x2F;b&gt;"));
        assert!(html.contains("Flour &amp; oats (g) - 100"));
    }
}
