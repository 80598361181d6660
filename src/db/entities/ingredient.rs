use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reference ingredient. `(name, measurement_unit)` is unique together; see `db::schema`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingredients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ingredient_in_recipe::Entity")]
    IngredientInRecipe,
}

impl Related<super::ingredient_in_recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IngredientInRecipe.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
