use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::db::entities::{
    auth_token, cart, favorite, follow, ingredient, ingredient_in_recipe, recipe, recipe_tag, tag,
    user,
};

fn table<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    schema.create_table_from_entity(entity).if_not_exists().to_owned()
}

fn ingredient_name_unit_index() -> IndexCreateStatement {
    Index::create()
        .name("ingredients_name_measurement_unit_key")
        .table(ingredient::Entity)
        .col(ingredient::Column::Name)
        .col(ingredient::Column::MeasurementUnit)
        .unique()
        .if_not_exists()
        .to_owned()
}

/// Creates every table that does not exist yet. Referenced tables come first so
/// foreign keys resolve on backends that check them at creation time.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        table(&schema, user::Entity),
        table(&schema, tag::Entity),
        table(&schema, ingredient::Entity),
        table(&schema, recipe::Entity),
        table(&schema, recipe_tag::Entity),
        table(&schema, ingredient_in_recipe::Entity),
        table(&schema, cart::Entity),
        table(&schema, favorite::Entity),
        table(&schema, follow::Entity),
        table(&schema, auth_token::Entity),
    ];

    for statement in tables.iter() {
        db.execute(backend.build(statement)).await?;
    }
    db.execute(backend.build(&ingredient_name_unit_index())).await?;

    info!(tables = tables.len(), "Database schema is up to date.");
    Ok(())
}
