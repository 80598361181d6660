pub mod import_ingredients;
