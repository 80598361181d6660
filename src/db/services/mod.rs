//! Data-access layer. Each sub-module owns the queries for one area of the
//! schema; handlers call these functions instead of touching entities directly.

use sea_orm::{DatabaseConnection, DbErr, EntityTrait, FromQueryResult, PaginatorTrait, Select};

pub mod bookmark_service;
pub mod catalog_service;
pub mod follow_service;
pub mod recipe_service;
pub mod shopping_list_service;
pub mod user_service;

/// Fetches one 1-based page of `select` together with the total row count.
/// A page past the end yields no rows.
pub async fn fetch_page<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    page: u64,
    page_size: u64,
) -> Result<(Vec<E::Model>, u64), DbErr>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync + 'static,
{
    let paginator = select.paginate(db, page_size);
    let total = paginator.num_items().await?;
    let index = page.saturating_sub(1);
    let past_end = index
        .checked_mul(page_size)
        .map_or(true, |offset| offset >= total);
    if past_end {
        return Ok((Vec::new(), total));
    }
    let rows = paginator.fetch_page(index).await?;
    Ok((rows, total))
}
