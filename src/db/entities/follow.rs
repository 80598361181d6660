use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ConnectionTrait};

/// Directed subscription: `user_id` follows `author_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "follows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub author_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Follower,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Author,
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let (
            ActiveValue::Set(user_id) | ActiveValue::Unchanged(user_id),
            ActiveValue::Set(author_id) | ActiveValue::Unchanged(author_id),
        ) = (&self.user_id, &self.author_id)
        {
            if user_id == author_id {
                return Err(DbErr::Custom("a user cannot follow themselves".to_string()));
            }
        }
        Ok(self)
    }
}
