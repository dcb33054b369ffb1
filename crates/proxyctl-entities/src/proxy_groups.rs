//! Entity для таблицы proxy_groups.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "proxy_groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub description: String,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::proxies::Entity")]
    Proxies,
}

impl Related<super::proxies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proxies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
