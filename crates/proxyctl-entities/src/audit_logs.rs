//! Entity для таблицы audit_logs (только добавление).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Имя администратора или `agent:<server_id>`
    pub actor: String,

    pub action: String,

    /// Ресурс в виде `kind:id`
    pub resource: String,

    pub before: Option<Json>,

    pub after: Option<Json>,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
