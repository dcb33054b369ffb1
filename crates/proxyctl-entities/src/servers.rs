//! Entity для таблицы servers.

use sea_orm::entity::prelude::*;

/// Сохранённый статус агента сервера.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ServerStatus {
    #[sea_orm(string_value = "online")]
    Online,
    #[sea_orm(string_value = "offline")]
    Offline,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Online => "online",
            ServerStatus::Offline => "offline",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "servers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// Упорядоченный список тегов (JSON-массив строк)
    pub tags: Json,

    pub wan_iface: String,

    pub lan_iface: String,

    /// Время последнего успешного pull/ack агента
    pub last_seen_at: Option<ChronoDateTimeUtc>,

    pub status: ServerStatus,

    /// Статический токен агента. Не попадает ни в один ответ на чтение.
    #[sea_orm(unique)]
    pub agent_token: String,

    /// Версия конфигурации: меняется только атомарным инкрементом
    pub config_version: i64,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Теги в виде списка строк. Элементы не-строки пропускаются.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Закодировать теги в JSON-массив для колонки `tags`.
pub fn encode_tags(tags: &[String]) -> Json {
    Json::Array(tags.iter().cloned().map(Json::String).collect())
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::proxies::Entity")]
    Proxies,
    #[sea_orm(has_many = "super::mappings::Entity")]
    Mappings,
}

impl Related<super::proxies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proxies.def()
    }
}

impl Related<super::mappings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mappings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
