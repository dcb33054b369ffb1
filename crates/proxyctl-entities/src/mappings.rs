//! Entity для таблицы mappings.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub server_id: i32,

    /// CIDR клиентов; синтаксис не проверяется
    pub client_cidr: String,

    /// Порты назначения (JSON-массив целых)
    pub dst_ports: Json,

    /// Upstream-прокси, обязан принадлежать тому же серверу
    pub upstream_proxy_id: i32,

    pub enabled: bool,

    pub notes: String,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Порты назначения списком. Значения вне u16 пропускаются.
    pub fn port_list(&self) -> Vec<u16> {
        self.dst_ports
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_u64())
                    .filter_map(|p| u16::try_from(p).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Закодировать порты в JSON-массив для колонки `dst_ports`.
pub fn encode_ports(ports: &[u16]) -> Json {
    Json::Array(ports.iter().map(|p| Json::from(*p)).collect())
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::servers::Entity",
        from = "Column::ServerId",
        to = "super::servers::Column::Id"
    )]
    Server,
    #[sea_orm(
        belongs_to = "super::proxies::Entity",
        from = "Column::UpstreamProxyId",
        to = "super::proxies::Column::Id"
    )]
    UpstreamProxy,
}

impl Related<super::servers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl Related<super::proxies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UpstreamProxy.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
