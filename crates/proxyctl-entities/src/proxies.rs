//! Entity для таблицы proxies.

use sea_orm::entity::prelude::*;
use std::str::FromStr;

/// Протокол upstream-прокси.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ProxyType {
    #[sea_orm(string_value = "http")]
    Http,
    #[sea_orm(string_value = "https")]
    Https,
    #[sea_orm(string_value = "socks4")]
    Socks4,
    #[sea_orm(string_value = "socks5")]
    Socks5,
}

impl ProxyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Http => "http",
            ProxyType::Https => "https",
            ProxyType::Socks4 => "socks4",
            ProxyType::Socks5 => "socks5",
        }
    }
}

impl FromStr for ProxyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(ProxyType::Http),
            "https" => Ok(ProxyType::Https),
            "socks4" => Ok(ProxyType::Socks4),
            "socks5" => Ok(ProxyType::Socks5),
            other => Err(format!(
                "Неизвестный тип прокси: {other}. Допустимые: http, https, socks4, socks5"
            )),
        }
    }
}

/// Результат последней проверки доступности прокси.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ProxyHealth {
    #[sea_orm(string_value = "ok")]
    Ok,
    #[sea_orm(string_value = "fail")]
    Fail,
    #[sea_orm(string_value = "unknown")]
    Unknown,
}

impl ProxyHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyHealth::Ok => "ok",
            ProxyHealth::Fail => "fail",
            ProxyHealth::Unknown => "unknown",
        }
    }
}

impl FromStr for ProxyHealth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(ProxyHealth::Ok),
            "fail" => Ok(ProxyHealth::Fail),
            "unknown" => Ok(ProxyHealth::Unknown),
            other => Err(format!(
                "Неизвестный статус здоровья: {other}. Допустимые: ok, fail, unknown"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "proxies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Сервер-владелец, `None` если прокси не привязан
    pub server_id: Option<i32>,

    pub group_id: Option<i32>,

    pub label: String,

    #[sea_orm(column_name = "type")]
    pub proxy_type: ProxyType,

    pub host: String,

    pub port: i32,

    pub username: String,

    /// Секрет, отдаётся только агенту в payload pull
    pub password: String,

    pub health: ProxyHealth,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
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
        belongs_to = "super::proxy_groups::Entity",
        from = "Column::GroupId",
        to = "super::proxy_groups::Column::Id"
    )]
    Group,
    #[sea_orm(has_many = "super::mappings::Entity")]
    Mappings,
}

impl Related<super::servers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl Related<super::proxy_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::mappings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mappings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
