//! Миграция: создание таблицы proxies.

use crate::m001_create_servers::Servers;
use crate::m002_create_proxy_groups::ProxyGroups;
use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m003_create_proxies"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Proxies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Proxies::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Proxies::ServerId).integer())
                    .col(ColumnDef::new(Proxies::GroupId).integer())
                    .col(ColumnDef::new(Proxies::Label).string().not_null())
                    .col(ColumnDef::new(Proxies::Type).string_len(16).not_null())
                    .col(ColumnDef::new(Proxies::Host).string().not_null())
                    .col(ColumnDef::new(Proxies::Port).integer().not_null())
                    .col(
                        ColumnDef::new(Proxies::Username)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Proxies::Password)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Proxies::Health)
                            .string_len(16)
                            .not_null()
                            .default("unknown"),
                    )
                    .col(
                        ColumnDef::new(Proxies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Proxies::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // Отвязка при удалении сервера выполняется сервисом в транзакции
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proxies_server_id")
                            .from(Proxies::Table, Proxies::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proxies_group_id")
                            .from(Proxies::Table, Proxies::GroupId)
                            .to(ProxyGroups::Table, ProxyGroups::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Proxies::Table)
                    .col(Proxies::ServerId)
                    .name("idx_proxies_server_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Proxies::Table)
                    .col(Proxies::GroupId)
                    .name("idx_proxies_group_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Proxies::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(crate) enum Proxies {
    Table,
    Id,
    ServerId,
    GroupId,
    Label,
    Type,
    Host,
    Port,
    Username,
    Password,
    Health,
    CreatedAt,
    UpdatedAt,
}
