//! Миграция: создание таблицы mappings.

use crate::m001_create_servers::Servers;
use crate::m003_create_proxies::Proxies;
use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m004_create_mappings"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Mappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Mappings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Mappings::ServerId).integer().not_null())
                    .col(ColumnDef::new(Mappings::ClientCidr).string().not_null())
                    .col(ColumnDef::new(Mappings::DstPorts).json().not_null())
                    .col(
                        ColumnDef::new(Mappings::UpstreamProxyId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Mappings::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Mappings::Notes)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Mappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Mappings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // Каскадное удаление выполняется сервисом в транзакции
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mappings_server_id")
                            .from(Mappings::Table, Mappings::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mappings_upstream_proxy_id")
                            .from(Mappings::Table, Mappings::UpstreamProxyId)
                            .to(Proxies::Table, Proxies::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Mappings::Table)
                    .col(Mappings::ServerId)
                    .name("idx_mappings_server_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Mappings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Mappings {
    Table,
    Id,
    ServerId,
    ClientCidr,
    DstPorts,
    UpstreamProxyId,
    Enabled,
    Notes,
    CreatedAt,
    UpdatedAt,
}
