//! Миграции схемы панели управления прокси.

pub use sea_orm_migration::prelude::*;

mod m001_create_servers;
mod m002_create_proxy_groups;
mod m003_create_proxies;
mod m004_create_mappings;
mod m005_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m001_create_servers::Migration),
            Box::new(m002_create_proxy_groups::Migration),
            Box::new(m003_create_proxies::Migration),
            Box::new(m004_create_mappings::Migration),
            Box::new(m005_create_audit_logs::Migration),
        ]
    }
}
