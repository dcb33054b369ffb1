//! Панель управления прокси: реестр серверов, прокси и маппингов
//! и протокол синхронизации конфигурации с агентами.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod tls;
pub mod views;

#[cfg(test)]
mod tests;

use api::AppState;
use config::ServerConfig;
use proxyctl_migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::watch;
use tracing::info;

/// Окно rate limiter'а агентов.
const AGENT_RATE_WINDOW_SECS: u64 = 60;

/// Верхняя граница окна активности: 30 дней.
const MAX_STALENESS_SECS: u64 = 30 * 24 * 3600;

/// Подключиться к БД и применить миграции.
pub async fn connect(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("Подключение к базе данных: {db_url}");
    let db = Database::connect(db_url).await?;

    info!("Выполнение миграций...");
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Собрать состояние приложения из конфигурации.
pub fn app_state(config: &ServerConfig, db: DatabaseConnection) -> AppState {
    AppState {
        db,
        jwt_secret: config.jwt_secret.clone(),
        jwt_ttl_hours: config.jwt_ttl_hours,
        admin_username: config.admin_username.clone(),
        admin_password_hash: config.admin_password_hash.clone(),
        staleness_window: chrono::Duration::seconds(
            config.staleness_window_secs.min(MAX_STALENESS_SECS) as i64,
        ),
        rate_limiter: api::rate_limit::RateLimiter::new(
            config.agent_rate_limit,
            AGENT_RATE_WINDOW_SECS,
        ),
    }
}

/// Запустить панель управления.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let db = connect(&config.db_url).await?;
    let app = api::build_router(app_state(&config, db));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Получен сигнал завершения, останавливаю сервер...");
        let _ = shutdown_tx.send(true);
    });

    info!(
        "Панель управления запущена (окно активности: {} с, лимит агентов: {}/мин)",
        config.staleness_window_secs, config.agent_rate_limit
    );
    tls::serve(&config, app, shutdown_rx).await?;

    info!("Панель управления остановлена");
    Ok(())
}
