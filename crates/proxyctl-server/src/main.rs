//! Точка входа панели управления прокси.

use clap::Parser;
use proxyctl_server::config::{hash_password, ServerConfig, TlsMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "proxyctl-server",
    about = "Панель управления прокси: реестр и синхронизация конфигурации агентов"
)]
struct Cli {
    /// Адрес для прослушивания (host:port)
    #[arg(long, default_value = "0.0.0.0:8082")]
    listen: String,

    /// URL базы данных (sqlite или postgres)
    #[arg(
        long,
        default_value = "sqlite:./proxyctl.db?mode=rwc",
        env = "DATABASE_URL"
    )]
    db_url: String,

    /// Режим TLS: none, self-signed, cert
    #[arg(long, default_value = "none")]
    tls_mode: String,

    /// Домен для SAN самоподписанного сертификата
    #[arg(long, default_value = "localhost")]
    domain: String,

    /// Путь к PEM-сертификату (режим cert)
    #[arg(long, default_value = "/etc/proxyctl/cert.pem")]
    tls_cert: String,

    /// Путь к PEM-ключу (режим cert)
    #[arg(long, default_value = "/etc/proxyctl/key.pem")]
    tls_key: String,

    /// Секрет JWT (случайный если не задан)
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Время жизни токена администратора, часов
    #[arg(long, default_value_t = 24)]
    jwt_ttl_hours: u64,

    /// Имя пользователя администратора
    #[arg(long, default_value = "admin")]
    admin_username: String,

    /// Пароль администратора
    #[arg(long, env = "ADMIN_PASSWORD")]
    admin_password: Option<String>,

    /// Сколько секунд после последнего pull/ack сервер считается активным
    #[arg(long, default_value_t = 300)]
    staleness_window_secs: u64,

    /// Лимит запросов агентов в минуту на IP
    #[arg(long, default_value_t = 120)]
    agent_rate_limit: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let tls_mode: TlsMode = cli
        .tls_mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    // JWT secret: из аргумента или случайный на время жизни процесса
    let jwt_secret = match cli.jwt_secret {
        Some(secret) => secret,
        None => {
            let mut buf = [0u8; 32];
            getrandom::fill(&mut buf)
                .map_err(|e| anyhow::anyhow!("Ошибка генерации JWT secret: {e}"))?;
            tracing::warn!("JWT_SECRET не задан: токены администратора не переживут перезапуск");
            hex::encode(buf)
        }
    };

    let admin_password = cli.admin_password.unwrap_or_else(|| {
        tracing::warn!("Пароль администратора не задан, используется 'admin' (небезопасно!)");
        "admin".to_string()
    });

    let config = ServerConfig {
        listen: cli.listen,
        db_url: cli.db_url,
        tls_mode,
        domain: cli.domain,
        tls_cert: cli.tls_cert,
        tls_key: cli.tls_key,
        jwt_secret,
        jwt_ttl_hours: cli.jwt_ttl_hours,
        admin_username: cli.admin_username,
        admin_password_hash: hash_password(&admin_password),
        staleness_window_secs: cli.staleness_window_secs,
        agent_rate_limit: cli.agent_rate_limit,
    };

    proxyctl_server::run(config).await
}
