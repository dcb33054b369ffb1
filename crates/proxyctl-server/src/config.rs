//! Конфигурация запуска и хэширование пароля администратора.

/// Параметры запуска, собранные из CLI и переменных окружения.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,

    /// `sqlite:...` или `postgres://...`; миграции применяются при старте
    pub db_url: String,

    pub tls_mode: TlsMode,

    /// SAN самоподписанного сертификата
    pub domain: String,

    /// PEM-файлы для `TlsMode::Cert`, перечитываются раз в 12 часов
    pub tls_cert: String,
    pub tls_key: String,

    pub jwt_secret: String,
    pub jwt_ttl_hours: u64,

    pub admin_username: String,

    /// SHA-256 hex; открытый пароль в конфигурации не хранится
    pub admin_password_hash: String,

    /// Сервер без pull/ack дольше этого окна считается неактивным в сводке
    pub staleness_window_secs: u64,

    /// Запросов в минуту с одного IP на маршрутах агентов
    pub agent_rate_limit: u32,
}

/// Как принимать соединения: без TLS, с самоподписанным сертификатом
/// или с PEM-файлами с диска.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    None,
    SelfSigned,
    Cert,
}

impl std::str::FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TlsMode::None),
            "self-signed" | "selfsigned" => Ok(TlsMode::SelfSigned),
            "cert" => Ok(TlsMode::Cert),
            other => Err(format!(
                "Неизвестный режим TLS: {other}. Допустимые: none, self-signed, cert"
            )),
        }
    }
}

impl std::fmt::Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsMode::None => write!(f, "none"),
            TlsMode::SelfSigned => write!(f, "self-signed"),
            TlsMode::Cert => write!(f, "cert"),
        }
    }
}

/// SHA-256 от пароля в hex.
pub fn hash_password(password: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(password.as_bytes());
    hex::encode(hash)
}

/// Сравнение с хэшем за постоянное время.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use subtle::ConstantTimeEq;
    hash_password(password).as_bytes().ct_eq(hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_mode_round_trips_through_cli_text() {
        for mode in [TlsMode::None, TlsMode::SelfSigned, TlsMode::Cert] {
            assert_eq!(mode.to_string().parse::<TlsMode>().unwrap(), mode);
        }
        assert_eq!("SelfSigned".parse::<TlsMode>().unwrap(), TlsMode::SelfSigned);
        assert!("acme".parse::<TlsMode>().is_err());
    }
}
