//! Проверки входных данных до начала любой мутации.

use crate::error::AppError;
use proxyctl_entities::{ProxyHealth, ProxyType};

/// Обязательное текстовое поле: не пустое после обрезки пробелов.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{field} обязательно")));
    }
    Ok(())
}

/// Порт в диапазоне [1, 65535].
pub fn validate_port(port: i64) -> Result<u16, AppError> {
    match u16::try_from(port) {
        Ok(p) if p >= 1 => Ok(p),
        _ => Err(AppError::InvalidInput(format!(
            "Порт {port} вне диапазона 1..65535"
        ))),
    }
}

/// Непустой список портов назначения, каждый в [1, 65535]. Порядок сохраняется.
pub fn validate_dst_ports(ports: &[i64]) -> Result<Vec<u16>, AppError> {
    if ports.is_empty() {
        return Err(AppError::InvalidInput(
            "dst_ports не может быть пустым".into(),
        ));
    }
    ports.iter().map(|p| validate_port(*p)).collect()
}

pub fn parse_proxy_type(value: &str) -> Result<ProxyType, AppError> {
    value.parse().map_err(AppError::InvalidInput)
}

pub fn parse_health(value: &str) -> Result<ProxyHealth, AppError> {
    value.parse().map_err(AppError::InvalidInput)
}
