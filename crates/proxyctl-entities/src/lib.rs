//! Сущности SeaORM панели управления прокси.
//!
//! Модели намеренно не реализуют `Serialize`: секретные поля
//! (`agent_token`, `password`) наружу отдаются только через явные
//! представления сервера.

pub mod audit_logs;
pub mod mappings;
pub mod proxies;
pub mod proxy_groups;
pub mod servers;

pub use proxies::{ProxyHealth, ProxyType};
pub use servers::ServerStatus;
