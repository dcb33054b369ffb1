pub mod audit_service;
pub mod group_service;
pub mod liveness_service;
pub mod mapping_service;
pub mod proxy_service;
pub mod server_service;
pub mod sync_service;
pub mod validation;
pub mod version_service;
