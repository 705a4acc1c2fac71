// Gateway managers
// Managers own persisted records: AI configurations and per-user secret profiles.

pub mod config_manager;
pub mod profile_manager;
