// Gateway services
// Services provide the call pipeline: path addressing, credential crypto, request/response mapping, transport, lifecycle and settings.

pub mod config_lifecycle;
pub mod crypto_service;
pub mod path_address;
pub mod request_materializer;
pub mod response_extractor;
pub mod settings_engine;
pub mod transport;
