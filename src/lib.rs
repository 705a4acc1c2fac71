//! Vocab Gateway: a configuration-driven gateway to arbitrary JSON chat-completion
//! services, with RSA-protected credential storage.
//!
//! This library crate exposes all modules for use by the RPC binary and integration tests.

pub mod app;
pub mod database;
pub mod logging;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
