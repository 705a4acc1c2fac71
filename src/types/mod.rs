// Gateway shared type definitions
// Each submodule defines types used across the crate.

pub mod ai;
pub mod errors;
pub mod settings;
