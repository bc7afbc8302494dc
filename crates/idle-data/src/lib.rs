//! Data-driven configuration for `idle-core`.
//!
//! Reads entity, modifier, and universal property definitions from RON,
//! JSON, or TOML files and validates them into a
//! [`GameConfiguration`](idle_core::config::GameConfiguration).

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, load_configuration, load_configuration_with_hooks};
pub use schema::{EntityData, ExprData};
