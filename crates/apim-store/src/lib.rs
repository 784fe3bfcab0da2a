//! APIM Store - SQLite persistence for the management entities
//!
//! Provides:
//! - Connection management and TOML/env configuration
//! - Embedded, checksummed schema migrations
//! - A small row-mapping layer: column descriptors, a table mapper, a
//!   row collator for one-to-many joins, and SQL fragment/query builders
//! - Repositories for APIs, applications, subscriptions and events

pub mod config;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod orm;
pub mod repo;

// Re-export key types
pub use config::StoreConfig;
pub use errors::Result;
pub use orm::Dialect;
