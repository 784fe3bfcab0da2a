//! APIM Core - domain model and shared facilities for the management store
//!
//! This crate provides:
//! - Management entities (APIs, applications, subscriptions, events) as plain records
//! - Search criteria and paging types consumed by the repositories
//! - The structured error facility (`RepoError`, `ApimError`)
//! - The structured logging facility and its test capture layer
//!
//! Nothing here touches a database; persistence lives in `apim-store`.

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod search;

pub use apim_core_types as core_types;

// Re-export commonly used types
pub use errors::{ApimError, RepoError, RepoErrorKind, Result};
pub use model::{Api, Application, Event, Subscription};
pub use search::{Order, Page, Pageable, Sortable};
