//! Row-mapping layer
//!
//! - [`column`]: per-field descriptors with encode/decode function pairs
//! - [`mapper`]: CRUD SQL and row mapping for one table
//! - [`collate`]: folding left-joined rows back into parents
//! - [`fragments`]: IN lists, paging and reserved-word escaping per dialect
//! - [`query`]: predicate accumulation for criteria searches
//! - [`children`]: junction tables for labels, groups, metadata
//! - [`ident`]: validated identifiers

pub mod children;
pub mod collate;
pub mod column;
pub mod fragments;
pub mod ident;
pub mod mapper;
pub mod query;

pub use children::ChildTable;
pub use collate::{collate, collate_rows, insert_non_null, push_non_null, put_non_null, Collator};
pub use column::{Column, SqlType};
pub use fragments::{in_clause, in_condition, to_snake_case, Dialect};
pub use ident::Ident;
pub use mapper::{TableMapper, TableMapperBuilder};
pub use query::{CmpOp, Predicate, QueryBuilder};
