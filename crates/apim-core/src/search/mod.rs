//! Search criteria, sorting and paging types

pub mod criteria;
pub mod paging;

pub use criteria::{
    ApiCriteria, ApiFieldFilter, ApplicationCriteria, EventCriteria, SubscriptionCriteria,
};
pub use paging::{Order, Page, Pageable, Sortable};
