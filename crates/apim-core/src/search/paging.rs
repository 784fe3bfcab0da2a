use serde::{Deserialize, Serialize};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// Sort request; `field` may be camelCase or snake_case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sortable {
    pub field: String,
    pub order: Order,
}

impl Sortable {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Desc,
        }
    }
}

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub page_number: usize,
    pub page_size: usize,
}

impl Pageable {
    pub fn new(page_number: usize, page_size: usize) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    /// Index of the first element of this page
    pub fn from(&self) -> usize {
        self.page_number.saturating_mul(self.page_size)
    }
}

/// One page of results plus the size of the whole result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: usize,
    pub page_elements: usize,
    pub total_elements: usize,
}

impl<T> Page<T> {
    /// Slice an already materialised result
    ///
    /// Without a pageable the whole result is returned as page 0.
    pub fn from_items(items: Vec<T>, pageable: Option<&Pageable>) -> Self {
        let total_elements = items.len();
        match pageable {
            Some(p) => {
                let content: Vec<T> = items
                    .into_iter()
                    .skip(p.from())
                    .take(p.page_size)
                    .collect();
                Page {
                    page_elements: content.len(),
                    content,
                    page_number: p.page_number,
                    total_elements,
                }
            }
            None => Page {
                page_elements: total_elements,
                content: items,
                page_number: 0,
                total_elements,
            },
        }
    }
}
