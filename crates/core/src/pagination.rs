//! Page-number pagination shared by list endpoints.

use serde::Serialize;

/// A normalized `?page=&per_page=` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    /// Normalize raw query values.
    ///
    /// Pages start at 1. A `per_page` outside `1..=max` falls back to
    /// `default` rather than being clamped.
    pub fn normalize(page: Option<i64>, per_page: Option<i64>, default: i64, max: i64) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = match per_page {
            Some(n) if (1..=max).contains(&n) => n,
            _ => default,
        };
        Self { page, per_page }
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Slice an already ordered, in-memory collection.
    pub fn slice<T>(&self, items: Vec<T>) -> Paged<T> {
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.per_page as usize)
            .collect();
        Paged {
            items,
            pagination: Pagination::new(total, *self),
        }
    }
}

/// Pagination metadata returned next to a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub pages: i64,
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(total: i64, request: PageRequest) -> Self {
        let pages = if total == 0 {
            0
        } else {
            (total + request.per_page - 1) / request.per_page
        };
        Self {
            total,
            pages,
            page: request.page,
            per_page: request.per_page,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
