//! Pagination types for list queries

use serde::{Deserialize, Serialize};

/// Items per page on every attraction list
pub const PAGE_SIZE: u32 = 10;

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: PAGE_SIZE,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Standard page of `PAGE_SIZE` items
    pub fn page(page: u32) -> Self {
        Self::new(page, PAGE_SIZE)
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        let per_page = i64::from(self.per_page);
        ((self.total + per_page - 1) / per_page) as u32
    }

    /// Check if there is a next page
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if there is a previous page
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// A page past the last one. Page 1 of an empty list is never out of range.
    pub fn is_out_of_range(&self) -> bool {
        self.page > 1 && self.page > self.total_pages()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of items in the current page
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            per_page: PAGE_SIZE,
        }
    }
}
