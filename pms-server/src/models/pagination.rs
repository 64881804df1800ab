//! Pagination types shared by every list endpoint

use serde::{Deserialize, Serialize};

/// Maximum items per page
const MAX_PER_PAGE: u32 = 100;

/// Default items per page
const DEFAULT_PER_PAGE: u32 = 20;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page (max 100)
    pub per_page: u32,
}

impl Pagination {
    /// Create pagination with validation.
    ///
    /// - Page is clamped to minimum of 1
    /// - Per page is clamped to 1..=100
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// SQL OFFSET value.
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    /// SQL LIMIT value.
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    /// Wrap a page of rows fetched with this pagination.
    pub fn wrap<T>(&self, items: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            items,
            total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: i64,
    /// Current page number
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl<T> Paginated<T> {
    /// Total number of pages (at least 1).
    pub fn total_pages(&self) -> u32 {
        if self.total <= 0 {
            1
        } else {
            let per_page = self.per_page.max(1) as i64;
            (((self.total + per_page - 1) / per_page) as u32).max(1)
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Convert the items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Query parameters for pagination
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of(total: i64, page: u32, per_page: u32) -> Paginated<()> {
        Paginated {
            items: vec![],
            total,
            page,
            per_page,
        }
    }

    #[test]
    fn offset_calculation() {
        assert_eq!(Pagination::new(1, 10).offset(), 0);
        assert_eq!(Pagination::new(2, 10).offset(), 10);
        assert_eq!(Pagination::new(3, 25).offset(), 50);
    }

    #[test]
    fn clamps_page_and_per_page() {
        assert_eq!(Pagination::new(0, 10).page, 1);
        assert_eq!(Pagination::new(1, 0).per_page, 1);
        assert_eq!(Pagination::new(1, 999).per_page, 100);
    }

    #[test]
    fn defaults_from_empty_params() {
        let page = Pagination::from(PaginationParams::default());
        assert_eq!(page, Pagination::new(1, 20));
    }

    #[test]
    fn total_pages() {
        assert_eq!(page_of(0, 1, 10).total_pages(), 1);
        assert_eq!(page_of(25, 1, 10).total_pages(), 3);
        assert_eq!(page_of(100, 1, 10).total_pages(), 10);
    }

    #[test]
    fn has_next_prev() {
        assert!(page_of(30, 1, 10).has_next());
        assert!(!page_of(30, 1, 10).has_prev());
        assert!(page_of(30, 2, 10).has_next());
        assert!(page_of(30, 2, 10).has_prev());
        assert!(!page_of(30, 3, 10).has_next());
    }

    #[test]
    fn map_keeps_metadata() {
        let mapped = Pagination::new(2, 5).wrap(vec![1, 2], 7).map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total, 7);
        assert_eq!(mapped.page, 2);
    }
}
