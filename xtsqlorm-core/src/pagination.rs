//! Pagination types

use serde::{Deserialize, Serialize};

/// Default items per page
const DEFAULT_PER_PAGE: u64 = 20;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u64,
    /// Items per page
    pub per_page: u64,
}

impl Pagination {
    /// Create pagination with validation.
    ///
    /// - Page is clamped to minimum of 1
    /// - Per page is clamped to minimum of 1
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Calculate SQL OFFSET value.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Get LIMIT value.
    pub fn limit(&self) -> u64 {
        self.per_page
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

/// One page of results plus the total under the same filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: u64,
    /// Current page number
    pub page: u64,
    /// Items per page
    pub per_page: u64,
}

impl<T> Paginated<T> {
    /// Calculate total number of pages.
    pub fn total_pages(&self) -> u64 {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.per_page).max(1)
        }
    }

    /// Check if there's a next page.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if there's a previous page.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Split into `(items, total)`
    pub fn into_parts(self) -> (Vec<T>, u64) {
        (self.items, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(total: u64, page: u64, per_page: u64) -> Paginated<()> {
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
    fn clamps_page_and_size() {
        let p = Pagination::new(0, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 1);

        // Large pages are allowed
        assert_eq!(Pagination::new(1, 999).limit(), 999);
    }

    #[test]
    fn total_pages() {
        assert_eq!(page(0, 1, 10).total_pages(), 1);
        assert_eq!(page(25, 1, 10).total_pages(), 3);
        assert_eq!(page(100, 1, 10).total_pages(), 10);
    }

    #[test]
    fn has_next_prev() {
        assert!(page(30, 1, 10).has_next());
        assert!(!page(30, 1, 10).has_prev());
        assert!(page(30, 2, 10).has_next());
        assert!(page(30, 2, 10).has_prev());
        assert!(!page(30, 3, 10).has_next());
        assert!(page(30, 3, 10).has_prev());
    }
}
