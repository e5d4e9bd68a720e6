//! Page bookkeeping for the file list.
//!
//! Pages are 1-indexed, matching the backend's `page` query parameter.

use serde::{Deserialize, Serialize};

/// Which page to request and how large pages are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// ```
    /// use core_files::PageRequest;
    ///
    /// let request = PageRequest::new(3, 20);
    /// assert_eq!(request.offset(), 40);
    /// ```
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Number of items before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: core_runtime::config::DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of the file table plus what the pager needs to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Backend order, newest upload first.
    pub items: Vec<T>,
    /// Files across all pages.
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    /// # Examples
    ///
    /// ```
    /// use core_files::{Page, PageRequest};
    ///
    /// let page = Page::new(vec!["a"; 20], 45, PageRequest::new(1, 20));
    /// assert_eq!(page.total_pages, 3);
    /// assert!(page.has_next());
    /// assert!(!page.has_previous());
    /// ```
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total.div_ceil(u64::from(request.page_size)) as u32
        };

        Self {
            items,
            total,
            page: request.page,
            total_pages,
            page_size: request.page_size,
        }
    }

    /// A page with nothing in it, as shown before the first fetch.
    pub fn empty(page_size: u32) -> Self {
        Self::new(Vec::new(), 0, PageRequest::new(1, page_size))
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
            page_size: self.page_size,
        }
    }
}
