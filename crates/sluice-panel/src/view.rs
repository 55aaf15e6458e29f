//! Per-view filter and paging state over a cached full list.

use crate::paginate::{Named, Page, clamp_page, filter, paginate, total_pages};

/// Filter text, page cursor, and the last full list for one view.
///
/// The cached list lets filter and page changes re-paginate without a fetch. The current
/// page is re-clamped after every change so it always points at an existing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<T> {
    filter_text: String,
    current_page: usize,
    per_page: usize,
    last_full_list: Vec<T>,
}

impl<T: Named + Clone> ViewState<T> {
    /// Empty view on page one.
    #[must_use]
    pub fn new(per_page: usize) -> Self {
        Self {
            filter_text: String::new(),
            current_page: 1,
            per_page: per_page.max(1),
            last_full_list: Vec::new(),
        }
    }

    /// Active filter text.
    #[must_use]
    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    /// Current 1-based page.
    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    /// Rows per page.
    #[must_use]
    pub const fn per_page(&self) -> usize {
        self.per_page
    }

    /// Unfiltered list from the last fetch.
    #[must_use]
    pub fn full_list(&self) -> &[T] {
        &self.last_full_list
    }

    /// Replace the cached list with a fresh snapshot.
    pub fn replace_list(&mut self, items: Vec<T>) {
        self.last_full_list = items;
        self.clamp();
    }

    /// Change the filter text.
    pub fn set_filter(&mut self, text: &str) {
        text.clone_into(&mut self.filter_text);
        self.clamp();
    }

    /// Move to `page`, clamped into range.
    pub fn set_page(&mut self, page: usize) {
        self.current_page = page;
        self.clamp();
    }

    /// Change the page size.
    pub fn set_per_page(&mut self, per_page: usize) {
        self.per_page = per_page.max(1);
        self.clamp();
    }

    /// Items that pass the filter, in list order.
    #[must_use]
    pub fn filtered(&self) -> Vec<T> {
        filter(&self.last_full_list, &self.filter_text)
    }

    /// Current page of the filtered list.
    #[must_use]
    pub fn page(&self) -> Page<T> {
        paginate(&self.filtered(), self.current_page, self.per_page)
    }

    fn clamp(&mut self) {
        let pages = total_pages(self.filtered().len(), self.per_page);
        self.current_page = clamp_page(self.current_page, pages);
    }
}
