//! Filtering, paging, and page-index markers shared by the queue and history views.

use sluice_api_models::{HistoryItem, QueueItem};

/// Number of page links shown without collapsing.
const MAX_UNCOLLAPSED_PAGES: usize = 7;

/// Anything with a display name that the text filter can match.
pub trait Named {
    /// Display name used for filtering.
    fn name(&self) -> &str;
}

impl Named for QueueItem {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for HistoryItem {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Keep the items whose name contains `text`, ignoring case. Blank text keeps everything.
#[must_use]
pub fn filter<T: Named + Clone>(items: &[T], text: &str) -> Vec<T> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| item.name().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Number of pages for `len` items, never less than one.
#[must_use]
pub const fn total_pages(len: usize, per_page: usize) -> usize {
    let per_page = if per_page == 0 { 1 } else { per_page };
    let pages = len.div_ceil(per_page);
    if pages == 0 { 1 } else { pages }
}

/// Clamp a 1-based page number into `[1, total_pages]`.
#[must_use]
pub const fn clamp_page(page: usize, total_pages: usize) -> usize {
    if page < 1 {
        1
    } else if page > total_pages {
        total_pages
    } else {
        page
    }
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// 1-based page number after clamping.
    pub page: usize,
    /// Page count for the whole list.
    pub total_pages: usize,
    /// Item count for the whole list.
    pub total_items: usize,
}

/// Slice out page `page` of `items`, clamping the page first.
#[must_use]
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_pages = total_pages(items.len(), per_page);
    let page = clamp_page(page, total_pages);
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(items.len());
    let slice = items.get(start..end).unwrap_or_default();
    Page {
        items: slice.to_vec(),
        page,
        total_pages,
        total_items: items.len(),
    }
}

/// Entry in a compact pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    /// Link to a 1-based page.
    Page(usize),
    /// Collapsed run of pages.
    Ellipsis,
}

/// Compact list of page links around `current`.
///
/// Up to seven pages are listed in full. Beyond that the first and last pages are always
/// shown, with the neighbours of `current` in between and ellipses for the collapsed runs.
#[must_use]
pub fn page_range(current: usize, total: usize) -> Vec<PageMarker> {
    if total <= MAX_UNCOLLAPSED_PAGES {
        return (1..=total).map(PageMarker::Page).collect();
    }
    let mut markers = vec![PageMarker::Page(1)];
    if current > 3 {
        markers.push(PageMarker::Ellipsis);
    }
    let low = current.saturating_sub(1).max(2);
    let high = (current + 1).min(total - 1);
    markers.extend((low..=high).map(PageMarker::Page));
    if current + 2 < total {
        markers.push(PageMarker::Ellipsis);
    }
    markers.push(PageMarker::Page(total));
    markers
}
