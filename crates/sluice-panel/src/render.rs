//! Presentation boundary: the reconciled data handed to whatever draws the panel.

use sluice_api_models::{HistoryItem, HistoryPreferences, QueueItem, StatusSummary};

use crate::mutation::{SingleAction, available_actions};
use crate::paginate::{PageMarker, page_range};
use crate::selection::{SelectAllState, SelectionStore};
use crate::view::ViewState;

/// One queue row annotated with selection and the actions its state allows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    /// The item as last polled.
    pub item: QueueItem,
    /// Whether the row is in the selection set.
    pub selected: bool,
    /// Single-item actions offered for the item's state.
    pub actions: Vec<SingleAction>,
}

/// Everything needed to draw the queue view.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage {
    /// Rows on the current page.
    pub rows: Vec<QueueRow>,
    /// Current 1-based page.
    pub page: usize,
    /// Page count for the filtered list.
    pub total_pages: usize,
    /// Item count for the filtered list.
    pub total_items: usize,
    /// Compact pagination control.
    pub page_range: Vec<PageMarker>,
    /// Active filter text.
    pub filter_text: String,
    /// Size of the selection set.
    pub selected_count: usize,
    /// Select-all checkbox state for the visible rows.
    pub select_all: SelectAllState,
}

impl QueuePage {
    /// Current page of `view`, annotated against `selection`.
    #[must_use]
    pub fn from_view(view: &ViewState<QueueItem>, selection: &SelectionStore) -> Self {
        let page = view.page();
        let select_all = selection.select_all_state(page.items.iter().map(|item| item.id.as_str()));
        let rows = page
            .items
            .into_iter()
            .map(|item| QueueRow {
                selected: selection.is_selected(&item.id),
                actions: available_actions(item.state),
                item,
            })
            .collect();
        Self {
            rows,
            page: page.page,
            total_pages: page.total_pages,
            total_items: page.total_items,
            page_range: page_range(page.page, page.total_pages),
            filter_text: view.filter_text().to_string(),
            selected_count: selection.count(),
            select_all,
        }
    }
}

/// Everything needed to draw the history view.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    /// Records on the current page.
    pub rows: Vec<HistoryItem>,
    /// Current 1-based page.
    pub page: usize,
    /// Page count for the filtered list.
    pub total_pages: usize,
    /// Record count for the filtered list.
    pub total_items: usize,
    /// Compact pagination control.
    pub page_range: Vec<PageMarker>,
    /// Active filter text.
    pub filter_text: String,
    /// Column and date display flags.
    pub display: HistoryPreferences,
}

impl HistoryPage {
    /// Current page of `view` with the given display flags.
    #[must_use]
    pub fn from_view(view: &ViewState<HistoryItem>, display: HistoryPreferences) -> Self {
        let page = view.page();
        Self {
            page_range: page_range(page.page, page.total_pages),
            rows: page.items,
            page: page.page,
            total_pages: page.total_pages,
            total_items: page.total_items,
            filter_text: view.filter_text().to_string(),
            display,
        }
    }
}

/// Receives reconciled view data.
///
/// Status is pushed on every successful poll. Queue pages are pushed only when the snapshot
/// fingerprint changes or the user changes filter, page, or selection.
pub trait ViewRenderer: Send + Sync {
    /// Draw the global status counters.
    fn render_status(&self, status: &StatusSummary);
    /// Draw the queue view.
    fn render_queue(&self, page: &QueuePage);
    /// Draw the history view.
    fn render_history(&self, page: &HistoryPage);
}
