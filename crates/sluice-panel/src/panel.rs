//! Panel controller: wires polling, reconciliation, selection, and mutations together.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use sluice_api_models::{
    DisplayPreferences, HistoryItem, HistoryResponse, PollResponse, QueueItem, StatusSummary,
};
use tracing::{debug, info, warn};

use crate::api::PanelApi;
use crate::error::ApiResult;
use crate::fingerprint::SnapshotDiffer;
use crate::mutation::{BulkAction, MutationCoordinator, MutationOutcome, Reconciler};
use crate::notify::Notifier;
use crate::preferences::{DisplayPreferencesManager, SaveOutcome};
use crate::render::{HistoryPage, QueuePage, ViewRenderer};
use crate::scheduler::{PollFn, PollScheduler, TimerFactory};
use crate::selection::{SelectAllState, SelectionStore};
use crate::transport::HttpTransport;
use crate::view::ViewState;

/// History records requested per poll unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Collaborators a panel is built from.
pub struct PanelDeps {
    /// HTTP client used for every backend call.
    pub transport: Arc<dyn HttpTransport>,
    /// Source of the poll timers.
    pub timers: Arc<dyn TimerFactory>,
    /// Receives mutation notices.
    pub notifier: Arc<dyn Notifier>,
    /// Receives reconciled view data.
    pub renderer: Arc<dyn ViewRenderer>,
}

/// Tunables that are not display preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// `limit` sent with every history poll.
    pub history_limit: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// What a refresh did with the response it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The snapshot was applied and the view re-rendered.
    Rendered,
    /// The snapshot was applied but matched what is already shown.
    Unchanged,
    /// A response to a newer request was applied first; this one was discarded.
    Stale,
    /// The request failed.
    Failed,
}

/// Mutation coordinator bound to a panel.
pub type PanelMutations = MutationCoordinator<PanelHandle>;

/// Queue and history panel over a download backend.
pub struct Panel {
    inner: Arc<PanelInner>,
    mutations: PanelMutations,
}

/// Reconciliation hooks of one panel, as seen by its mutation coordinator.
#[derive(Clone)]
pub struct PanelHandle {
    inner: Arc<PanelInner>,
}

struct PanelInner {
    api: PanelApi,
    prefs: DisplayPreferencesManager,
    renderer: Arc<dyn ViewRenderer>,
    config: PanelConfig,
    state: Mutex<PanelState>,
    scheduler: Mutex<PollScheduler>,
}

struct PanelState {
    differ: SnapshotDiffer,
    selection: SelectionStore,
    queue: ViewState<QueueItem>,
    history: ViewState<HistoryItem>,
    status: StatusSummary,
    queue_seq: FeedSequence,
    history_seq: FeedSequence,
}

/// Request numbering for one feed. A response applies only when no response to a newer
/// request has been applied yet; failed requests never advance `applied`.
#[derive(Debug, Default, Clone, Copy)]
struct FeedSequence {
    issued: u64,
    applied: u64,
}

impl FeedSequence {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn try_apply(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }
}

impl Panel {
    /// Build an idle panel. Nothing is fetched until [`Panel::start`].
    #[must_use]
    pub fn new(deps: PanelDeps, config: PanelConfig) -> Self {
        let api = PanelApi::new(deps.transport);
        let defaults = DisplayPreferences::default();
        let inner = Arc::new(PanelInner {
            prefs: DisplayPreferencesManager::new(api.clone()),
            api: api.clone(),
            renderer: deps.renderer,
            config,
            state: Mutex::new(PanelState {
                differ: SnapshotDiffer::new(),
                selection: SelectionStore::new(),
                queue: ViewState::new(defaults.queue.per_page),
                history: ViewState::new(defaults.history.per_page),
                status: StatusSummary::default(),
                queue_seq: FeedSequence::default(),
                history_seq: FeedSequence::default(),
            }),
            scheduler: Mutex::new(PollScheduler::new(deps.timers)),
        });
        let mutations = MutationCoordinator::new(
            api,
            deps.notifier,
            PanelHandle {
                inner: Arc::clone(&inner),
            },
        );
        Self { inner, mutations }
    }

    /// Load preferences, arm both timers, and fetch both feeds once. The first queue
    /// snapshot after every start renders, even if it matches what was shown before.
    pub async fn start(&self) {
        let prefs = self.inner.prefs.load().await;
        {
            let mut state = self.inner.lock_state();
            state.differ.reset();
            state.queue.set_per_page(prefs.queue.per_page);
            state.history.set_per_page(prefs.history.per_page);
        }
        self.inner.lock_scheduler().start(
            queue_poller(&self.inner),
            history_poller(&self.inner),
            &prefs,
        );
        info!(history_limit = self.inner.config.history_limit, "panel started");
        tokio::join!(self.inner.refresh_queue(), self.inner.refresh_history());
    }

    /// Cancel both timers. Requests already in flight still complete and apply.
    pub fn stop(&self) {
        self.inner.lock_scheduler().stop();
        info!("panel stopped");
    }

    /// Whether the poll timers are armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock_scheduler().is_running()
    }

    /// Poll the queue and status feed now.
    pub async fn refresh_queue(&self) -> PollOutcome {
        self.inner.refresh_queue().await
    }

    /// Poll the history feed now.
    pub async fn refresh_history(&self) -> PollOutcome {
        self.inner.refresh_history().await
    }

    /// Filter the queue by name and re-render from the cached list.
    pub fn set_queue_filter(&self, text: &str) {
        self.inner.update_queue(|state| state.queue.set_filter(text));
    }

    /// Show queue page `page` (clamped).
    pub fn set_queue_page(&self, page: usize) {
        self.inner.update_queue(|state| state.queue.set_page(page));
    }

    /// Filter history by name and re-render from the cached list.
    pub fn set_history_filter(&self, text: &str) {
        self.inner.update_history(|state| state.history.set_filter(text));
    }

    /// Show history page `page` (clamped).
    pub fn set_history_page(&self, page: usize) {
        self.inner.update_history(|state| state.history.set_page(page));
    }

    /// Persist `prefs`. On success page sizes change, timers are re-armed at the new rates,
    /// and both views re-render.
    pub async fn save_preferences(&self, prefs: DisplayPreferences) -> SaveOutcome {
        let outcome = self.inner.prefs.save(prefs).await;
        if !outcome.success {
            return outcome;
        }
        let current = self.inner.prefs.current();
        let (queue_page, history_page) = {
            let mut state = self.inner.lock_state();
            state.queue.set_per_page(current.queue.per_page);
            state.history.set_per_page(current.history.per_page);
            (
                build_queue_page(&state),
                build_history_page(&state, &current),
            )
        };
        self.inner.lock_scheduler().rearm(&current);
        self.inner.renderer.render_queue(&queue_page);
        self.inner.renderer.render_history(&history_page);
        outcome
    }

    /// Preferences currently in effect.
    #[must_use]
    pub fn preferences(&self) -> DisplayPreferences {
        self.inner.prefs.current()
    }

    /// Flip the selection of a listed item. Returns the new state; unknown ids stay
    /// unselected.
    pub fn toggle_selected(&self, id: &str) -> bool {
        let mut now_selected = false;
        self.inner.update_queue(|state| {
            if is_listed(state, id) {
                now_selected = state.selection.toggle(id);
            }
        });
        now_selected
    }

    /// Mark or unmark a listed item. Unknown ids are ignored.
    pub fn set_selected(&self, id: &str, selected: bool) {
        self.inner.update_queue(|state| {
            if is_listed(state, id) {
                state.selection.set_selected(id, selected);
            }
        });
    }

    /// Mark or unmark every row on the current queue page.
    pub fn select_visible(&self, selected: bool) {
        self.inner.update_queue(|state| {
            let visible: Vec<String> = state
                .queue
                .page()
                .items
                .into_iter()
                .map(|item| item.id)
                .collect();
            state.selection.select_all(visible, selected);
        });
    }

    /// Selected ids, already pruned against the latest snapshot.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<String> {
        self.inner.lock_state().selection.selected_ids()
    }

    /// Select-all checkbox state for the current queue page.
    #[must_use]
    pub fn select_all_state(&self) -> SelectAllState {
        build_queue_page(&self.inner.lock_state()).select_all
    }

    /// Apply `action` to the current selection. An empty selection sends nothing.
    pub async fn apply_to_selection(&self, action: BulkAction) -> MutationOutcome {
        let ids = self.selected_ids();
        if ids.is_empty() {
            return MutationOutcome::Rejected("no items selected".to_string());
        }
        self.mutations.bulk_action(action, &ids).await
    }

    /// Current queue view.
    #[must_use]
    pub fn queue_page(&self) -> QueuePage {
        build_queue_page(&self.inner.lock_state())
    }

    /// Current history view.
    #[must_use]
    pub fn history_page(&self) -> HistoryPage {
        let prefs = self.inner.prefs.current();
        build_history_page(&self.inner.lock_state(), &prefs)
    }

    /// Status block from the latest applied poll.
    #[must_use]
    pub fn status(&self) -> StatusSummary {
        self.inner.lock_state().status.clone()
    }

    /// Mutations whose forced re-polls reconcile this panel.
    #[must_use]
    pub const fn mutations(&self) -> &PanelMutations {
        &self.mutations
    }
}

impl PanelInner {
    fn lock_state(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, PollScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh_queue(&self) -> PollOutcome {
        match self.sync_queue().await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(path = err.path(), error = %err, "queue poll failed");
                PollOutcome::Failed
            }
        }
    }

    async fn refresh_history(&self) -> PollOutcome {
        match self.sync_history().await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(path = err.path(), error = %err, "history poll failed");
                PollOutcome::Failed
            }
        }
    }

    /// Fetch `/poll` and reconcile. Rejected or undecodable responses are applied as an
    /// empty snapshot and then reported; transport failures leave the view untouched.
    async fn sync_queue(&self) -> ApiResult<PollOutcome> {
        let seq = self.lock_state().queue_seq.issue();
        let (snapshot, failure) = match self.api.poll().await {
            Ok(snapshot) => (snapshot, None),
            Err(err) if err.is_transport() => return Err(err),
            Err(err) => (PollResponse::default(), Some(err)),
        };
        let outcome = self.apply_queue(seq, snapshot);
        match failure {
            Some(err) if outcome != PollOutcome::Stale => Err(err),
            _ => Ok(outcome),
        }
    }

    fn apply_queue(&self, seq: u64, snapshot: PollResponse) -> PollOutcome {
        let (status, page) = {
            let mut state = self.lock_state();
            if !state.queue_seq.try_apply(seq) {
                let applied = state.queue_seq.applied;
                debug!(seq, applied, "discarding stale queue response");
                return PollOutcome::Stale;
            }
            let pruned = {
                let ids: HashSet<&str> =
                    snapshot.queue.iter().map(|item| item.id.as_str()).collect();
                state.selection.prune(&ids)
            };
            if pruned > 0 {
                debug!(pruned, "dropped selections absent from snapshot");
            }
            let changed = state.differ.has_changed(&snapshot.queue);
            state.queue.replace_list(snapshot.queue);
            state.status = snapshot.status;
            (state.status.clone(), changed.then(|| build_queue_page(&state)))
        };
        self.renderer.render_status(&status);
        if let Some(page) = page {
            self.renderer.render_queue(&page);
            PollOutcome::Rendered
        } else {
            debug!("queue snapshot unchanged; render skipped");
            PollOutcome::Unchanged
        }
    }

    async fn sync_history(&self) -> ApiResult<PollOutcome> {
        let seq = self.lock_state().history_seq.issue();
        let (records, failure) = match self.api.history(self.config.history_limit).await {
            Ok(records) => (records, None),
            Err(err) if err.is_transport() => return Err(err),
            Err(err) => (HistoryResponse::default(), Some(err)),
        };
        let prefs = self.prefs.current();
        let page = {
            let mut state = self.lock_state();
            if !state.history_seq.try_apply(seq) {
                let applied = state.history_seq.applied;
                debug!(seq, applied, "discarding stale history response");
                return Ok(PollOutcome::Stale);
            }
            state.history.replace_list(records.history);
            build_history_page(&state, &prefs)
        };
        self.renderer.render_history(&page);
        failure.map_or(Ok(PollOutcome::Rendered), Err)
    }

    fn update_queue(&self, change: impl FnOnce(&mut PanelState)) {
        let page = {
            let mut state = self.lock_state();
            change(&mut state);
            build_queue_page(&state)
        };
        self.renderer.render_queue(&page);
    }

    fn update_history(&self, change: impl FnOnce(&mut PanelState)) {
        let prefs = self.prefs.current();
        let page = {
            let mut state = self.lock_state();
            change(&mut state);
            build_history_page(&state, &prefs)
        };
        self.renderer.render_history(&page);
    }
}

#[async_trait]
impl Reconciler for PanelHandle {
    async fn force_queue_poll(&self) {
        self.inner.refresh_queue().await;
    }

    async fn force_history_poll(&self) {
        self.inner.refresh_history().await;
    }

    fn deselect(&self, ids: &[String]) {
        self.inner.update_queue(|state| state.selection.select_all(ids, false));
    }
}

fn queue_poller(inner: &Arc<PanelInner>) -> PollFn {
    let weak: Weak<PanelInner> = Arc::downgrade(inner);
    Arc::new(move || {
        let weak = weak.clone();
        Box::pin(async move {
            match weak.upgrade() {
                Some(inner) => inner.sync_queue().await.map(drop),
                None => Ok(()),
            }
        })
    })
}

fn history_poller(inner: &Arc<PanelInner>) -> PollFn {
    let weak: Weak<PanelInner> = Arc::downgrade(inner);
    Arc::new(move || {
        let weak = weak.clone();
        Box::pin(async move {
            match weak.upgrade() {
                Some(inner) => inner.sync_history().await.map(drop),
                None => Ok(()),
            }
        })
    })
}

fn is_listed(state: &PanelState, id: &str) -> bool {
    state.queue.full_list().iter().any(|item| item.id == id)
}

fn build_queue_page(state: &PanelState) -> QueuePage {
    QueuePage::from_view(&state.queue, &state.selection)
}

fn build_history_page(state: &PanelState, prefs: &DisplayPreferences) -> HistoryPage {
    HistoryPage::from_view(&state.history, prefs.history)
}
