//! Item and queue mutations followed by a forced re-poll.
//!
//! Local state is never patched to anticipate a mutation. After every request, whether it
//! succeeded or not, the affected feed is polled again and the view reconciles to whatever
//! the backend reports. The one exception is bulk delete, which drops the deleted ids from
//! the selection before the request goes out.

use std::sync::Arc;

use async_trait::async_trait;
use sluice_api_models::{ItemState, MutationResponse, Priority};
use tracing::{info, warn};

use crate::api::PanelApi;
use crate::error::ApiResult;
use crate::notify::{Notice, Notifier};

/// Transition a single queue item can be asked to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SingleAction {
    /// Stop downloading without losing progress.
    Pause,
    /// Continue a paused item.
    Resume,
    /// Drop the item from the queue.
    Remove,
}

impl SingleAction {
    /// Lowercase name used in logs and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Remove => "remove",
        }
    }
}

/// Action applied to several selected items at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    /// Set every item to the same priority.
    Priority(Priority),
    /// Remove every item.
    Delete,
}

/// Single-item actions offered for an item in `state`.
#[must_use]
pub fn available_actions(state: ItemState) -> Vec<SingleAction> {
    match state {
        ItemState::Queued | ItemState::Downloading | ItemState::Assembling => {
            vec![SingleAction::Pause, SingleAction::Remove]
        }
        ItemState::Paused => vec![SingleAction::Resume, SingleAction::Remove],
        ItemState::Extracting
        | ItemState::Completed
        | ItemState::Failed
        | ItemState::Unknown => vec![SingleAction::Remove],
    }
}

/// Whether the priority of an item in `state` may still change.
#[must_use]
pub const fn priority_mutable(state: ItemState) -> bool {
    !state.is_terminal()
}

/// What happened to a mutation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The backend applied the change.
    Applied,
    /// The backend did not apply the change; carries the message shown to the user.
    Rejected(String),
}

impl MutationOutcome {
    /// `true` for [`MutationOutcome::Applied`].
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Hooks a coordinator uses to bring local state back in line with the backend.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Poll the queue and status feed right away.
    async fn force_queue_poll(&self);
    /// Poll the history feed right away.
    async fn force_history_poll(&self);
    /// Drop `ids` from the selection.
    fn deselect(&self, ids: &[String]);
}

#[async_trait]
impl<R: Reconciler + ?Sized> Reconciler for Arc<R> {
    async fn force_queue_poll(&self) {
        (**self).force_queue_poll().await;
    }

    async fn force_history_poll(&self) {
        (**self).force_history_poll().await;
    }

    fn deselect(&self, ids: &[String]) {
        (**self).deselect(ids);
    }
}

#[derive(Debug, Clone, Copy)]
enum Feed {
    Queue,
    History,
}

/// Issues mutations, reports their result, and forces reconciliation.
///
/// Every method sends exactly one request and then exactly one forced poll. Failures are
/// reported to the [`Notifier`] and returned as [`MutationOutcome::Rejected`]; they never
/// escape as errors.
pub struct MutationCoordinator<R> {
    api: PanelApi,
    notifier: Arc<dyn Notifier>,
    reconciler: R,
}

impl<R: Reconciler> MutationCoordinator<R> {
    /// Coordinator issuing requests through `api`.
    #[must_use]
    pub fn new(api: PanelApi, notifier: Arc<dyn Notifier>, reconciler: R) -> Self {
        Self {
            api,
            notifier,
            reconciler,
        }
    }

    /// Pause, resume, or remove one item.
    pub async fn single_action(&self, action: SingleAction, id: &str) -> MutationOutcome {
        let result = match action {
            SingleAction::Pause => self.api.pause(id).await,
            SingleAction::Resume => self.api.resume(id).await,
            SingleAction::Remove => self.api.remove(id).await,
        };
        self.finish(action.as_str(), result, Feed::Queue).await
    }

    /// Apply `action` to every id in `ids` with one request.
    pub async fn bulk_action(&self, action: BulkAction, ids: &[String]) -> MutationOutcome {
        let result = match action {
            BulkAction::Priority(priority) => self.api.bulk_priority(ids, priority).await,
            BulkAction::Delete => {
                self.reconciler.deselect(ids);
                self.api.bulk_delete(ids).await
            }
        };
        let label = match action {
            BulkAction::Priority(_) => "bulk priority",
            BulkAction::Delete => "bulk delete",
        };
        self.finish(label, result, Feed::Queue).await
    }

    /// Change the priority of one item.
    pub async fn set_priority(&self, id: &str, priority: Priority) -> MutationOutcome {
        let result = self.api.set_priority(id, priority).await;
        self.finish("priority", result, Feed::Queue).await
    }

    /// Set the global throughput cap; zero removes the cap.
    pub async fn set_speed_limit(&self, speed_limit_bps: u64) -> MutationOutcome {
        let result = self.api.set_speed_limit(speed_limit_bps).await;
        self.finish("speed limit", result, Feed::Queue).await
    }

    /// Pause the whole queue.
    pub async fn pause_all(&self) -> MutationOutcome {
        let result = self.api.pause_all().await;
        self.finish("pause all", result, Feed::Queue).await
    }

    /// Resume the whole queue.
    pub async fn resume_all(&self) -> MutationOutcome {
        let result = self.api.resume_all().await;
        self.finish("resume all", result, Feed::Queue).await
    }

    /// Delete one history record.
    pub async fn delete_history(&self, id: &str) -> MutationOutcome {
        let result = self.api.delete_history(id).await;
        self.finish("history delete", result, Feed::History).await
    }

    /// Delete every history record.
    pub async fn clear_history(&self) -> MutationOutcome {
        let result = self.api.clear_history().await;
        self.finish("history clear", result, Feed::History).await
    }

    /// Read the global throughput cap. A failed read is reported and yields `None`.
    pub async fn speed_limit(&self) -> Option<u64> {
        match self.api.speed_limit().await {
            Ok(limit) => Some(limit.speed_limit_bps),
            Err(err) => {
                warn!(error = %err, "reading speed limit failed");
                self.notifier.notify(Notice::error(err.user_message()));
                None
            }
        }
    }

    async fn finish(
        &self,
        label: &'static str,
        result: ApiResult<MutationResponse>,
        feed: Feed,
    ) -> MutationOutcome {
        let outcome = match result {
            Ok(response) => {
                info!(action = label, "mutation applied");
                if let Some(message) = response.message.filter(|text| !text.trim().is_empty()) {
                    self.notifier.notify(Notice::info(message));
                }
                MutationOutcome::Applied
            }
            Err(err) => {
                warn!(action = label, path = err.path(), error = %err, "mutation failed");
                let message = err.user_message();
                self.notifier.notify(Notice::error(message.clone()));
                MutationOutcome::Rejected(message)
            }
        };
        match feed {
            Feed::Queue => self.reconciler.force_queue_poll().await,
            Feed::History => self.reconciler.force_history_poll().await,
        }
        outcome
    }
}
