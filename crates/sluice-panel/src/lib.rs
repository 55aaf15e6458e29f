#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    clippy::all,
    clippy::pedantic
)]
#![allow(clippy::module_name_repetitions)]
//! State synchronisation core for the Sluice download-queue panel.
//!
//! A [`Panel`] polls the backend on two independent timers (queue plus status, and
//! history), decides whether a fresh snapshot differs from what is shown, keeps the user's
//! selection consistent with the latest snapshot, and pages the filtered lists for a
//! [`ViewRenderer`]. Mutations go through a [`MutationCoordinator`] that always forces a
//! re-poll afterwards, so the view only ever reflects what the backend reported.
//!
//! The pure pieces ([`fingerprint()`], [`paginate()`], [`page_range`],
//! [`SelectionStore::prune`]) carry no I/O and can be used on their own.

pub mod api;
pub mod error;
pub mod fingerprint;
pub mod mutation;
pub mod notify;
pub mod paginate;
pub mod panel;
pub mod preferences;
pub mod render;
pub mod scheduler;
pub mod selection;
pub mod transport;
pub mod view;

pub use api::PanelApi;
pub use error::{ApiError, ApiResult, TransportError};
pub use fingerprint::{EMPTY_FINGERPRINT, SnapshotDiffer, fingerprint};
pub use mutation::{
    BulkAction, MutationCoordinator, MutationOutcome, Reconciler, SingleAction,
    available_actions, priority_mutable,
};
pub use notify::{Notice, NoticeLevel, Notifier, TracingNotifier};
pub use paginate::{Named, Page, PageMarker, filter, page_range, paginate};
pub use panel::{
    DEFAULT_HISTORY_LIMIT, Panel, PanelConfig, PanelDeps, PanelHandle, PanelMutations,
    PollOutcome,
};
pub use preferences::{
    DisplayPreferencesManager, QUEUE_REFRESH_FLOOR_SECS, SaveOutcome, effective_history_interval,
    effective_queue_interval,
};
pub use render::{HistoryPage, QueuePage, QueueRow, ViewRenderer};
pub use scheduler::{PollFn, PollScheduler, TickFn, TimerFactory, TimerHandle, TokioTimerFactory};
pub use selection::{SelectAllState, SelectionStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method};
pub use view::ViewState;
