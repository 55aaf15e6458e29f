#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    clippy::all,
    clippy::pedantic
)]
//! Shared HTTP DTOs for the Sluice download-queue API.
//!
//! The panel core and the CLI both decode server payloads through these types so the
//! contract stays in one place. Every field other than an item's identifier is defaulted
//! on decode: a partial payload normalises to sensible values instead of failing. Identifiers
//! may arrive as strings or numbers, unknown enum labels fall back to a catch-all, and list
//! entries that still cannot be decoded are dropped without affecting their neighbours.
use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle state of an in-flight queue item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Waiting for a download slot.
    #[default]
    Queued,
    /// Actively fetching data.
    Downloading,
    /// Held by the user.
    Paused,
    /// Joining downloaded segments into files.
    Assembling,
    /// Unpacking archives after assembly.
    Extracting,
    /// Finished successfully.
    Completed,
    /// Finished with an unrecoverable error.
    Failed,
    /// A state label this client does not know.
    #[serde(other)]
    Unknown,
}

impl ItemState {
    /// Wire label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Assembling => "assembling",
            Self::Extracting => "extracting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// `true` once the item can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Scheduling priority of a queue item. Orthogonal to [`ItemState`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Start immediately, ignoring the global pause.
    Force,
    /// Ahead of normal items.
    High,
    /// Behind normal items.
    Low,
    /// Never start until the priority changes.
    Stop,
    /// Default ordering; unknown labels decode to this.
    #[default]
    #[serde(other)]
    Normal,
}

impl Priority {
    /// Wire label for the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Stop => "stop",
        }
    }
}

/// One in-flight download as reported by `/poll`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct QueueItem {
    /// Stable opaque identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    /// Display name.
    pub name: String,
    #[serde(default)]
    /// Current lifecycle state.
    pub state: ItemState,
    #[serde(default)]
    /// Completion percentage in the range 0–100.
    pub progress_pct: f64,
    #[serde(default)]
    /// Bytes fetched so far.
    pub downloaded_bytes: u64,
    #[serde(default)]
    /// Total payload size in bytes.
    pub total_bytes: u64,
    #[serde(default)]
    /// Current throughput in bytes per second.
    pub speed_bps: u64,
    #[serde(default)]
    /// Scheduling priority.
    pub priority: Priority,
    #[serde(default)]
    /// Remaining-time label; only meaningful while downloading.
    pub time_left: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Free-text status line from the backend.
    pub status_message: Option<String>,
    #[serde(default)]
    /// Files assembled so far; meaningful while assembling.
    pub completed_files: u32,
    #[serde(default)]
    /// Files expected in the job.
    pub total_files: u32,
    #[serde(default)]
    /// Segments that could not be fetched.
    pub failed_segments: u32,
    #[serde(default)]
    /// Bytes lost to failed segments.
    pub missing_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional category label.
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Failure detail when the item failed.
    pub error_message: Option<String>,
}

impl QueueItem {
    /// Downloaded bytes clamped to the total for display.
    #[must_use]
    pub fn display_downloaded_bytes(&self) -> u64 {
        self.downloaded_bytes.min(self.total_bytes)
    }
}

/// Terminal state of a history record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryState {
    /// Finished successfully.
    #[default]
    Completed,
    /// Finished with an error.
    Failed,
}

impl HistoryState {
    /// Wire label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A finished download as reported by `/history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HistoryItem {
    /// Stable opaque identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional category label.
    pub category: Option<String>,
    #[serde(default)]
    /// Total payload size in bytes.
    pub total_bytes: u64,
    #[serde(default)]
    /// Bytes actually fetched.
    pub downloaded_bytes: u64,
    #[serde(default)]
    /// Outcome of the download.
    pub state: HistoryState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Admission timestamp.
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Failure detail.
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Indexer the job originated from.
    pub indexer: Option<String>,
}

/// Global status block returned alongside the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StatusSummary {
    /// Whether the whole queue is paused.
    pub paused: bool,
    /// Aggregate throughput in bytes per second.
    pub speed_bps: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Global throughput cap; `None` when unlimited.
    pub speed_limit_bps: Option<u64>,
    /// Items waiting to start.
    pub queued_count: u32,
    /// Items currently transferring.
    pub downloading_count: u32,
    /// Bytes left across the queue.
    pub remaining_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Free space on the download volume.
    pub disk_free_bytes: Option<u64>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Unsigned(value) => value.to_string(),
        RawId::Signed(value) => value.to_string(),
    })
}

/// Decode a list entry by entry, dropping entries that do not fit `T`. `null` is an empty list.
fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry<V> {
        Valid(V),
        Invalid(IgnoredAny),
    }

    let entries = Option::<Vec<Entry<T>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::Valid(value) => Some(value),
            Entry::Invalid(_) => None,
        })
        .collect())
}

/// Response body of `GET /poll`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PollResponse {
    #[serde(default)]
    /// Global status counters.
    pub status: StatusSummary,
    #[serde(default, deserialize_with = "skip_invalid")]
    /// Current queue snapshot in display order.
    pub queue: Vec<QueueItem>,
}

/// Response body of `GET /history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HistoryResponse {
    #[serde(default, deserialize_with = "skip_invalid")]
    /// History records, newest first.
    pub history: Vec<HistoryItem>,
}

/// Body returned by mutation endpoints on success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutationResponse {
    #[serde(default = "default_true")]
    /// Whether the backend applied the mutation.
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional human-readable detail.
    pub message: Option<String>,
}

impl Default for MutationResponse {
    fn default() -> Self {
        Self {
            success: true,
            message: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Error document returned with non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Machine or human error text.
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Human-readable message.
    pub message: Option<String>,
}

impl ErrorBody {
    /// Prefer `error`, then `message`, ignoring blank values.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .into_iter()
            .chain(self.message.as_deref())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// Body of `POST /queue/{id}/priority`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityRequest {
    /// Requested priority.
    pub priority: Priority,
}

/// Body of `POST /queue/bulk/priority`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkPriorityRequest {
    /// Target item identifiers.
    pub ids: Vec<String>,
    /// Requested priority.
    pub priority: Priority,
}

/// Body of `POST /queue/bulk/delete`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkDeleteRequest {
    /// Target item identifiers.
    pub ids: Vec<String>,
}

/// Body of `GET`/`POST /speed-limit`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SpeedLimit {
    #[serde(default)]
    /// Global throughput cap in bytes per second; zero means unlimited.
    pub speed_limit_bps: u64,
}

/// How history timestamps are rendered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// "3 hours ago".
    #[default]
    Relative,
    /// Calendar date and time.
    Absolute,
}

/// Default queue refresh rate in seconds.
pub const DEFAULT_QUEUE_REFRESH_SECS: u64 = 3;
/// Default history refresh rate in seconds.
pub const DEFAULT_HISTORY_REFRESH_SECS: u64 = 30;
/// Default page size for both views.
pub const DEFAULT_PER_PAGE: usize = 20;

/// Queue view preferences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueuePreferences {
    /// Requested poll interval in seconds (a floor applies).
    pub refresh_rate_seconds: u64,
    /// Rows per page.
    pub per_page: usize,
}

impl Default for QueuePreferences {
    fn default() -> Self {
        Self {
            refresh_rate_seconds: DEFAULT_QUEUE_REFRESH_SECS,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// History view preferences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryPreferences {
    /// Poll interval in seconds.
    pub refresh_rate_seconds: u64,
    /// Rows per page.
    pub per_page: usize,
    /// Timestamp rendering.
    pub date_format: DateFormat,
    /// Show the category column.
    pub show_category: bool,
    /// Show the size column.
    pub show_size: bool,
    /// Show the indexer column.
    pub show_indexer: bool,
}

impl Default for HistoryPreferences {
    fn default() -> Self {
        Self {
            refresh_rate_seconds: DEFAULT_HISTORY_REFRESH_SECS,
            per_page: DEFAULT_PER_PAGE,
            date_format: DateFormat::Relative,
            show_category: false,
            show_size: false,
            show_indexer: false,
        }
    }
}

/// Display preferences for both views, stored server-side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DisplayPreferences {
    /// Queue view settings.
    pub queue: QueuePreferences,
    /// History view settings.
    pub history: HistoryPreferences,
}
