//! Display preferences: remote load merged over defaults, explicit save, effective intervals.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sluice_api_models::DisplayPreferences;
use tracing::{info, warn};

use crate::api::PanelApi;

/// Lowest queue poll interval ever used, bounding request volume.
pub const QUEUE_REFRESH_FLOOR_SECS: u64 = 5;

/// Queue poll interval after applying the floor.
#[must_use]
pub fn effective_queue_interval(prefs: &DisplayPreferences) -> Duration {
    Duration::from_secs(prefs.queue.refresh_rate_seconds.max(QUEUE_REFRESH_FLOOR_SECS))
}

/// History poll interval. No floor applies; zero is raised to one second only so the timer
/// period stays valid.
#[must_use]
pub fn effective_history_interval(prefs: &DisplayPreferences) -> Duration {
    Duration::from_secs(prefs.history.refresh_rate_seconds.max(1))
}

/// Result of a save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Whether the backend stored the preferences.
    pub success: bool,
    /// Backend or fallback message.
    pub message: Option<String>,
}

/// Holds the current preferences and moves them to and from the backend.
pub struct DisplayPreferencesManager {
    api: PanelApi,
    current: Mutex<DisplayPreferences>,
}

impl DisplayPreferencesManager {
    /// Manager seeded with the built-in defaults.
    #[must_use]
    pub fn new(api: PanelApi) -> Self {
        Self {
            api,
            current: Mutex::new(DisplayPreferences::default()),
        }
    }

    /// Fetch the stored preferences. Fields absent remotely keep their defaults; when the
    /// fetch fails entirely the defaults are kept.
    pub async fn load(&self) -> DisplayPreferences {
        match self.api.display_preferences().await {
            Ok(remote) => {
                let prefs = normalize(remote);
                *self.lock() = prefs;
                info!(
                    queue_refresh_secs = prefs.queue.refresh_rate_seconds,
                    history_refresh_secs = prefs.history.refresh_rate_seconds,
                    "display preferences loaded"
                );
                prefs
            }
            Err(err) => {
                warn!(error = %err, "display preferences unavailable; using defaults");
                self.current()
            }
        }
    }

    /// Persist the full preference object; the local copy changes only on success.
    pub async fn save(&self, prefs: DisplayPreferences) -> SaveOutcome {
        let prefs = normalize(prefs);
        match self.api.save_display_preferences(&prefs).await {
            Ok(response) => {
                *self.lock() = prefs;
                SaveOutcome {
                    success: true,
                    message: response.message,
                }
            }
            Err(err) => {
                warn!(error = %err, "saving display preferences failed");
                SaveOutcome {
                    success: false,
                    message: Some(err.user_message()),
                }
            }
        }
    }

    /// Preferences currently in effect.
    #[must_use]
    pub fn current(&self) -> DisplayPreferences {
        *self.lock()
    }

    /// Queue poll interval for the current preferences.
    #[must_use]
    pub fn effective_queue_interval(&self) -> Duration {
        effective_queue_interval(&self.current())
    }

    /// History poll interval for the current preferences.
    #[must_use]
    pub fn effective_history_interval(&self) -> Duration {
        effective_history_interval(&self.current())
    }

    fn lock(&self) -> MutexGuard<'_, DisplayPreferences> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize(mut prefs: DisplayPreferences) -> DisplayPreferences {
    prefs.queue.per_page = prefs.queue.per_page.max(1);
    prefs.history.per_page = prefs.history.per_page.max(1);
    prefs
}
