//! Command handlers grouped by concern.

pub(crate) mod history;
pub(crate) mod prefs;
pub(crate) mod queue;
pub(crate) mod watch;

use sluice_api_models::MutationResponse;

/// Print the backend's confirmation, or `fallback` when it sent none.
pub(crate) fn report_mutation(response: &MutationResponse, fallback: &str) {
    match response.message.as_deref().map(str::trim) {
        Some(message) if !message.is_empty() => println!("{message}"),
        _ => println!("{fallback}"),
    }
}
