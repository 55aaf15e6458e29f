//! Cheap change detection for queue snapshots.
//!
//! Counters on an active download move many times per second. Rebuilding the queue view on
//! every poll would disturb whatever the user is interacting with, so the view is rebuilt only
//! when the fingerprint of the visible fields changes.

use std::fmt::Write;

use sluice_api_models::QueueItem;

/// Fingerprint of an empty or absent snapshot. Contains no field separator, so it can never
/// collide with the fingerprint of a non-empty snapshot.
pub const EMPTY_FINGERPRINT: &str = "<empty>";

const FIELD_SEPARATOR: char = '|';
const ITEM_SEPARATOR: char = ';';

/// Project the display-relevant fields of `items` into a deterministic string.
///
/// Order matters: the same items in a different order produce a different fingerprint.
/// Progress is rounded to the nearest whole percent.
#[must_use]
pub fn fingerprint(items: &[QueueItem]) -> String {
    if items.is_empty() {
        return EMPTY_FINGERPRINT.to_string();
    }
    let mut out = String::with_capacity(items.len() * 64);
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push(ITEM_SEPARATOR);
        }
        push_escaped(&mut out, &item.id);
        let _ = write!(
            out,
            "{sep}{state}{sep}{progress:.0}{sep}{downloaded}{sep}{speed}{sep}{priority}{sep}",
            sep = FIELD_SEPARATOR,
            state = item.state.as_str(),
            progress = rounded_progress(item.progress_pct),
            downloaded = item.downloaded_bytes,
            speed = item.speed_bps,
            priority = item.priority.as_str(),
        );
        push_escaped(&mut out, &item.time_left);
        out.push(FIELD_SEPARATOR);
        push_escaped(&mut out, item.status_message.as_deref().unwrap_or_default());
        let _ = write!(out, "{FIELD_SEPARATOR}{}", item.completed_files);
    }
    out
}

/// Backslash-escape separators inside free-text fields.
fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        if matches!(ch, '\\' | FIELD_SEPARATOR | ITEM_SEPARATOR) {
            out.push('\\');
        }
        out.push(ch);
    }
}

fn rounded_progress(pct: f64) -> f64 {
    // clamp first so tiny negatives never render as "-0"
    pct.clamp(0.0, 100.0).round()
}

/// Remembers the last rendered fingerprint and reports whether a new snapshot differs.
#[derive(Debug, Default, Clone)]
pub struct SnapshotDiffer {
    last: Option<String>,
}

impl SnapshotDiffer {
    /// Differ with no stored fingerprint; the first snapshot always counts as a change.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Compare `items` against the stored fingerprint, storing the new one when it differs.
    pub fn has_changed(&mut self, items: &[QueueItem]) -> bool {
        let next = fingerprint(items);
        if self.last.as_deref() == Some(next.as_str()) {
            return false;
        }
        self.last = Some(next);
        true
    }

    /// Last stored fingerprint, if any snapshot has been seen.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Forget the stored fingerprint so the next snapshot renders unconditionally.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_api_models::{ItemState, Priority};

    fn item(id: &str, progress: f64) -> QueueItem {
        QueueItem {
            id: id.to_string(),
            name: format!("item {id}"),
            state: ItemState::Downloading,
            progress_pct: progress,
            downloaded_bytes: 10,
            total_bytes: 100,
            speed_bps: 5,
            time_left: "0:01:00".into(),
            ..QueueItem::default()
        }
    }

    #[test]
    fn identical_snapshots_share_a_fingerprint() {
        let items = vec![item("a", 10.0), item("b", 20.0)];
        assert_eq!(fingerprint(&items), fingerprint(&items.clone()));
    }

    #[test]
    fn reordering_changes_the_fingerprint() {
        let forward = vec![item("a", 10.0), item("b", 20.0)];
        let reversed = vec![item("b", 20.0), item("a", 10.0)];
        assert_ne!(fingerprint(&forward), fingerprint(&reversed));
    }

    #[test]
    fn sub_percent_progress_jitter_is_ignored() {
        assert_eq!(
            fingerprint(&[item("a", 41.6)]),
            fingerprint(&[item("a", 42.4)])
        );
        assert_ne!(
            fingerprint(&[item("a", 42.4)]),
            fingerprint(&[item("a", 42.6)])
        );
    }

    #[test]
    fn empty_snapshot_maps_to_sentinel() {
        assert_eq!(fingerprint(&[]), EMPTY_FINGERPRINT);
        let odd = QueueItem {
            id: EMPTY_FINGERPRINT.to_string(),
            ..QueueItem::default()
        };
        assert_ne!(fingerprint(&[odd]), EMPTY_FINGERPRINT);
    }

    #[test]
    fn separators_inside_fields_cannot_forge_a_match() {
        let pair = fingerprint(&[item("a", 10.0), item("b", 10.0)]);
        let prefix = "a|downloading|10|10|5|normal|0:01:00|";
        assert!(pair.starts_with(prefix));

        // one item whose status text spells out the rest of the two-item fingerprint
        let mut forged = item("a", 10.0);
        forged.status_message = Some(pair[prefix.len()..pair.len() - 2].to_string());
        assert_ne!(fingerprint(&[forged]), pair);

        assert_ne!(
            fingerprint(&[item("a|b", 10.0)]),
            fingerprint(&[item("a\\|b", 10.0)])
        );
    }

    #[test]
    fn hidden_fields_do_not_affect_the_fingerprint() {
        let base = item("a", 10.0);
        let mut renamed = base.clone();
        renamed.name = "other".into();
        renamed.total_files = 9;
        assert_eq!(fingerprint(&[base]), fingerprint(&[renamed]));
    }

    #[test]
    fn visible_fields_affect_the_fingerprint() {
        let base = item("a", 10.0);
        let mut reprioritised = base.clone();
        reprioritised.priority = Priority::Force;
        let mut annotated = base.clone();
        annotated.status_message = Some("repairing".into());
        let reference = fingerprint(&[base]);
        assert_ne!(reference, fingerprint(&[reprioritised]));
        assert_ne!(reference, fingerprint(&[annotated]));
    }

    #[test]
    fn differ_reports_changes_once() {
        let mut differ = SnapshotDiffer::new();
        let first = vec![item("1", 0.0)];
        assert!(differ.has_changed(&first));
        assert!(!differ.has_changed(&first));
        let moved = vec![item("1", 50.0)];
        assert!(differ.has_changed(&moved));
        assert!(!differ.has_changed(&moved));
        differ.reset();
        assert!(differ.last().is_none());
        assert!(differ.has_changed(&moved));
    }
}
