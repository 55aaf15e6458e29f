//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sluice_api_models::{
    DateFormat, DisplayPreferences, HistoryItem, ItemState, QueueItem, StatusSummary,
};
use sluice_panel::{
    HistoryPage, Notice, NoticeLevel, Notifier, PageMarker, QueuePage, ViewRenderer,
};
use tracing::warn;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

pub(crate) fn render_status(status: &StatusSummary, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "status": status }))?,
        OutputFormat::Table => println!("{}", status_line(status)),
    }
    Ok(())
}

pub(crate) fn render_queue_page(page: &QueuePage, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let items: Vec<&QueueItem> = page.rows.iter().map(|row| &row.item).collect();
            print_json(&json!({
                "queue": items,
                "page": page.page,
                "total_pages": page.total_pages,
                "total_items": page.total_items,
                "filter": page.filter_text,
            }))?;
        }
        OutputFormat::Table => {
            println!(
                "{:<24} {:<12} {:>7} {:>21} {:>12} {:>9} {:<6} NAME",
                "ID", "STATE", "PROG", "DONE", "SPEED", "ETA", "PRIO"
            );
            for row in &page.rows {
                let item = &row.item;
                let done = format!(
                    "{}/{}",
                    format_bytes(item.display_downloaded_bytes()),
                    format_bytes(item.total_bytes)
                );
                println!(
                    "{:<24} {:<12} {:>7} {:>21} {:>12} {:>9} {:<6} {}{}",
                    item.id,
                    item.state.as_str(),
                    format!("{:.1}%", item.progress_pct),
                    done,
                    format_rate(item.speed_bps),
                    eta(item),
                    item.priority.as_str(),
                    item.name,
                    queue_detail(item)
                );
            }
            print_footer(
                page.page,
                page.total_pages,
                page.total_items,
                &page.page_range,
                &page.filter_text,
            );
        }
    }
    Ok(())
}

pub(crate) fn render_history_page(page: &HistoryPage, format: OutputFormat) -> CliResult<()> {
    render_history_at(page, format, Utc::now())
}

fn render_history_at(
    page: &HistoryPage,
    format: OutputFormat,
    now: DateTime<Utc>,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "history": page.rows,
            "page": page.page,
            "total_pages": page.total_pages,
            "total_items": page.total_items,
            "filter": page.filter_text,
        }))?,
        OutputFormat::Table => {
            for line in history_lines(page, now) {
                println!("{line}");
            }
            print_footer(
                page.page,
                page.total_pages,
                page.total_items,
                &page.page_range,
                &page.filter_text,
            );
        }
    }
    Ok(())
}

pub(crate) fn render_preferences(
    prefs: &DisplayPreferences,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(prefs)?,
        OutputFormat::Table => {
            println!(
                "queue.refresh_rate_seconds: {}",
                prefs.queue.refresh_rate_seconds
            );
            println!("queue.per_page: {}", prefs.queue.per_page);
            println!(
                "history.refresh_rate_seconds: {}",
                prefs.history.refresh_rate_seconds
            );
            println!("history.per_page: {}", prefs.history.per_page);
            println!(
                "history.date_format: {}",
                date_format_label(prefs.history.date_format)
            );
            println!("history.show_category: {}", prefs.history.show_category);
            println!("history.show_size: {}", prefs.history.show_size);
            println!("history.show_indexer: {}", prefs.history.show_indexer);
        }
    }
    Ok(())
}

pub(crate) fn render_speed_limit(speed_limit_bps: u64, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "speed_limit_bps": speed_limit_bps }))?,
        OutputFormat::Table => println!("speed limit: {}", format_limit(speed_limit_bps)),
    }
    Ok(())
}

/// Draws reconciled views on stdout as they arrive.
pub(crate) struct TerminalRenderer {
    format: OutputFormat,
}

impl TerminalRenderer {
    pub(crate) const fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl ViewRenderer for TerminalRenderer {
    fn render_status(&self, status: &StatusSummary) {
        if let Err(err) = render_status(status, self.format) {
            warn!(error = %err.display_message(), "status render failed");
        }
    }

    fn render_queue(&self, page: &QueuePage) {
        if self.format == OutputFormat::Table {
            println!();
        }
        if let Err(err) = render_queue_page(page, self.format) {
            warn!(error = %err.display_message(), "queue render failed");
        }
    }

    fn render_history(&self, page: &HistoryPage) {
        if self.format == OutputFormat::Table {
            println!();
            println!("history");
        }
        if let Err(err) = render_history_page(page, self.format) {
            warn!(error = %err.display_message(), "history render failed");
        }
    }
}

/// Prints mutation notices on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CliNotifier;

impl Notifier for CliNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => eprintln!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

fn status_line(status: &StatusSummary) -> String {
    let mut line = format!(
        "{} | {} | limit {} | {} queued, {} downloading | {} left",
        if status.paused { "paused" } else { "running" },
        format_rate(status.speed_bps),
        format_limit(status.speed_limit_bps.unwrap_or(0)),
        status.queued_count,
        status.downloading_count,
        format_bytes(status.remaining_bytes)
    );
    if let Some(free) = status.disk_free_bytes {
        line.push_str(&format!(" | {} free", format_bytes(free)));
    }
    line
}

fn eta(item: &QueueItem) -> &str {
    if item.state == ItemState::Downloading && !item.time_left.trim().is_empty() {
        item.time_left.as_str()
    } else {
        "-"
    }
}

fn queue_detail(item: &QueueItem) -> String {
    match item.state {
        ItemState::Assembling if item.total_files > 0 => {
            format!(" ({}/{} files)", item.completed_files, item.total_files)
        }
        ItemState::Failed => item
            .error_message
            .as_deref()
            .map(|message| format!(" ({message})"))
            .unwrap_or_default(),
        _ => {
            let mut detail = item
                .status_message
                .as_deref()
                .filter(|message| !message.trim().is_empty())
                .map(|message| format!(" ({message})"))
                .unwrap_or_default();
            if item.failed_segments > 0 {
                detail.push_str(&format!(
                    " [{} segments missing, {}]",
                    item.failed_segments,
                    format_bytes(item.missing_bytes)
                ));
            }
            detail
        }
    }
}

fn history_lines(page: &HistoryPage, now: DateTime<Utc>) -> Vec<String> {
    let display = page.display;
    let mut header = format!("{:<24} {:<10} {:<16}", "ID", "STATE", "COMPLETED");
    if display.show_size {
        header.push_str(&format!(" {:>10}", "SIZE"));
    }
    if display.show_category {
        header.push_str(&format!(" {:<12}", "CATEGORY"));
    }
    if display.show_indexer {
        header.push_str(&format!(" {:<14}", "INDEXER"));
    }
    header.push_str(" NAME");

    let mut lines = vec![header];
    for item in &page.rows {
        let mut line = format!(
            "{:<24} {:<10} {:<16}",
            item.id,
            item.state.as_str(),
            format_timestamp(history_time(item), display.date_format, now)
        );
        if display.show_size {
            line.push_str(&format!(" {:>10}", format_bytes(item.total_bytes)));
        }
        if display.show_category {
            line.push_str(&format!(" {:<12}", item.category.as_deref().unwrap_or("-")));
        }
        if display.show_indexer {
            line.push_str(&format!(" {:<14}", item.indexer.as_deref().unwrap_or("-")));
        }
        line.push(' ');
        line.push_str(&item.name);
        if let Some(message) = item.error_message.as_deref() {
            line.push_str(&format!(" ({message})"));
        }
        lines.push(line);
    }
    lines
}

fn history_time(item: &HistoryItem) -> Option<DateTime<Utc>> {
    item.completed_at.or(item.added_at)
}

fn print_footer(
    page: usize,
    total_pages: usize,
    total_items: usize,
    markers: &[PageMarker],
    filter_text: &str,
) {
    let links: Vec<String> = markers
        .iter()
        .map(|marker| match marker {
            PageMarker::Page(number) if *number == page => format!("[{number}]"),
            PageMarker::Page(number) => number.to_string(),
            PageMarker::Ellipsis => "...".to_string(),
        })
        .collect();
    let mut footer = format!("page {page}/{total_pages} ({total_items} items)");
    if !links.is_empty() {
        footer.push_str(&format!(" {}", links.join(" ")));
    }
    if !filter_text.is_empty() {
        footer.push_str(&format!(" filter: {filter_text}"));
    }
    println!("{footer}");
}

pub(crate) fn format_timestamp(
    at: Option<DateTime<Utc>>,
    format: DateFormat,
    now: DateTime<Utc>,
) -> String {
    let Some(at) = at else {
        return "-".to_string();
    };
    match format {
        DateFormat::Absolute => at.format("%Y-%m-%d %H:%M").to_string(),
        DateFormat::Relative => {
            let seconds = (now - at).num_seconds();
            if seconds < 60 {
                "just now".to_string()
            } else if seconds < 3_600 {
                plural(seconds / 60, "minute")
            } else if seconds < 86_400 {
                plural(seconds / 3_600, "hour")
            } else {
                plural(seconds / 86_400, "day")
            }
        }
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

const fn date_format_label(format: DateFormat) -> &'static str {
    match format {
        DateFormat::Relative => "relative",
        DateFormat::Absolute => "absolute",
    }
}

fn format_limit(speed_limit_bps: u64) -> String {
    if speed_limit_bps == 0 {
        "unlimited".to_string()
    } else {
        format_rate(speed_limit_bps)
    }
}

pub(crate) fn format_rate(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}
