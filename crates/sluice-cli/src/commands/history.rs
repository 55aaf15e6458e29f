use sluice_panel::{DisplayPreferencesManager, HistoryPage, ViewState};

use crate::cli::{HistoryListArgs, ItemArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::report_mutation;
use crate::output::render_history_page;

pub(crate) async fn handle_history_list(
    ctx: &AppContext,
    args: HistoryListArgs,
    format: OutputFormat,
) -> CliResult<()> {
    if args.limit == 0 {
        return Err(CliError::validation("--limit must be at least 1"));
    }

    let prefs = DisplayPreferencesManager::new(ctx.api.clone()).load().await;
    let response = ctx.api.history(args.limit).await?;

    let mut view = ViewState::new(prefs.history.per_page);
    view.replace_list(response.history);
    view.set_filter(args.list.filter.as_deref().unwrap_or_default());
    view.set_page(args.list.page);
    render_history_page(&HistoryPage::from_view(&view, prefs.history), format)
}

pub(crate) async fn handle_history_delete(ctx: &AppContext, args: ItemArgs) -> CliResult<()> {
    let id = args.id.trim();
    if id.is_empty() {
        return Err(CliError::validation("history id must not be empty"));
    }
    let response = ctx.api.delete_history(id).await?;
    report_mutation(&response, &format!("history record deleted (id: {id})"));
    Ok(())
}

pub(crate) async fn handle_history_clear(ctx: &AppContext) -> CliResult<()> {
    let response = ctx.api.clear_history().await?;
    report_mutation(&response, "history cleared");
    Ok(())
}
