use sluice_api_models::Priority;
use sluice_panel::{DisplayPreferencesManager, QueuePage, SelectionStore, SingleAction, ViewState};

use crate::cli::{BulkArgs, ItemArgs, ListArgs, OutputFormat, PriorityArgs, SpeedLimitArgs};
use crate::client::{AppContext, CliError, CliResult, parse_ids};
use crate::commands::report_mutation;
use crate::output::{render_queue_page, render_speed_limit, render_status};

pub(crate) async fn handle_queue_list(
    ctx: &AppContext,
    args: ListArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let prefs = DisplayPreferencesManager::new(ctx.api.clone()).load().await;
    let snapshot = ctx.api.poll().await?;

    let mut view = ViewState::new(prefs.queue.per_page);
    view.replace_list(snapshot.queue);
    view.set_filter(args.filter.as_deref().unwrap_or_default());
    view.set_page(args.page);
    let page = QueuePage::from_view(&view, &SelectionStore::new());

    if format == OutputFormat::Table {
        render_status(&snapshot.status, format)?;
    }
    render_queue_page(&page, format)
}

pub(crate) async fn handle_single_action(
    ctx: &AppContext,
    action: SingleAction,
    args: ItemArgs,
) -> CliResult<()> {
    let id = args.id.trim();
    if id.is_empty() {
        return Err(CliError::validation("item id must not be empty"));
    }

    let response = match action {
        SingleAction::Pause => ctx.api.pause(id).await?,
        SingleAction::Resume => ctx.api.resume(id).await?,
        SingleAction::Remove => ctx.api.remove(id).await?,
    };
    report_mutation(&response, &format!("{} requested (id: {id})", action.as_str()));
    Ok(())
}

pub(crate) async fn handle_bulk_priority(ctx: &AppContext, args: PriorityArgs) -> CliResult<()> {
    let ids = parse_ids(&args.targets.ids)?;
    let priority = Priority::from(args.priority);

    let response = match ids.as_slice() {
        [id] => ctx.api.set_priority(id, priority).await?,
        _ => ctx.api.bulk_priority(&ids, priority).await?,
    };
    report_mutation(
        &response,
        &format!("priority set to {} for {} item(s)", priority.as_str(), ids.len()),
    );
    Ok(())
}

pub(crate) async fn handle_bulk_delete(ctx: &AppContext, args: BulkArgs) -> CliResult<()> {
    let ids = parse_ids(&args.ids)?;
    let response = ctx.api.bulk_delete(&ids).await?;
    report_mutation(&response, &format!("{} item(s) removed", ids.len()));
    Ok(())
}

pub(crate) async fn handle_pause_all(ctx: &AppContext) -> CliResult<()> {
    let response = ctx.api.pause_all().await?;
    report_mutation(&response, "queue paused");
    Ok(())
}

pub(crate) async fn handle_resume_all(ctx: &AppContext) -> CliResult<()> {
    let response = ctx.api.resume_all().await?;
    report_mutation(&response, "queue resumed");
    Ok(())
}

pub(crate) async fn handle_speed_limit(
    ctx: &AppContext,
    args: SpeedLimitArgs,
    format: OutputFormat,
) -> CliResult<()> {
    match args.bytes_per_second {
        None => {
            let limit = ctx.api.speed_limit().await?;
            render_speed_limit(limit.speed_limit_bps, format)
        }
        Some(bps) => {
            let response = ctx.api.set_speed_limit(bps).await?;
            report_mutation(&response, "speed limit updated");
            Ok(())
        }
    }
}
