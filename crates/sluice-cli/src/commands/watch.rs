use std::sync::Arc;

use anyhow::anyhow;
use sluice_panel::{Panel, PanelConfig, PanelDeps, TokioTimerFactory};
use tracing::info;

use crate::cli::{OutputFormat, WatchArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{CliNotifier, TerminalRenderer};

pub(crate) async fn handle_watch(
    ctx: &AppContext,
    args: WatchArgs,
    format: OutputFormat,
) -> CliResult<()> {
    if args.history_limit == 0 {
        return Err(CliError::validation("--history-limit must be at least 1"));
    }

    let panel = Panel::new(
        PanelDeps {
            transport: Arc::clone(&ctx.transport),
            timers: Arc::new(TokioTimerFactory),
            notifier: Arc::new(CliNotifier),
            renderer: Arc::new(TerminalRenderer::new(format)),
        },
        PanelConfig {
            history_limit: args.history_limit,
        },
    );

    panel.start().await;
    if let Some(filter) = args.filter.as_deref() {
        panel.set_queue_filter(filter);
    }
    if args.page > 1 {
        panel.set_queue_page(args.page);
    }
    if let Some(filter) = args.history_filter.as_deref() {
        panel.set_history_filter(filter);
    }
    info!("watching; press Ctrl-C to stop");

    let signal = tokio::signal::ctrl_c().await;
    panel.stop();
    signal.map_err(|err| CliError::failure(anyhow!("failed to wait for Ctrl-C: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    use crate::client::tests::context_with;

    #[tokio::test]
    async fn zero_history_limit_is_rejected_before_polling() {
        let server = MockServer::start_async().await;
        let ctx = context_with(&server, None);
        let args = WatchArgs {
            filter: None,
            page: 1,
            history_filter: None,
            history_limit: 0,
        };
        let err = handle_watch(&ctx, args, OutputFormat::Table)
            .await
            .expect_err("zero limit must fail");
        assert_eq!(err.exit_code(), 2);
    }
}
