use anyhow::{Context, anyhow};
use sluice_api_models::DisplayPreferences;
use sluice_panel::DisplayPreferencesManager;

use crate::cli::{OutputFormat, PrefsSetArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_preferences;

pub(crate) async fn handle_prefs_get(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let prefs = ctx.api.display_preferences().await?;
    render_preferences(&prefs, format)
}

pub(crate) async fn handle_prefs_set(ctx: &AppContext, args: PrefsSetArgs) -> CliResult<()> {
    let payload = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))
        .map_err(CliError::failure)?;

    let prefs: DisplayPreferences = serde_json::from_str(&payload).map_err(|err| {
        CliError::validation(format!("preferences file is not valid JSON: {err}"))
    })?;

    let manager = DisplayPreferencesManager::new(ctx.api.clone());
    let outcome = manager.save(prefs).await;
    if outcome.success {
        println!(
            "{}",
            outcome
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "display preferences saved".to_string())
        );
        Ok(())
    } else {
        let message = outcome
            .message
            .unwrap_or_else(|| "saving display preferences failed".to_string());
        Err(CliError::failure(anyhow!(message)))
    }
}
