use crate::error::ModerationError;
use crate::interaction::InboundInteraction;
use crate::{COMMAND_TARGET, CONSOLE_TARGET, ERROR_TARGET};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log directory name
pub const LOG_DIR: &str = "logs";
/// Interaction log file name
pub const COMMAND_LOG_FILE: &str = "commands";

/// Initialize the logging system with console and file outputs
///
/// # Errors
///
/// Fails when the log directory cannot be created.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !Path::new(LOG_DIR).exists() {
        std::fs::create_dir_all(LOG_DIR)?;
    }

    let command_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, COMMAND_LOG_FILE);

    // Human-readable console output
    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    // JSON interaction log
    let command_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(command_file);

    // Default to INFO, keep serenity's heartbeat chatter out
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let filter = EnvFilter::new("info");
        match "serenity=error".parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(command_layer)
        .init();

    info!("Logging system initialized");
    Ok(())
}

fn guild_label(interaction: &InboundInteraction) -> String {
    interaction
        .guild_id
        .map_or_else(|| "DM".to_string(), |id| id.get().to_string())
}

/// Log the start of an interaction
pub fn log_interaction_start(interaction: &InboundInteraction, name: Option<&str>) {
    info!(
        target: COMMAND_TARGET,
        command = %name.unwrap_or("unknown"),
        kind = %interaction.kind.label(),
        guild_id = %guild_label(interaction),
        user_id = %interaction.actor.id.get(),
        event = "start",
        "Interaction started"
    );
}

/// Log the end of an interaction
pub fn log_interaction_end(interaction: &InboundInteraction, name: Option<&str>, started: Instant) {
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or_default();
    info!(
        target: COMMAND_TARGET,
        command = %name.unwrap_or("unknown"),
        kind = %interaction.kind.label(),
        guild_id = %guild_label(interaction),
        user_id = %interaction.actor.id.get(),
        duration_ms = duration_ms,
        event = "end",
        "Interaction completed"
    );
}

/// Log a failed interaction. Expected business failures are warnings, the rest errors.
pub fn log_interaction_error(
    interaction: &InboundInteraction,
    name: Option<&str>,
    failure: &ModerationError,
) {
    if failure.is_expected() {
        warn!(
            target: ERROR_TARGET,
            command = %name.unwrap_or("unknown"),
            kind = %interaction.kind.label(),
            guild_id = %guild_label(interaction),
            user_id = %interaction.actor.id.get(),
            error = %failure,
            "Interaction rejected"
        );
    } else {
        error!(
            target: ERROR_TARGET,
            command = %name.unwrap_or("unknown"),
            kind = %interaction.kind.label(),
            guild_id = %guild_label(interaction),
            user_id = %interaction.actor.id.get(),
            error = %failure,
            "Interaction error"
        );
    }
}

pub fn log_console(message: String) {
    info!(
        target: CONSOLE_TARGET,
        message = %message,
        event = "console",
    );
}
