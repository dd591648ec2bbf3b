use std::process::ExitCode;
use std::sync::Arc;

use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use strikeguard::config::BotConfig;
use strikeguard::store::{RecordStore, YamlRecordStore};
use strikeguard::{BOT_NAME, Data, ERROR_TARGET, Error, handlers, logging};
use tracing::{error, info};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    logging::init()?;

    let config = BotConfig::from_env()?;
    let token = config.token.clone();

    let store: Arc<dyn RecordStore> = Arc::new(YamlRecordStore::open(config.storage_path.clone()).await?);
    let data = Data::new(config, store);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    if let Err(e) = poise::builtins::on_error(error).await {
                        error!(target: ERROR_TARGET, "Error while handling framework error: {e}");
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, _framework| {
            Box::pin(async move {
                let definitions = data.registry.definitions();
                let count = definitions.len();
                serenity::Command::set_global_commands(ctx, definitions).await?;
                logging::log_console(format!("Registered {count} slash commands"));
                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MODERATION;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting {BOT_NAME}...");
    client.start().await?;
    Ok(())
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error building runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: ERROR_TARGET, "Fatal: {err}");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
