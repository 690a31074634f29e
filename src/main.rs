use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::info;

use peerlink::bot::{self, AppState, TelegramNotifier};
use peerlink::config::{AppConfig, LogFormat};
use peerlink::db::{self, PgUserStore};
use peerlink::dialogue::BotState;
use peerlink::localization;
use peerlink::registration::RegistrationController;
use peerlink::store::UserStore;

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    info!("Starting Peerlink Telegram Bot");

    localization::init_localization(&config.locales_dir)
        .context("Failed to load localization")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::init_database_schema(&pool).await?;

    let bot = Bot::new(config.bot_token.clone());
    let storage = InMemStorage::<BotState>::new();

    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let notifier = Arc::new(TelegramNotifier::new(bot.clone(), Arc::clone(&storage)));
    let controller = RegistrationController::new(
        Arc::clone(&store),
        notifier,
        config.registration_timeout,
    );

    info!(
        timeout_secs = config.registration_timeout.as_secs(),
        channel_configured = config.channel_id.is_some(),
        "Bot initialized, starting dispatcher"
    );

    let state = Arc::new(AppState {
        controller,
        store,
        config,
    });

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![state, storage])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
