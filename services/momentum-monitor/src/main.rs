//! Momentum Monitor service
//!
//! 1. Loads settings (defaults, config file, env)
//! 2. Builds the Binance klines source and the Telegram notifier
//! 3. Runs the polling loop in the background
//! 4. Serves the JSON query API

use momentum_monitor::notify::{LogNotifier, NotificationChannel, TelegramConfig, TelegramNotifier};
use momentum_monitor::{api, Monitor, RecipientDirectory, Settings, SystemClock};
use market_data::BinanceKlinesClient;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting Momentum Monitor...");

    let settings = Settings::new()?;
    info!(
        "Tracking {} symbols on {:?}",
        settings.symbols.len(),
        settings.intervals.iter().map(|i| i.as_str()).collect::<Vec<_>>()
    );

    let source = Arc::new(BinanceKlinesClient::new(settings.binance_url.clone())?);
    info!("✓ Binance klines client initialized ({})", settings.binance_url);

    let notifier: Arc<dyn NotificationChannel> = match &settings.telegram.token {
        Some(token) => {
            let notifier = TelegramNotifier::new(TelegramConfig::new(token.clone()))?;
            info!("✓ Telegram notifier initialized");
            Arc::new(notifier)
        }
        None => {
            warn!("⚠ TELEGRAM_TOKEN not set, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let recipients = RecipientDirectory::new(
        &settings.telegram.chat_ids,
        settings.telegram.topic_group_id.as_deref(),
        settings.telegram.thread_id,
    )
    .with_subscriber_file(settings.subscribers_file.as_deref().map(Path::new));
    info!("✓ {} recipients", recipients.all().len());

    let monitor = Arc::new(Monitor::new(
        &settings,
        source,
        notifier,
        recipients,
        Arc::new(SystemClock),
    ));

    tokio::spawn(monitor.clone().run());

    let app = api::router(monitor);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    info!("🚀 Momentum Monitor listening on port {}", settings.port);

    axum::serve(listener, app).await?;

    Ok(())
}
