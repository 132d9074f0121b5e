//! Grid Trading Bot Binary
//!
//! Runs every bot listed in the settings file against the paper terminal,
//! with a synthetic price feed swinging each seeded quote around its start.
//!
//! ## Run
//!
//! ```bash
//! cargo run --bin grid_bot -- --config config.toml
//! ```
//!
//! Press Ctrl-C to stop the bots at their next cycle boundary.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;

use terminal_grid_bot::config::Settings;
use terminal_grid_bot::grid::{spawn_bot, InitialQuote, PaperConnector};

/// Relative swing of the synthetic feed around each seeded mid
const PRICE_SWING: f64 = 0.0005;
const PRICE_TICK: Duration = Duration::from_millis(500);
const QUOTE_DECIMALS: u32 = 5;

#[tokio::main]
async fn main() {
    // Load .env file
    let dotenv = dotenvy::dotenv();

    // Parse arguments
    let args: Vec<String> = env::args().collect();
    let config_path = if args.len() > 2 && args[1] == "--config" {
        args[2].clone()
    } else {
        "config.toml".to_string()
    };

    let settings = match Settings::new(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load config '{}': {}", config_path, e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log.level))
        .init();

    match dotenv {
        Ok(path) => info!("Loaded environment from: {}", path.display()),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    if let Err(e) = settings.validate() {
        error!("Invalid settings in {}: {}", config_path, e);
        std::process::exit(1);
    }

    let connector = Arc::new(PaperConnector::new(settings.paper.clone()));
    for bot in &settings.bots {
        if !settings.paper.quotes.iter().any(|q| q.symbol == bot.grid.symbol) {
            warn!(
                "[{}] No paper quote seeded for {}, its grids will never be placed",
                bot.name, bot.grid.symbol
            );
        }
    }
    let price_feed = spawn_price_feed(connector.clone(), settings.paper.quotes.clone());

    let mut handles = Vec::with_capacity(settings.bots.len());
    for bot in &settings.bots {
        match spawn_bot(
            bot.name.clone(),
            bot.grid.clone(),
            settings.polling.clone(),
            connector.clone(),
        ) {
            Ok(handle) => handles.push(handle),
            Err(e) => error!("[{}] Failed to start: {}", bot.name, e),
        }
    }
    info!("Started {} grid bots", handles.len());

    // Wait for every bot to finish, or for Ctrl-C
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Ctrl-C received, stopping bots after their current cycle"),
                    Err(e) => error!("Failed to listen for Ctrl-C, stopping bots: {}", e),
                }
                for handle in &handles {
                    handle.stop();
                }
                break;
            }
            _ = tokio::time::sleep(PRICE_TICK) => {
                if handles.iter().all(|h| h.is_finished()) {
                    break;
                }
            }
        }
    }

    for handle in handles {
        let name = handle.name().to_string();
        match handle.join().await {
            Ok(report) => {
                info!(
                    "[{}] {} cycles, {} take-profit, stop reason {:?}",
                    report.name,
                    report.cycles.len(),
                    report.take_profit_cycles(),
                    report.stop_reason
                );
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => debug!("[{}] Report:\n{}", name, json),
                    Err(e) => warn!("[{}] Failed to serialize report: {}", name, e),
                }
            }
            Err(e) => error!("[{}] {}", name, e),
        }
    }

    price_feed.abort();
    info!("Paper realized profit: {}", connector.realized_profit().await);
}

/// Swing each seeded quote sinusoidally around its starting mid
fn spawn_price_feed(connector: Arc<PaperConnector>, quotes: Vec<InitialQuote>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRICE_TICK);
        let mut step: u64 = 0;
        loop {
            ticker.tick().await;
            step += 1;
            let phase = step as f64 / 20.0;

            for (i, quote) in quotes.iter().enumerate() {
                let (Some(bid), Some(ask)) = (quote.bid.to_f64(), quote.ask.to_f64()) else {
                    continue;
                };
                let factor = 1.0 + PRICE_SWING * (phase + i as f64).sin();
                let (Some(bid), Some(ask)) = (
                    Decimal::from_f64(bid * factor),
                    Decimal::from_f64(ask * factor),
                ) else {
                    continue;
                };

                let (bid, ask) = (bid.round_dp(QUOTE_DECIMALS), ask.round_dp(QUOTE_DECIMALS));
                debug!("Paper quote {}: {} / {}", quote.symbol, bid, ask);
                connector.set_quote(&quote.symbol, bid, ask).await;
            }
        }
    })
}
