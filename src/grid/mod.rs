//! Cycling symmetric grid bot for trading-terminal pending orders
//!
//! Each cycle places `level_count` buy limits below mid and `level_count`
//! sell limits above it, waits for a fill, watches per-side return on margin
//! and liquidates everything once either side reaches the take-profit
//! percentage. A bot repeats this `cycle_count` times.
//!
//! # Architecture
//!
//! - [`config`] - Grid configuration, polling cadence and parameter parsing
//! - [`types`] - Core data types (PriceLevel, Position, TradeResult, etc.)
//! - [`errors`] - Grid-specific error types
//! - [`strategy`] - Symmetric level calculation
//! - [`accountant`] - Per-side profit and margin aggregation
//! - [`executor`] - Terminal abstraction (mockable for testing)
//! - [`cycle`] - One grid cycle as a phase state machine
//! - [`runner`] - Repeats cycles on a task, with a stop handle
//! - [`paper`] - In-memory terminal for simulation
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use terminal_grid_bot::grid::{spawn_bot, GridConfig, PaperConfig, PaperConnector, PollingConfig};
//! use rust_decimal_macros::dec;
//!
//! let connector = Arc::new(PaperConnector::new(PaperConfig::default()));
//! connector.set_quote("EURUSD", dec!(1.09995), dec!(1.10005)).await;
//!
//! // 5 levels per side, 0.01 lots, close at 2% return on margin, 3 cycles
//! let config = GridConfig::new("EURUSD", dec!(0.01), dec!(2), 5, 3, 30);
//! let handle = spawn_bot("eurusd", config, PollingConfig::default(), connector)?;
//!
//! let report = handle.join().await?;
//! ```

pub mod accountant;
pub mod config;
pub mod cycle;
pub mod errors;
pub mod executor;
pub mod paper;
pub mod runner;
pub mod strategy;
pub mod types;

// Re-export commonly used types
pub use accountant::{percent_return, summarize_side, SideSummary};
pub use config::{GridConfig, PollingConfig, RawGridParams};
pub use cycle::GridCycle;
pub use errors::{GridError, GridResult};
pub use executor::BrokerConnector;
pub use paper::{InitialQuote, PaperConfig, PaperConnector};
pub use runner::{spawn_bot, BotHandle, BotRunner};
pub use strategy::{compute_levels, LEVEL_STEP};
pub use types::{
    BotReport, ClosePositionRequest, CycleOutcome, CyclePhase, CycleReport, OrderSide,
    PendingOrder, PendingOrderRequest, Position, PriceLevel, Quote, StopReason, TradeResult,
    TradeRetcode,
};
