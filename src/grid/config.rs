//! Grid trading configuration

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::{GridError, GridResult};
use super::types::{
    ClosePositionRequest, FillPolicy, PendingOrderRequest, Position, PriceLevel, Quote,
    TimeInForce,
};

fn default_magic() -> u64 {
    100
}

fn default_deviation() -> u32 {
    20
}

fn default_open_comment() -> String {
    "grid open".to_string()
}

fn default_close_comment() -> String {
    "grid close".to_string()
}

/// Grid bot configuration, immutable once a bot starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Terminal symbol (e.g., "EURUSD")
    pub symbol: String,

    /// Lot size of every grid leg
    pub volume: Decimal,

    /// Return on margin (percent) that triggers liquidation
    pub take_profit_pct: Decimal,

    /// Levels per side of mid
    pub level_count: u32,

    /// Number of grid cycles to run
    pub cycle_count: u32,

    /// Pause between cycles
    #[serde(default)]
    pub inter_cycle_delay_seconds: u64,

    /// Expert magic number stamped on every request
    #[serde(default = "default_magic")]
    pub magic: u64,

    /// Allowed slippage in points
    #[serde(default = "default_deviation")]
    pub deviation: u32,

    #[serde(default = "default_open_comment")]
    pub open_comment: String,

    #[serde(default = "default_close_comment")]
    pub close_comment: String,
}

impl GridConfig {
    /// Create a configuration with default request stamping
    pub fn new(
        symbol: impl Into<String>,
        volume: Decimal,
        take_profit_pct: Decimal,
        level_count: u32,
        cycle_count: u32,
        inter_cycle_delay_seconds: u64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            volume,
            take_profit_pct,
            level_count,
            cycle_count,
            inter_cycle_delay_seconds,
            magic: default_magic(),
            deviation: default_deviation(),
            open_comment: default_open_comment(),
            close_comment: default_close_comment(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> GridResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(GridError::InvalidConfig("symbol cannot be empty".into()));
        }

        if self.volume <= Decimal::ZERO {
            return Err(GridError::InvalidConfig("volume must be positive".into()));
        }

        if self.take_profit_pct <= Decimal::ZERO {
            return Err(GridError::InvalidConfig(
                "take_profit_pct must be positive".into(),
            ));
        }

        if self.level_count == 0 {
            return Err(GridError::InvalidConfig(
                "level_count must be at least 1".into(),
            ));
        }

        if self.cycle_count == 0 {
            return Err(GridError::InvalidConfig(
                "cycle_count must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Pending orders submitted per cycle (both sides)
    pub fn legs_per_cycle(&self) -> usize {
        self.level_count as usize * 2
    }

    pub fn inter_cycle_delay(&self) -> Duration {
        Duration::from_secs(self.inter_cycle_delay_seconds)
    }

    /// Build the GTC pending limit order for one grid level
    pub fn pending_request(&self, level: &PriceLevel) -> PendingOrderRequest {
        PendingOrderRequest {
            symbol: self.symbol.clone(),
            side: level.side,
            volume: self.volume,
            price: level.price,
            magic: self.magic,
            deviation: self.deviation,
            comment: self.open_comment.clone(),
            time_in_force: TimeInForce::Gtc,
            filling: FillPolicy::Return,
        }
    }

    /// Build the fill-or-kill market deal that flattens `position`
    ///
    /// A long is sold at the bid, a short is bought back at the ask.
    pub fn close_request(&self, position: &Position, quote: &Quote) -> ClosePositionRequest {
        let side = position.side.opposite();
        ClosePositionRequest {
            position_ticket: position.ticket,
            symbol: position.symbol.clone(),
            side,
            volume: position.volume,
            price: quote.execution_price(side),
            magic: self.magic,
            deviation: self.deviation,
            comment: self.close_comment.clone(),
            filling: FillPolicy::FillOrKill,
        }
    }
}

/// Polling cadence of the cycle state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Sleep between activation and monitoring polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait after placing the grid before the first activation poll
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Empty polls (no positions, no orders) tolerated before the grid is void
    #[serde(default = "default_activation_empty_poll_cap")]
    pub activation_empty_poll_cap: u32,

    /// Give up waiting for a fill after this many polls; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_timeout_polls: Option<u64>,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_activation_empty_poll_cap() -> u32 {
    11
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            activation_empty_poll_cap: default_activation_empty_poll_cap(),
            activation_timeout_polls: None,
        }
    }
}

impl PollingConfig {
    /// Zero-delay polling, for simulations and tests
    pub fn immediate() -> Self {
        Self {
            poll_interval_ms: 0,
            settle_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Operator-entered parameters, exactly as typed
#[derive(Debug, Clone, Default)]
pub struct RawGridParams {
    pub symbol: String,
    pub volume: String,
    pub take_profit_pct: String,
    pub level_count: String,
    pub cycle_count: String,
    pub inter_cycle_delay_seconds: String,
}

fn parse_field<T: FromStr>(field: &str, raw: &str) -> GridResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| GridError::InvalidConfig(format!("{} is not a valid number: '{}'", field, raw)))
}

impl TryFrom<RawGridParams> for GridConfig {
    type Error = GridError;

    fn try_from(raw: RawGridParams) -> GridResult<Self> {
        let delay: i64 = parse_field("inter_cycle_delay_seconds", &raw.inter_cycle_delay_seconds)?;
        if delay < 0 {
            return Err(GridError::InvalidConfig(
                "inter_cycle_delay_seconds cannot be negative".into(),
            ));
        }

        let config = GridConfig::new(
            raw.symbol.trim(),
            parse_field("volume", &raw.volume)?,
            parse_field("take_profit_pct", &raw.take_profit_pct)?,
            parse_field("level_count", &raw.level_count)?,
            parse_field("cycle_count", &raw.cycle_count)?,
            delay as u64,
        );
        config.validate()?;
        Ok(config)
    }
}
