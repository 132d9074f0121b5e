//! Core data types for grid trading

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal return codes the bot distinguishes
pub mod retcode {
    pub const PLACED: u32 = 10008;
    pub const DONE: u32 = 10009;
    pub const INVALID_VOLUME: u32 = 10014;
    pub const INVALID_PRICE: u32 = 10015;
    pub const MARKET_CLOSED: u32 = 10018;
    pub const PRICE_CHANGED: u32 = 10020;
    pub const INVALID_ORDER: u32 = 10035;
    pub const POSITION_CLOSED: u32 = 10036;
}

/// Order side for grid levels and positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One limit price of the grid, produced fresh every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub side: OrderSide,
    /// Distance from mid in grid steps (1 = nearest)
    pub index: u32,
    pub price: Decimal,
}

/// Best bid/ask for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Quote {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self { bid, ask }
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Price a market order on `side` executes at
    pub fn execution_price(&self, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => self.ask,
            OrderSide::Sell => self.bid,
        }
    }
}

/// Open position snapshot, owned by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub volume: Decimal,
    pub open_price: Decimal,
    /// Floating profit in account currency
    pub profit: Decimal,
}

/// Resting pending order snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub ticket: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled
    Gtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPolicy {
    FillOrKill,
    /// Partial fills allowed, remainder stays on the book
    Return,
}

/// Request to place one grid leg
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: Decimal,
    pub price: Decimal,
    pub magic: u64,
    pub deviation: u32,
    pub comment: String,
    pub time_in_force: TimeInForce,
    pub filling: FillPolicy,
}

/// Request to liquidate an open position at market
#[derive(Debug, Clone, PartialEq)]
pub struct ClosePositionRequest {
    pub position_ticket: u64,
    pub symbol: String,
    /// Side of the closing deal (opposite of the position)
    pub side: OrderSide,
    pub volume: Decimal,
    pub price: Decimal,
    pub magic: u64,
    pub deviation: u32,
    pub comment: String,
    pub filling: FillPolicy,
}

/// Terminal verdict on a trade request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeRetcode {
    /// Pending order accepted onto the book
    Placed,
    /// Request executed
    Done,
    /// Target no longer exists or was already processed
    AlreadyDone,
    Rejected { code: u32, comment: String },
}

impl TradeRetcode {
    pub fn code(&self) -> u32 {
        match self {
            TradeRetcode::Placed => retcode::PLACED,
            TradeRetcode::Done => retcode::DONE,
            TradeRetcode::AlreadyDone => retcode::INVALID_ORDER,
            TradeRetcode::Rejected { code, .. } => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TradeRetcode::Placed | TradeRetcode::Done)
    }
}

/// Result of a submit or close request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeResult {
    /// Order or deal ticket assigned by the terminal
    pub ticket: Option<u64>,
    pub retcode: TradeRetcode,
}

impl TradeResult {
    pub fn accepted(ticket: u64, retcode: TradeRetcode) -> Self {
        Self { ticket: Some(ticket), retcode }
    }

    pub fn rejected(code: u32, comment: impl Into<String>) -> Self {
        Self {
            ticket: None,
            retcode: TradeRetcode::Rejected { code, comment: comment.into() },
        }
    }
}

/// Phase of a single grid cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    Placing,
    AwaitingActivation,
    Monitoring,
    Closing,
    CoolingDown,
}

/// Why a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    /// This bot liquidated after a side reached the target
    TakeProfitHit,
    /// Grid never produced a position or a resting order
    NoActivity,
    /// Activation wait ran past its poll limit
    Timeout,
    /// Positions went flat without a take-profit trigger from this bot
    ClosedExternally,
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u32,
    pub levels_requested: usize,
    pub levels_accepted: usize,
    pub take_profit_triggers: u32,
    pub orders_cancelled: usize,
    pub outcome: CycleOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Why a bot stopped running cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Completed,
    StopRequested,
    Failed(String),
}

/// Final report of a bot instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotReport {
    pub name: String,
    pub symbol: String,
    pub cycles: Vec<CycleReport>,
    pub stop_reason: StopReason,
}

impl BotReport {
    pub fn take_profit_cycles(&self) -> usize {
        self.cycles
            .iter()
            .filter(|c| c.outcome == CycleOutcome::TakeProfitHit)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_mid_and_execution_price() {
        let quote = Quote::new(dec!(1.0999), dec!(1.1001));
        assert_eq!(quote.mid(), dec!(1.1000));
        assert_eq!(quote.execution_price(OrderSide::Buy), dec!(1.1001));
        assert_eq!(quote.execution_price(OrderSide::Sell), dec!(1.0999));
    }

    #[test]
    fn test_retcode_success() {
        assert!(TradeRetcode::Placed.is_success());
        assert!(TradeRetcode::Done.is_success());
        assert!(!TradeRetcode::AlreadyDone.is_success());
        let rejected = TradeResult::rejected(retcode::INVALID_PRICE, "Invalid price");
        assert!(!rejected.retcode.is_success());
        assert_eq!(rejected.retcode.code(), 10015);
    }

    #[test]
    fn test_opposite_side() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }
}
