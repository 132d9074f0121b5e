//! Broker-terminal abstraction for grid trading - enables mocking for tests

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::errors::GridResult;
use super::types::{
    ClosePositionRequest, OrderSide, PendingOrder, PendingOrderRequest, Position, Quote,
    TradeResult, TradeRetcode,
};

/// Terminal operations the grid cycle depends on
///
/// Implementations are shared between concurrently running bots, so every
/// method takes `&self` and must tolerate interleaved calls.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Current bid/ask, `None` when the symbol is unknown or the market is closed
    async fn get_quote(&self, symbol: &str) -> GridResult<Option<Quote>>;

    /// Open positions on `symbol`
    async fn list_positions(&self, symbol: &str) -> GridResult<Vec<Position>>;

    /// Resting pending orders on `symbol`
    async fn list_pending_orders(&self, symbol: &str) -> GridResult<Vec<PendingOrder>>;

    /// Margin the terminal would reserve for a hypothetical order
    async fn estimate_margin(
        &self,
        side: OrderSide,
        symbol: &str,
        volume: Decimal,
        price: Decimal,
    ) -> GridResult<Decimal>;

    /// Place a pending limit order
    async fn submit_pending(&self, request: &PendingOrderRequest) -> GridResult<TradeResult>;

    /// Close an open position with a market deal
    async fn close_position(&self, request: &ClosePositionRequest) -> GridResult<TradeResult>;

    /// Remove a pending order by ticket
    async fn cancel_pending(&self, ticket: u64) -> GridResult<TradeRetcode>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Mock connector for testing grid cycles without a terminal.
pub mod mock {
    use super::*;
    use crate::grid::errors::GridError;
    use crate::grid::types::retcode;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Scriptable connector
    ///
    /// `list_positions` pops from `position_script` first and falls back to
    /// `positions` once the script is exhausted; `list_pending_orders` does the
    /// same with `pending_script` and `pending`. Closing a position removes it
    /// from `positions`.
    pub struct MockConnector {
        pub quote: Mutex<Option<Quote>>,
        pub positions: Mutex<Vec<Position>>,
        pub position_script: Mutex<VecDeque<GridResult<Vec<Position>>>>,
        pub pending: Mutex<Vec<PendingOrder>>,
        pub pending_script: Mutex<VecDeque<Vec<PendingOrder>>>,
        /// Margin returned for every hypothetical order
        pub margin: Mutex<Decimal>,
        pub margin_failure: Mutex<Option<GridError>>,
        pub submitted: Mutex<Vec<PendingOrderRequest>>,
        pub closed: Mutex<Vec<ClosePositionRequest>>,
        pub cancelled: Mutex<Vec<u64>>,
        /// 0-based submission numbers to reject
        pub reject_submissions: Mutex<HashSet<usize>>,
        /// Per-ticket cancel override
        pub cancel_results: Mutex<HashMap<u64, GridResult<TradeRetcode>>>,
        pub position_calls: AtomicUsize,
        pub pending_calls: AtomicUsize,
        submissions: AtomicUsize,
        next_ticket: AtomicU64,
    }

    impl MockConnector {
        pub fn new(quote: Option<Quote>) -> Self {
            Self {
                quote: Mutex::new(quote),
                positions: Mutex::new(Vec::new()),
                position_script: Mutex::new(VecDeque::new()),
                pending: Mutex::new(Vec::new()),
                pending_script: Mutex::new(VecDeque::new()),
                margin: Mutex::new(Decimal::ZERO),
                margin_failure: Mutex::new(None),
                submitted: Mutex::new(Vec::new()),
                closed: Mutex::new(Vec::new()),
                cancelled: Mutex::new(Vec::new()),
                reject_submissions: Mutex::new(HashSet::new()),
                cancel_results: Mutex::new(HashMap::new()),
                position_calls: AtomicUsize::new(0),
                pending_calls: AtomicUsize::new(0),
                submissions: AtomicUsize::new(0),
                next_ticket: AtomicU64::new(1),
            }
        }

        pub async fn set_positions(&self, positions: Vec<Position>) {
            *self.positions.lock().await = positions;
        }

        pub async fn script_positions(&self, script: Vec<GridResult<Vec<Position>>>) {
            self.position_script.lock().await.extend(script);
        }

        pub async fn script_pending(&self, script: Vec<Vec<PendingOrder>>) {
            self.pending_script.lock().await.extend(script);
        }

        pub async fn set_margin(&self, margin: Decimal) {
            *self.margin.lock().await = margin;
        }

        pub async fn fail_margin(&self, err: GridError) {
            *self.margin_failure.lock().await = Some(err);
        }

        pub async fn reject_submission(&self, index: usize) {
            self.reject_submissions.lock().await.insert(index);
        }

        pub async fn set_cancel_result(&self, ticket: u64, result: GridResult<TradeRetcode>) {
            self.cancel_results.lock().await.insert(ticket, result);
        }

        pub fn position_calls(&self) -> usize {
            self.position_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BrokerConnector for MockConnector {
        async fn get_quote(&self, _symbol: &str) -> GridResult<Option<Quote>> {
            Ok(*self.quote.lock().await)
        }

        async fn list_positions(&self, _symbol: &str) -> GridResult<Vec<Position>> {
            self.position_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(next) = self.position_script.lock().await.pop_front() {
                return next;
            }
            Ok(self.positions.lock().await.clone())
        }

        async fn list_pending_orders(&self, _symbol: &str) -> GridResult<Vec<PendingOrder>> {
            self.pending_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(next) = self.pending_script.lock().await.pop_front() {
                return Ok(next);
            }
            Ok(self.pending.lock().await.clone())
        }

        async fn estimate_margin(
            &self,
            _side: OrderSide,
            _symbol: &str,
            _volume: Decimal,
            _price: Decimal,
        ) -> GridResult<Decimal> {
            if let Some(err) = self.margin_failure.lock().await.clone() {
                return Err(err);
            }
            Ok(*self.margin.lock().await)
        }

        async fn submit_pending(&self, request: &PendingOrderRequest) -> GridResult<TradeResult> {
            let n = self.submissions.fetch_add(1, Ordering::SeqCst);
            self.submitted.lock().await.push(request.clone());

            if self.reject_submissions.lock().await.contains(&n) {
                return Ok(TradeResult::rejected(retcode::INVALID_PRICE, "Invalid price"));
            }

            let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
            self.pending.lock().await.push(PendingOrder {
                ticket,
                symbol: request.symbol.clone(),
                side: request.side,
                price: request.price,
                volume: request.volume,
            });
            Ok(TradeResult::accepted(ticket, TradeRetcode::Placed))
        }

        async fn close_position(&self, request: &ClosePositionRequest) -> GridResult<TradeResult> {
            self.closed.lock().await.push(request.clone());
            let mut positions = self.positions.lock().await;
            let before = positions.len();
            positions.retain(|p| p.ticket != request.position_ticket);
            if positions.len() == before {
                return Ok(TradeResult::rejected(retcode::INVALID_ORDER, "Position not found"));
            }
            Ok(TradeResult::accepted(request.position_ticket, TradeRetcode::Done))
        }

        async fn cancel_pending(&self, ticket: u64) -> GridResult<TradeRetcode> {
            self.cancelled.lock().await.push(ticket);
            if let Some(result) = self.cancel_results.lock().await.get(&ticket) {
                return result.clone();
            }
            let mut pending = self.pending.lock().await;
            let before = pending.len();
            pending.retain(|o| o.ticket != ticket);
            if pending.len() == before {
                return Ok(TradeRetcode::AlreadyDone);
            }
            Ok(TradeRetcode::Done)
        }
    }

    /// Convenience constructor for test positions
    pub fn position(ticket: u64, side: OrderSide, profit: Decimal) -> Position {
        Position {
            ticket,
            symbol: "EURUSD".to_string(),
            side,
            volume: Decimal::new(1, 2),
            open_price: Decimal::new(11000, 4),
            profit,
        }
    }
}
