//! Paper trading connector
//!
//! Simulates a terminal in memory: quotes are pushed in with `set_quote`,
//! pending limits fill when the quote crosses them, and open positions are
//! marked to market on every query.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::errors::{GridError, GridResult};
use super::executor::BrokerConnector;
use super::types::{
    retcode, ClosePositionRequest, OrderSide, PendingOrder, PendingOrderRequest, Position, Quote,
    TradeResult, TradeRetcode,
};

fn default_contract_size() -> Decimal {
    dec!(100000)
}

fn default_leverage() -> Decimal {
    dec!(100)
}

fn default_point() -> Decimal {
    dec!(0.00001)
}

/// Contract specification shared by every simulated symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Units per lot
    #[serde(default = "default_contract_size")]
    pub contract_size: Decimal,

    /// Account leverage used for margin
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,

    /// Price of one point, used to apply request deviation
    #[serde(default = "default_point")]
    pub point: Decimal,

    /// Quotes the book starts with
    #[serde(default)]
    pub quotes: Vec<InitialQuote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialQuote {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            contract_size: default_contract_size(),
            leverage: default_leverage(),
            point: default_point(),
            quotes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct PaperPosition {
    ticket: u64,
    symbol: String,
    side: OrderSide,
    volume: Decimal,
    open_price: Decimal,
}

#[derive(Debug, Default)]
struct PaperBook {
    quotes: HashMap<String, Quote>,
    orders: Vec<PendingOrder>,
    positions: Vec<PaperPosition>,
    realized_profit: Decimal,
    next_ticket: u64,
}

impl PaperBook {
    fn next_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Convert every resting limit the quote has crossed into a position
    fn match_orders(&mut self, symbol: &str, quote: Quote) {
        let (filled, resting): (Vec<_>, Vec<_>) =
            self.orders.drain(..).partition(|o| {
                o.symbol == symbol
                    && match o.side {
                        OrderSide::Buy => quote.ask <= o.price,
                        OrderSide::Sell => quote.bid >= o.price,
                    }
            });
        self.orders = resting;

        for order in filled {
            info!(
                "Paper fill: {} {} {} @ {} (ticket {})",
                order.side, order.volume, order.symbol, order.price, order.ticket
            );
            self.positions.push(PaperPosition {
                ticket: order.ticket,
                symbol: order.symbol,
                side: order.side,
                volume: order.volume,
                open_price: order.price,
            });
        }
    }
}

/// In-memory terminal for simulation and demos
pub struct PaperConnector {
    config: PaperConfig,
    book: Mutex<PaperBook>,
}

impl PaperConnector {
    pub fn new(config: PaperConfig) -> Self {
        let quotes = config
            .quotes
            .iter()
            .map(|q| (q.symbol.clone(), Quote::new(q.bid, q.ask)))
            .collect();
        Self {
            config,
            book: Mutex::new(PaperBook {
                quotes,
                ..PaperBook::default()
            }),
        }
    }

    /// Push a new quote and fill any crossed limits
    pub async fn set_quote(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        let quote = Quote::new(bid, ask);
        let mut book = self.book.lock().await;
        book.quotes.insert(symbol.to_string(), quote);
        book.match_orders(symbol, quote);
    }

    /// Profit booked by closed positions so far
    pub async fn realized_profit(&self) -> Decimal {
        self.book.lock().await.realized_profit
    }

    fn floating_profit(&self, position: &PaperPosition, quote: &Quote) -> Decimal {
        let diff = match position.side {
            OrderSide::Buy => quote.bid - position.open_price,
            OrderSide::Sell => position.open_price - quote.ask,
        };
        diff * position.volume * self.config.contract_size
    }
}

#[async_trait]
impl BrokerConnector for PaperConnector {
    async fn get_quote(&self, symbol: &str) -> GridResult<Option<Quote>> {
        Ok(self.book.lock().await.quotes.get(symbol).copied())
    }

    async fn list_positions(&self, symbol: &str) -> GridResult<Vec<Position>> {
        let book = self.book.lock().await;
        let Some(quote) = book.quotes.get(symbol) else {
            return Ok(Vec::new());
        };

        Ok(book
            .positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .map(|p| Position {
                ticket: p.ticket,
                symbol: p.symbol.clone(),
                side: p.side,
                volume: p.volume,
                open_price: p.open_price,
                profit: self.floating_profit(p, quote),
            })
            .collect())
    }

    async fn list_pending_orders(&self, symbol: &str) -> GridResult<Vec<PendingOrder>> {
        let book = self.book.lock().await;
        Ok(book
            .orders
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn estimate_margin(
        &self,
        _side: OrderSide,
        symbol: &str,
        volume: Decimal,
        price: Decimal,
    ) -> GridResult<Decimal> {
        if !self.book.lock().await.quotes.contains_key(symbol) {
            return Err(GridError::SymbolNotFound(symbol.to_string()));
        }
        Ok(volume * self.config.contract_size * price / self.config.leverage)
    }

    async fn submit_pending(&self, request: &PendingOrderRequest) -> GridResult<TradeResult> {
        let mut book = self.book.lock().await;
        let Some(quote) = book.quotes.get(&request.symbol).copied() else {
            return Ok(TradeResult::rejected(retcode::MARKET_CLOSED, "Market closed"));
        };

        if request.volume <= Decimal::ZERO {
            return Ok(TradeResult::rejected(retcode::INVALID_VOLUME, "Invalid volume"));
        }

        // A limit must rest on its own side of the market
        let crosses = match request.side {
            OrderSide::Buy => request.price >= quote.ask,
            OrderSide::Sell => request.price <= quote.bid,
        };
        if crosses {
            return Ok(TradeResult::rejected(retcode::INVALID_PRICE, "Invalid price"));
        }

        let ticket = book.next_ticket();
        book.orders.push(PendingOrder {
            ticket,
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price,
            volume: request.volume,
        });
        debug!(
            "Paper order {} placed: {} limit {} @ {}",
            ticket, request.side, request.symbol, request.price
        );
        Ok(TradeResult::accepted(ticket, TradeRetcode::Placed))
    }

    async fn close_position(&self, request: &ClosePositionRequest) -> GridResult<TradeResult> {
        let mut book = self.book.lock().await;
        let Some(quote) = book.quotes.get(&request.symbol).copied() else {
            return Ok(TradeResult::rejected(retcode::MARKET_CLOSED, "Market closed"));
        };
        let Some(index) = book
            .positions
            .iter()
            .position(|p| p.ticket == request.position_ticket)
        else {
            return Ok(TradeResult::rejected(retcode::POSITION_CLOSED, "Position doesn't exist"));
        };

        let position = &book.positions[index];
        if request.side != position.side.opposite() || request.volume != position.volume {
            return Ok(TradeResult::rejected(retcode::INVALID_VOLUME, "Invalid volume"));
        }

        // Fill-or-kill: only executes within `deviation` points of the market
        let market = quote.execution_price(request.side);
        let slippage = Decimal::from(request.deviation) * self.config.point;
        if (request.price - market).abs() > slippage {
            return Ok(TradeResult::rejected(retcode::PRICE_CHANGED, "Prices changed"));
        }

        let position = book.positions.remove(index);
        let profit = self.floating_profit(&position, &quote);
        book.realized_profit += profit;
        let deal = book.next_ticket();
        info!(
            "Paper close: position {} {} {} @ {}, profit {}",
            position.ticket, request.side, position.volume, market, profit
        );
        Ok(TradeResult::accepted(deal, TradeRetcode::Done))
    }

    async fn cancel_pending(&self, ticket: u64) -> GridResult<TradeRetcode> {
        let mut book = self.book.lock().await;
        let before = book.orders.len();
        book.orders.retain(|o| o.ticket != ticket);
        if book.orders.len() == before {
            return Ok(TradeRetcode::AlreadyDone);
        }
        Ok(TradeRetcode::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::config::{GridConfig, PollingConfig};
    use crate::grid::cycle::GridCycle;
    use crate::grid::types::{CycleOutcome, PriceLevel};
    use std::sync::Arc;
    use std::time::Duration;

    fn grid() -> GridConfig {
        GridConfig::new("EURUSD", dec!(0.01), dec!(1), 2, 1, 0)
    }

    fn limit(side: OrderSide, price: Decimal) -> PendingOrderRequest {
        grid().pending_request(&PriceLevel { side, index: 1, price })
    }

    fn connector() -> PaperConnector {
        PaperConnector::new(PaperConfig {
            quotes: vec![InitialQuote {
                symbol: "EURUSD".into(),
                bid: dec!(1.0999),
                ask: dec!(1.1001),
            }],
            ..PaperConfig::default()
        })
    }

    #[tokio::test]
    async fn test_submit_rejections() {
        let paper = PaperConnector::new(PaperConfig::default());
        let result = paper.submit_pending(&limit(OrderSide::Buy, dec!(1.09))).await.unwrap();
        assert_eq!(result.retcode.code(), retcode::MARKET_CLOSED);

        paper.set_quote("EURUSD", dec!(1.0999), dec!(1.1001)).await;
        let result = paper.submit_pending(&limit(OrderSide::Buy, dec!(1.1001))).await.unwrap();
        assert_eq!(result.retcode.code(), retcode::INVALID_PRICE);
        let result = paper.submit_pending(&limit(OrderSide::Sell, dec!(1.0999))).await.unwrap();
        assert_eq!(result.retcode.code(), retcode::INVALID_PRICE);

        let mut zero = limit(OrderSide::Buy, dec!(1.09));
        zero.volume = Decimal::ZERO;
        let result = paper.submit_pending(&zero).await.unwrap();
        assert_eq!(result.retcode.code(), retcode::INVALID_VOLUME);

        assert!(paper.list_pending_orders("EURUSD").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limit_fills_and_marks_to_market() {
        let paper = connector();
        let placed = paper.submit_pending(&limit(OrderSide::Buy, dec!(1.0990))).await.unwrap();
        assert_eq!(placed.retcode, TradeRetcode::Placed);
        assert!(paper.list_positions("EURUSD").await.unwrap().is_empty());

        paper.set_quote("EURUSD", dec!(1.0988), dec!(1.0990)).await;
        assert!(paper.list_pending_orders("EURUSD").await.unwrap().is_empty());

        paper.set_quote("EURUSD", dec!(1.1000), dec!(1.1002)).await;
        let positions = paper.list_positions("EURUSD").await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].ticket, placed.ticket.unwrap());
        assert_eq!(positions[0].open_price, dec!(1.0990));
        // (1.1000 - 1.0990) * 0.01 lots * 100000
        assert_eq!(positions[0].profit, dec!(1));

        let margin = paper
            .estimate_margin(OrderSide::Buy, "EURUSD", dec!(0.01), dec!(1.1))
            .await
            .unwrap();
        assert_eq!(margin, dec!(11));
    }

    #[tokio::test]
    async fn test_close_respects_deviation() {
        let paper = connector();
        paper.submit_pending(&limit(OrderSide::Sell, dec!(1.1005))).await.unwrap();
        paper.set_quote("EURUSD", dec!(1.1006), dec!(1.1008)).await;
        paper.set_quote("EURUSD", dec!(1.0998), dec!(1.1000)).await;
        let position = paper.list_positions("EURUSD").await.unwrap().remove(0);
        assert_eq!(position.side, OrderSide::Sell);

        let quote = paper.get_quote("EURUSD").await.unwrap().unwrap();
        let mut request = grid().close_request(&position, &quote);
        request.price = dec!(1.1010);
        let result = paper.close_position(&request).await.unwrap();
        assert_eq!(result.retcode.code(), retcode::PRICE_CHANGED);

        let request = grid().close_request(&position, &quote);
        let result = paper.close_position(&request).await.unwrap();
        assert_eq!(result.retcode, TradeRetcode::Done);
        assert!(paper.list_positions("EURUSD").await.unwrap().is_empty());
        // Short from 1.1005 bought back at 1.1000
        assert_eq!(paper.realized_profit().await, dec!(0.5));

        let result = paper.close_position(&request).await.unwrap();
        assert_eq!(result.retcode.code(), retcode::POSITION_CLOSED);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let paper = connector();
        let placed = paper.submit_pending(&limit(OrderSide::Buy, dec!(1.09))).await.unwrap();
        let ticket = placed.ticket.unwrap();

        assert_eq!(paper.cancel_pending(ticket).await.unwrap(), TradeRetcode::Done);
        assert_eq!(paper.cancel_pending(ticket).await.unwrap(), TradeRetcode::AlreadyDone);
    }

    #[tokio::test]
    async fn test_full_cycle_against_paper_terminal() {
        let paper = Arc::new(connector());
        let config = grid();
        let polling = PollingConfig {
            poll_interval_ms: 1,
            ..PollingConfig::immediate()
        };

        let task = {
            let paper = paper.clone();
            tokio::spawn(async move {
                GridCycle::new("paper", &config, &polling, paper.as_ref())
                    .run(1)
                    .await
            })
        };

        // Wait for the four legs to rest
        tokio::time::timeout(Duration::from_secs(5), async {
            while paper.list_pending_orders("EURUSD").await.unwrap().len() < 4 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        // Dip through the first buy level (1.09989), then recover below the first sell
        paper.set_quote("EURUSD", dec!(1.09970), dec!(1.09985)).await;
        paper.set_quote("EURUSD", dec!(1.10005), dec!(1.10010)).await;

        let report = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(report.levels_accepted, 4);
        assert_eq!(report.outcome, CycleOutcome::TakeProfitHit);
        assert_eq!(report.orders_cancelled, 3);
        assert!(paper.list_pending_orders("EURUSD").await.unwrap().is_empty());
        // (1.10005 - 1.09989) * 0.01 * 100000
        assert_eq!(paper.realized_profit().await, dec!(0.16));
    }
}
