//! Grid cycle state machine
//!
//! One cycle walks `Placing -> AwaitingActivation -> Monitoring -> Closing`
//! and stops on entering `CoolingDown`; the runner performs the delay so it
//! can observe stop requests while waiting.

use chrono::Utc;
use log::{debug, error, info, warn};

use super::accountant::summarize_side;
use super::config::{GridConfig, PollingConfig};
use super::errors::GridResult;
use super::executor::BrokerConnector;
use super::strategy::compute_levels;
use super::types::{CycleOutcome, CyclePhase, CycleReport, OrderSide, Position, TradeRetcode};

/// Drives a single grid cycle against a connector
pub struct GridCycle<'a, C: BrokerConnector + ?Sized> {
    name: &'a str,
    config: &'a GridConfig,
    polling: &'a PollingConfig,
    connector: &'a C,
}

impl<'a, C: BrokerConnector + ?Sized> GridCycle<'a, C> {
    pub fn new(
        name: &'a str,
        config: &'a GridConfig,
        polling: &'a PollingConfig,
        connector: &'a C,
    ) -> Self {
        Self {
            name,
            config,
            polling,
            connector,
        }
    }

    /// Run cycle number `cycle` (1-based) up to cool-down
    ///
    /// Non-transient connector errors from activation or monitoring polls
    /// escape as `Err` once the remaining pending orders are cancelled;
    /// everything else is logged and absorbed.
    pub async fn run(&self, cycle: u32) -> GridResult<CycleReport> {
        let started_at = Utc::now();
        info!(
            "[{}] Starting cycle {}/{} on {}",
            self.name, cycle, self.config.cycle_count, self.config.symbol
        );

        let mut phase = CyclePhase::Placing;
        let mut levels_accepted = 0;
        let mut take_profit_triggers = 0;
        let mut outcome = CycleOutcome::NoActivity;
        let mut orders_cancelled = 0;
        let mut failure = None;

        loop {
            debug!("[{}] cycle {} phase {:?}", self.name, cycle, phase);
            phase = match phase {
                CyclePhase::Placing => {
                    levels_accepted = self.place_grid().await;
                    tokio::time::sleep(self.polling.settle_delay()).await;
                    CyclePhase::AwaitingActivation
                }
                CyclePhase::AwaitingActivation => match self.await_activation().await {
                    Ok(Some(void)) => {
                        outcome = void;
                        CyclePhase::Closing
                    }
                    Ok(None) => CyclePhase::Monitoring,
                    Err(e) => {
                        failure = Some(e);
                        CyclePhase::Closing
                    }
                },
                CyclePhase::Monitoring => {
                    match self.monitor().await {
                        Ok(triggers) => {
                            take_profit_triggers = triggers;
                            outcome = if triggers > 0 {
                                CycleOutcome::TakeProfitHit
                            } else {
                                CycleOutcome::ClosedExternally
                            };
                        }
                        Err(e) => failure = Some(e),
                    }
                    CyclePhase::Closing
                }
                CyclePhase::Closing => {
                    orders_cancelled = self.cancel_all_pending().await;
                    CyclePhase::CoolingDown
                }
                // The runner sleeps, so the cycle hands control back here
                CyclePhase::CoolingDown => break,
            };
        }

        // The grid is swept even when the cycle failed
        if let Some(e) = failure {
            error!(
                "[{}] Cycle {} aborted after clearing {} pending orders: {}",
                self.name, cycle, orders_cancelled, e
            );
            return Err(e);
        }

        info!(
            "[{}] Cycle {} complete ({:?}), {} pending orders cleared",
            self.name, cycle, outcome, orders_cancelled
        );

        Ok(CycleReport {
            cycle,
            levels_requested: self.config.legs_per_cycle(),
            levels_accepted,
            take_profit_triggers,
            orders_cancelled,
            outcome,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Submit one pending order per grid level, returning the accepted count
    ///
    /// Every leg is tried independently; a partial grid is acceptable.
    async fn place_grid(&self) -> usize {
        let symbol = self.config.symbol.as_str();
        let quote = match self.connector.get_quote(symbol).await {
            Ok(Some(quote)) => quote,
            Ok(None) => {
                warn!("[{}] No quote for {}, grid not placed", self.name, symbol);
                return 0;
            }
            Err(e) => {
                warn!("[{}] Quote lookup failed, grid not placed: {}", self.name, e);
                return 0;
            }
        };

        let mid = quote.mid();
        let levels = compute_levels(mid, self.config.level_count);
        let mut accepted = 0;

        for level in &levels {
            let request = self.config.pending_request(level);
            match self.connector.submit_pending(&request).await {
                Ok(result) if result.retcode.is_success() => {
                    accepted += 1;
                    debug!(
                        "[{}] {} limit #{} at {} placed, ticket {:?}",
                        self.name, level.side, level.index, level.price, result.ticket
                    );
                }
                Ok(result) => warn!(
                    "[{}] {} limit #{} at {} rejected: {:?}",
                    self.name, level.side, level.index, level.price, result.retcode
                ),
                Err(e) => warn!(
                    "[{}] {} limit #{} at {} failed: {}",
                    self.name, level.side, level.index, level.price, e
                ),
            }
        }

        info!(
            "[{}] Grid drawn around {}: {}/{} legs accepted",
            self.name,
            mid,
            accepted,
            levels.len()
        );
        accepted
    }

    /// Wait for the first fill
    ///
    /// Returns `None` once a position is open, or the outcome that voids the
    /// cycle when the grid never shows up or never fills.
    async fn await_activation(&self) -> GridResult<Option<CycleOutcome>> {
        let symbol = self.config.symbol.as_str();
        let mut polls: u64 = 0;
        let mut empty_polls: u32 = 0;

        loop {
            polls += 1;

            let positions = self.no_data_on_transient(self.connector.list_positions(symbol).await)?;
            if !positions.is_empty() {
                info!(
                    "[{}] Grid activated with {} open positions",
                    self.name,
                    positions.len()
                );
                return Ok(None);
            }

            let pending =
                self.no_data_on_transient(self.connector.list_pending_orders(symbol).await)?;
            if pending.is_empty() {
                empty_polls += 1;
                if empty_polls > self.polling.activation_empty_poll_cap {
                    warn!(
                        "[{}] No positions and no pending orders after {} polls, grid is void",
                        self.name, empty_polls
                    );
                    return Ok(Some(CycleOutcome::NoActivity));
                }
            }

            if let Some(limit) = self.polling.activation_timeout_polls {
                if polls > limit {
                    warn!("[{}] No fill after {} polls, abandoning grid", self.name, polls);
                    return Ok(Some(CycleOutcome::Timeout));
                }
            }

            tokio::time::sleep(self.polling.poll_interval()).await;
        }
    }

    /// Poll until the symbol is flat, returning the number of take-profit triggers
    async fn monitor(&self) -> GridResult<u32> {
        let mut triggers = 0;

        loop {
            match self.monitor_poll(&mut triggers).await {
                Ok(true) => return Ok(triggers),
                Ok(false) => {}
                Err(e) if e.is_transient() => {
                    warn!("[{}] Monitoring poll failed, retrying: {}", self.name, e)
                }
                Err(e) => {
                    error!("[{}] Monitoring aborted: {}", self.name, e);
                    return Err(e);
                }
            }

            tokio::time::sleep(self.polling.poll_interval()).await;
        }
    }

    /// One monitoring iteration; `Ok(true)` when no positions remain
    async fn monitor_poll(&self, triggers: &mut u32) -> GridResult<bool> {
        let symbol = self.config.symbol.as_str();
        let positions = self.connector.list_positions(symbol).await?;

        if !positions.is_empty() {
            let mut hit = false;
            for side in [OrderSide::Buy, OrderSide::Sell] {
                let summary = summarize_side(self.connector, symbol, side, &positions).await?;
                debug!(
                    "[{}] {} side: {} positions, profit {}, margin {}, return {}%",
                    self.name,
                    side,
                    summary.side_positions,
                    summary.profit_sum,
                    summary.margin_sum,
                    summary.percent_return
                );
                if summary.reached(self.config.take_profit_pct) {
                    info!(
                        "[{}] {} target reached: {}%",
                        self.name,
                        side,
                        summary.percent_return.round_dp(2)
                    );
                    hit = true;
                }
            }

            // Either side hitting target flattens the whole symbol
            if hit {
                *triggers += 1;
                self.close_all_positions(&positions).await?;
            }
        }

        let remaining = self.connector.list_positions(symbol).await?;
        Ok(remaining.is_empty())
    }

    /// Close every position in the snapshot at market, returning the number closed
    ///
    /// Rejections are left for the next monitoring poll to retry.
    async fn close_all_positions(&self, positions: &[Position]) -> GridResult<usize> {
        let quote = match self.connector.get_quote(&self.config.symbol).await? {
            Some(quote) => quote,
            None => {
                warn!(
                    "[{}] No quote for {}, close deferred to next poll",
                    self.name, self.config.symbol
                );
                return Ok(0);
            }
        };

        let mut closed = 0;
        for position in positions {
            let request = self.config.close_request(position, &quote);
            match self.connector.close_position(&request).await {
                Ok(result) if result.retcode.is_success() => {
                    closed += 1;
                    info!(
                        "[{}] Closed {} position {} ({} lots) at {}",
                        self.name, position.side, position.ticket, position.volume, request.price
                    );
                }
                Ok(result) => warn!(
                    "[{}] Close of position {} rejected: {:?}",
                    self.name, position.ticket, result.retcode
                ),
                Err(e) => warn!(
                    "[{}] Close of position {} failed: {}",
                    self.name, position.ticket, e
                ),
            }
        }
        Ok(closed)
    }

    /// Cancel whatever is left of the grid, returning the number removed
    async fn cancel_all_pending(&self) -> usize {
        let orders = match self.connector.list_pending_orders(&self.config.symbol).await {
            Ok(orders) => orders,
            Err(e) => {
                error!("[{}] Could not list pending orders: {}", self.name, e);
                return 0;
            }
        };

        let mut cancelled = 0;
        for order in &orders {
            match self.connector.cancel_pending(order.ticket).await {
                Ok(TradeRetcode::AlreadyDone) => {
                    debug!("[{}] Order {} already gone", self.name, order.ticket)
                }
                Ok(retcode) if retcode.is_success() => {
                    cancelled += 1;
                    debug!("[{}] Deleted pending order {}", self.name, order.ticket);
                }
                Ok(retcode) => error!(
                    "[{}] Error deleting order {}: {:?}",
                    self.name, order.ticket, retcode
                ),
                Err(e) => error!(
                    "[{}] Error deleting order {}: {}",
                    self.name, order.ticket, e
                ),
            }
        }
        cancelled
    }

    fn no_data_on_transient<T: Default>(&self, result: GridResult<T>) -> GridResult<T> {
        match result {
            Err(e) if e.is_transient() => {
                debug!("[{}] No data yet: {}", self.name, e);
                Ok(T::default())
            }
            other => other,
        }
    }
}
